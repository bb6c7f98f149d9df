//! Sender identity repository

use sqlx::PgPool;
use uuid::Uuid;
use wacast_common::types::{Provider, TenantId};

use crate::models::SenderIdentity;

/// Sender identity repository
#[derive(Clone)]
pub struct SenderRepository {
    pool: PgPool,
}

impl SenderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a sender identity for a tenant
    pub async fn create(
        &self,
        tenant_id: TenantId,
        provider: Provider,
        sender_id: &str,
        display_name: Option<&str>,
        is_default: bool,
    ) -> Result<SenderIdentity, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, SenderIdentity>(
            r#"
            INSERT INTO sender_identities (id, tenant_id, provider, sender_id, display_name, is_default)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(provider.to_string())
        .bind(sender_id)
        .bind(display_name)
        .bind(is_default)
        .fetch_one(&self.pool)
        .await
    }

    /// List sender identities configured for a tenant on one provider
    pub async fn list_by_provider(
        &self,
        tenant_id: TenantId,
        provider: Provider,
    ) -> Result<Vec<SenderIdentity>, sqlx::Error> {
        sqlx::query_as::<_, SenderIdentity>(
            r#"
            SELECT * FROM sender_identities
            WHERE tenant_id = $1 AND provider = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(provider.to_string())
        .fetch_all(&self.pool)
        .await
    }
}
