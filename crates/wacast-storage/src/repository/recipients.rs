//! Campaign recipient repository

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use wacast_common::types::CampaignId;

use crate::models::{CampaignRecipient, CreateRecipient, DeliveryStatus};

/// Campaign recipient repository
#[derive(Clone)]
pub struct RecipientRepository {
    pool: PgPool,
}

impl RecipientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a single recipient
    pub async fn create(&self, input: CreateRecipient) -> Result<CampaignRecipient, sqlx::Error> {
        let id = Uuid::new_v4();
        let attributes = input.attributes.unwrap_or_else(|| serde_json::json!({}));

        sqlx::query_as::<_, CampaignRecipient>(
            r#"
            INSERT INTO campaign_recipients (
                id, campaign_id, tenant_id, contact_id, audience_member_id, phone, attributes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.campaign_id)
        .bind(input.tenant_id)
        .bind(input.contact_id)
        .bind(input.audience_member_id)
        .bind(&input.phone)
        .bind(&attributes)
        .fetch_one(&self.pool)
        .await
    }

    /// Create multiple recipients in one transaction
    pub async fn create_batch(
        &self,
        recipients: Vec<CreateRecipient>,
    ) -> Result<u64, sqlx::Error> {
        let mut count = 0u64;
        let mut tx = self.pool.begin().await?;

        for input in recipients {
            let id = Uuid::new_v4();
            let attributes = input.attributes.unwrap_or_else(|| serde_json::json!({}));

            let result = sqlx::query(
                r#"
                INSERT INTO campaign_recipients (
                    id, campaign_id, tenant_id, contact_id, audience_member_id, phone, attributes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(id)
            .bind(input.campaign_id)
            .bind(input.tenant_id)
            .bind(input.contact_id)
            .bind(input.audience_member_id)
            .bind(&input.phone)
            .bind(&attributes)
            .execute(&mut *tx)
            .await?;

            count += result.rows_affected();
        }

        tx.commit().await?;
        Ok(count)
    }

    /// Get a recipient by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<CampaignRecipient>, sqlx::Error> {
        sqlx::query_as::<_, CampaignRecipient>(
            "SELECT * FROM campaign_recipients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List recipients for a campaign in the stable dispatch order
    /// (materialization timestamp falling back to creation time, then id).
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CampaignRecipient>, sqlx::Error> {
        sqlx::query_as::<_, CampaignRecipient>(
            r#"
            SELECT * FROM campaign_recipients
            WHERE campaign_id = $1
            ORDER BY COALESCE(materialized_at, created_at) ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// List recipients still eligible for sending (everything not yet Sent)
    pub async fn list_sendable(
        &self,
        campaign_id: CampaignId,
        limit: i64,
    ) -> Result<Vec<CampaignRecipient>, sqlx::Error> {
        sqlx::query_as::<_, CampaignRecipient>(
            r#"
            SELECT * FROM campaign_recipients
            WHERE campaign_id = $1 AND delivery_status != 'sent'
            ORDER BY COALESCE(materialized_at, created_at) ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// List a specific subset of recipients by ID
    pub async fn list_by_ids(
        &self,
        campaign_id: CampaignId,
        ids: &[Uuid],
    ) -> Result<Vec<CampaignRecipient>, sqlx::Error> {
        sqlx::query_as::<_, CampaignRecipient>(
            r#"
            SELECT * FROM campaign_recipients
            WHERE campaign_id = $1 AND id = ANY($2)
            ORDER BY COALESCE(materialized_at, created_at) ASC, id ASC
            "#,
        )
        .bind(campaign_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
    }

    /// Freeze resolved content onto a recipient.
    ///
    /// This is the only write that sets `materialized_at`; it happens inside
    /// the send pipeline immediately before the provider call, never during
    /// preview.
    pub async fn freeze(
        &self,
        id: Uuid,
        resolved_parameters: &serde_json::Value,
        resolved_button_vars: &serde_json::Value,
        idempotency_key: &str,
        materialized_at: DateTime<Utc>,
    ) -> Result<Option<CampaignRecipient>, sqlx::Error> {
        sqlx::query_as::<_, CampaignRecipient>(
            r#"
            UPDATE campaign_recipients SET
                resolved_parameters = $2,
                resolved_button_vars = $3,
                idempotency_key = $4,
                materialized_at = COALESCE(materialized_at, $5),
                delivery_status = 'ready',
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(resolved_parameters)
        .bind(resolved_button_vars)
        .bind(idempotency_key)
        .bind(materialized_at)
        .fetch_optional(&self.pool)
        .await
    }

    /// Record the outcome of a send attempt on the recipient row
    pub async fn set_delivery_status(
        &self,
        id: Uuid,
        status: DeliveryStatus,
    ) -> Result<(), sqlx::Error> {
        let last_sent = matches!(status, DeliveryStatus::Sent);
        sqlx::query(
            r#"
            UPDATE campaign_recipients SET
                delivery_status = $2,
                last_sent_at = CASE WHEN $3 THEN NOW() ELSE last_sent_at END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(last_sent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Count recipients for a campaign
    pub async fn count_by_campaign(&self, campaign_id: CampaignId) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM campaign_recipients WHERE campaign_id = $1")
                .bind(campaign_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }
}
