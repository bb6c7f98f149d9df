//! Campaign repository

use sqlx::PgPool;
use uuid::Uuid;
use wacast_common::types::TenantId;

use crate::models::{Campaign, CampaignStatus, CreateCampaign, UpdateCampaign};

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new draft campaign
    pub async fn create(&self, input: CreateCampaign) -> Result<Campaign, sqlx::Error> {
        let id = Uuid::new_v4();
        let mappings = input
            .variable_mappings
            .unwrap_or_else(|| serde_json::json!([]));

        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, tenant_id, name, kind, provider, sender_id,
                template_name, template_language, template_snapshot,
                header_media_url, variable_mappings, plan_tier
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.tenant_id)
        .bind(&input.name)
        .bind(input.kind.to_string())
        .bind(input.provider.to_string())
        .bind(&input.sender_id)
        .bind(&input.template_name)
        .bind(&input.template_language)
        .bind(&input.template_snapshot)
        .bind(&input.header_media_url)
        .bind(&mappings)
        .bind(input.plan_tier.unwrap_or_default().to_string())
        .fetch_one(&self.pool)
        .await
    }

    /// Get a campaign by ID and tenant
    pub async fn get_by_tenant(
        &self,
        tenant_id: TenantId,
        id: Uuid,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List campaigns for a tenant
    pub async fn list_by_tenant(
        &self,
        tenant_id: TenantId,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE tenant_id = $1 AND status = $2
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(tenant_id)
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE tenant_id = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(tenant_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Update a campaign. Only draft campaigns are mutable.
    pub async fn update(
        &self,
        id: Uuid,
        tenant_id: TenantId,
        input: UpdateCampaign,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let current = match self.get_by_tenant(tenant_id, id).await? {
            Some(c) => c,
            None => return Ok(None),
        };

        if current.status_enum() != Some(CampaignStatus::Draft) {
            return Ok(Some(current));
        }

        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                name = COALESCE($3, name),
                sender_id = COALESCE($4, sender_id),
                template_name = COALESCE($5, template_name),
                template_language = COALESCE($6, template_language),
                header_media_url = COALESCE($7, header_media_url),
                variable_mappings = COALESCE($8, variable_mappings),
                plan_tier = COALESCE($9, plan_tier),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.sender_id)
        .bind(&input.template_name)
        .bind(&input.template_language)
        .bind(&input.header_media_url)
        .bind(&input.variable_mappings)
        .bind(input.plan_tier.map(|t| t.to_string()))
        .fetch_optional(&self.pool)
        .await
    }

    /// Update campaign status
    pub async fn update_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                status = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await
    }

    /// Add to the sent/failed counters after a dispatch pass
    pub async fn add_counts(
        &self,
        id: Uuid,
        sent: i32,
        failed: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE campaigns SET
                sent_count = sent_count + $2,
                failed_count = failed_count + $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(sent)
        .bind(failed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a campaign. Only drafts with no sent history may be destroyed.
    pub async fn delete(&self, id: Uuid, tenant_id: TenantId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM campaigns
            WHERE id = $1 AND tenant_id = $2 AND status = 'draft'
              AND NOT EXISTS (SELECT 1 FROM send_logs WHERE campaign_id = $1)
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count campaigns by tenant
    pub async fn count_by_tenant(
        &self,
        tenant_id: TenantId,
        status: Option<CampaignStatus>,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) = if let Some(status) = status {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE tenant_id = $1 AND status = $2")
                .bind(tenant_id)
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE tenant_id = $1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(count.0)
    }
}
