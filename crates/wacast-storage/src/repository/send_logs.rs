//! Send log repository (append-only delivery ledger)

use sqlx::PgPool;
use uuid::Uuid;
use wacast_common::types::CampaignId;

use crate::models::{CreateSendLog, SendLog};

/// Send log repository
#[derive(Clone)]
pub struct SendLogRepository {
    pool: PgPool,
}

impl SendLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one send attempt record
    pub async fn append(&self, input: CreateSendLog) -> Result<SendLog, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, SendLog>(
            r#"
            INSERT INTO send_logs (
                id, campaign_id, recipient_id, run_id, provider,
                provider_message_id, status, error, raw_response
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.campaign_id)
        .bind(input.recipient_id)
        .bind(input.run_id)
        .bind(input.provider.to_string())
        .bind(&input.provider_message_id)
        .bind(input.status.to_string())
        .bind(&input.error)
        .bind(&input.raw_response)
        .fetch_one(&self.pool)
        .await
    }

    /// List logs for a campaign, newest first
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SendLog>, sqlx::Error> {
        sqlx::query_as::<_, SendLog>(
            r#"
            SELECT * FROM send_logs
            WHERE campaign_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// The single most recent log per recipient of a campaign.
    ///
    /// Latest-wins: this is the view the retry service filters on.
    pub async fn latest_per_recipient(
        &self,
        campaign_id: CampaignId,
        limit: i64,
    ) -> Result<Vec<SendLog>, sqlx::Error> {
        sqlx::query_as::<_, SendLog>(
            r#"
            SELECT DISTINCT ON (recipient_id) *
            FROM send_logs
            WHERE campaign_id = $1
            ORDER BY recipient_id, created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Count logs for a campaign by status
    pub async fn count_by_status(
        &self,
        campaign_id: CampaignId,
        status: &str,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM send_logs WHERE campaign_id = $1 AND status = $2",
        )
        .bind(campaign_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }
}
