//! Outbound campaign job repository
//!
//! The jobs table doubles as the durable queue. Claims use
//! `FOR UPDATE SKIP LOCKED` plus a `status = 'queued'` predicate so a second
//! scheduler instance racing on the same rows either sees zero rows or is
//! excluded by the predicate.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use wacast_common::types::{CampaignId, TenantId};

use crate::models::OutboundCampaignJob;

/// Fixed job-level retry budget
pub const MAX_ATTEMPTS: i32 = 5;

/// Outbound job repository
#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a queued job for a campaign
    pub async fn create(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
    ) -> Result<OutboundCampaignJob, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, OutboundCampaignJob>(
            r#"
            INSERT INTO outbound_campaign_jobs (id, tenant_id, campaign_id, max_attempts)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(campaign_id)
        .bind(MAX_ATTEMPTS)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a job by ID and tenant
    pub async fn get_by_tenant(
        &self,
        tenant_id: TenantId,
        id: Uuid,
    ) -> Result<Option<OutboundCampaignJob>, sqlx::Error> {
        sqlx::query_as::<_, OutboundCampaignJob>(
            "SELECT * FROM outbound_campaign_jobs WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Find an active (queued or running) job for a campaign, if any
    pub async fn find_active_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<OutboundCampaignJob>, sqlx::Error> {
        sqlx::query_as::<_, OutboundCampaignJob>(
            r#"
            SELECT * FROM outbound_campaign_jobs
            WHERE campaign_id = $1 AND status IN ('queued', 'running')
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List jobs for a campaign, newest first
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
        limit: i64,
    ) -> Result<Vec<OutboundCampaignJob>, sqlx::Error> {
        sqlx::query_as::<_, OutboundCampaignJob>(
            r#"
            SELECT * FROM outbound_campaign_jobs
            WHERE campaign_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Atomically claim up to `limit` due jobs, flipping them queued -> running.
    ///
    /// The attempt counter is incremented at claim time, so `attempts` on a
    /// running job is the number of the attempt currently in progress.
    pub async fn claim_due(&self, limit: i64) -> Result<Vec<OutboundCampaignJob>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM outbound_campaign_jobs
            WHERE status = 'queued' AND next_attempt_at <= NOW()
            ORDER BY next_attempt_at ASC, created_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        if ids.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = ids.into_iter().map(|(id,)| id).collect();

        let claimed = sqlx::query_as::<_, OutboundCampaignJob>(
            r#"
            UPDATE outbound_campaign_jobs SET
                status = 'running',
                attempts = attempts + 1,
                started_at = COALESCE(started_at, NOW()),
                updated_at = NOW()
            WHERE id = ANY($1) AND status = 'queued'
            RETURNING *
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(claimed)
    }

    /// Mark a running job as succeeded.
    ///
    /// Returns false when the job was no longer running (canceled mid-pass),
    /// in which case nothing was written.
    pub async fn mark_succeeded(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_campaign_jobs SET
                status = 'succeeded',
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Requeue a failed attempt with a backoff deadline.
    ///
    /// Returns false when the job was no longer running.
    pub async fn reschedule(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_campaign_jobs SET
                status = 'queued',
                last_error = $2,
                next_attempt_at = $3,
                updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a job permanently failed (attempts exhausted).
    ///
    /// Returns false when the job was no longer running.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_campaign_jobs SET
                status = 'failed',
                last_error = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a job. Only queued or running jobs can be canceled.
    pub async fn cancel(&self, id: Uuid, tenant_id: TenantId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_campaign_jobs SET
                status = 'canceled',
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2 AND status IN ('queued', 'running')
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Make a queued job due immediately without consuming an attempt
    pub async fn force_retry_now(&self, id: Uuid, tenant_id: TenantId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_campaign_jobs SET
                next_attempt_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2 AND status = 'queued'
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
