//! Job queue operations: enqueue, cancel, force-retry.

use tracing::info;
use wacast_common::types::{CampaignId, JobId, TenantId};
use wacast_common::Error;
use wacast_storage::models::{CampaignStatus, OutboundCampaignJob};
use wacast_storage::repository::{CampaignRepository, JobRepository};

fn db(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

/// Enqueue dedupe: reuse the active job unless the caller forces a fresh one
fn reusable_job(force: bool, active: Option<OutboundCampaignJob>) -> Option<OutboundCampaignJob> {
    if force {
        None
    } else {
        active
    }
}

/// Front door of the durable outbound queue
pub struct OutboundQueue {
    jobs: JobRepository,
    campaigns: CampaignRepository,
}

impl OutboundQueue {
    pub fn new(jobs: JobRepository, campaigns: CampaignRepository) -> Self {
        Self { jobs, campaigns }
    }

    /// Enqueue a dispatch job for a campaign.
    ///
    /// Idempotent by default: while the campaign already has an active job,
    /// that job is returned instead of creating a second one. `force` skips
    /// the dedupe and always creates a fresh job.
    pub async fn enqueue(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
        force: bool,
    ) -> Result<OutboundCampaignJob, Error> {
        self.campaigns
            .get_by_tenant(tenant_id, campaign_id)
            .await
            .map_err(db)?
            .ok_or_else(|| Error::NotFound(format!("Campaign {} not found", campaign_id)))?;

        let active = self
            .jobs
            .find_active_by_campaign(campaign_id)
            .await
            .map_err(db)?;
        if let Some(existing) = reusable_job(force, active) {
            info!(%campaign_id, job_id = %existing.id, "Reusing active job");
            return Ok(existing);
        }

        let job = self.jobs.create(tenant_id, campaign_id).await.map_err(db)?;
        self.campaigns
            .update_status(campaign_id, CampaignStatus::Queued)
            .await
            .map_err(db)?;

        info!(%campaign_id, job_id = %job.id, force, "Enqueued campaign dispatch job");
        Ok(job)
    }

    /// Cancel a queued or running job.
    ///
    /// Cancellation is cooperative: a running pass finishes its current
    /// recipients, but the job's terminal writes become no-ops. When no
    /// active job remains the campaign drops back to draft so it can be
    /// edited and re-queued.
    pub async fn cancel(&self, tenant_id: TenantId, job_id: JobId) -> Result<bool, Error> {
        let job = self
            .jobs
            .get_by_tenant(tenant_id, job_id)
            .await
            .map_err(db)?
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))?;

        let canceled = self.jobs.cancel(job_id, tenant_id).await.map_err(db)?;
        if canceled {
            let remaining = self
                .jobs
                .find_active_by_campaign(job.campaign_id)
                .await
                .map_err(db)?;
            if remaining.is_none() {
                self.campaigns
                    .update_status(job.campaign_id, CampaignStatus::Draft)
                    .await
                    .map_err(db)?;
            }
            info!(job_id = %job_id, campaign_id = %job.campaign_id, "Canceled job");
        }
        Ok(canceled)
    }

    /// Make a backed-off queued job eligible on the next sweep.
    ///
    /// Does not consume an attempt; it only moves the due time.
    pub async fn force_retry_now(&self, tenant_id: TenantId, job_id: JobId) -> Result<bool, Error> {
        let job = self
            .jobs
            .get_by_tenant(tenant_id, job_id)
            .await
            .map_err(db)?
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))?;

        let moved = self.jobs.force_retry_now(job_id, tenant_id).await.map_err(db)?;
        if moved {
            self.campaigns
                .update_status(job.campaign_id, CampaignStatus::Queued)
                .await
                .map_err(db)?;
            info!(job_id = %job_id, "Job due time moved to now");
        }
        Ok(moved)
    }

    pub async fn get(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
    ) -> Result<OutboundCampaignJob, Error> {
        self.jobs
            .get_by_tenant(tenant_id, job_id)
            .await
            .map_err(db)?
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))
    }

    pub async fn list_for_campaign(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
        limit: i64,
    ) -> Result<Vec<OutboundCampaignJob>, Error> {
        // Tenant scoping happens through the campaign lookup
        self.campaigns
            .get_by_tenant(tenant_id, campaign_id)
            .await
            .map_err(db)?
            .ok_or_else(|| Error::NotFound(format!("Campaign {} not found", campaign_id)))?;

        self.jobs
            .list_by_campaign(campaign_id, limit)
            .await
            .map_err(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn queued_job() -> OutboundCampaignJob {
        let now = Utc::now();
        OutboundCampaignJob {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            status: "queued".to_string(),
            attempts: 0,
            max_attempts: 5,
            next_attempt_at: now,
            last_error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_enqueue_reuses_active_job() {
        let existing = queued_job();
        let reused = reusable_job(false, Some(existing.clone())).expect("active job reused");
        assert_eq!(reused.id, existing.id);
    }

    #[test]
    fn test_force_creates_fresh_job() {
        assert!(reusable_job(true, Some(queued_job())).is_none());
    }

    #[test]
    fn test_no_active_job_creates_one() {
        assert!(reusable_job(false, None).is_none());
    }
}
