//! Outbound dispatch worker.
//!
//! A fixed-interval sweep claims due jobs (queued -> running, atomically)
//! and processes each in its own task. Job attempts are numbered at claim
//! time; a failed attempt is rescheduled with backoff until the attempt
//! budget is spent.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use wacast_storage::models::{CampaignStatus, OutboundCampaignJob};
use wacast_storage::repository::{CampaignRepository, JobRepository};

use super::pipeline::{DispatchReport, PipelineError, SendPipeline};

/// Backoff before the next attempt, by the attempt number that just failed.
///
/// Attempt 1 waits a minute, the ladder then widens to three hours.
pub fn backoff_delay(attempt: i32) -> chrono::Duration {
    let minutes = match attempt {
        i32::MIN..=1 => 1,
        2 => 5,
        3 => 15,
        4 => 60,
        _ => 180,
    };
    chrono::Duration::minutes(minutes)
}

pub struct OutboundWorker {
    jobs: JobRepository,
    campaigns: CampaignRepository,
    pipeline: Arc<SendPipeline>,
    poll_interval: Duration,
    max_concurrent_jobs: usize,
}

impl OutboundWorker {
    pub fn new(
        jobs: JobRepository,
        campaigns: CampaignRepository,
        pipeline: Arc<SendPipeline>,
        poll_interval_secs: u64,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            jobs,
            campaigns,
            pipeline,
            poll_interval: Duration::from_secs(poll_interval_secs),
            max_concurrent_jobs: std::cmp::max(1, max_concurrent_jobs),
        }
    }

    /// Run the sweep loop until the task is aborted
    pub async fn run(self: Arc<Self>) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            max_jobs = self.max_concurrent_jobs,
            "Outbound worker started"
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }

    /// One sweep: claim due jobs and process them concurrently.
    /// Returns the number of jobs processed.
    pub async fn sweep(&self) -> usize {
        let claimed = match self.jobs.claim_due(self.max_concurrent_jobs as i64).await {
            Ok(claimed) => claimed,
            Err(e) => {
                error!(error = %e, "Failed to claim due jobs");
                return 0;
            }
        };

        if claimed.is_empty() {
            return 0;
        }
        info!(count = claimed.len(), "Claimed due jobs");

        let mut handles = Vec::with_capacity(claimed.len());
        for job in claimed {
            let jobs = self.jobs.clone();
            let campaigns = self.campaigns.clone();
            let pipeline = self.pipeline.clone();
            handles.push(tokio::spawn(async move {
                process_job(jobs, campaigns, pipeline, job).await;
            }));
        }

        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Job task panicked");
            }
        }
        count
    }
}

/// What to do with a job and its campaign after one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptResolution {
    /// The pass is complete; the campaign goes to its terminal status
    Succeeded { campaign: CampaignStatus },
    /// Retryable failure with attempts left; requeue the pair
    Rescheduled {
        next_attempt_at: DateTime<Utc>,
        error: String,
    },
    /// Permanent failure or attempts exhausted
    Failed { error: String },
}

/// Decide the resolution of one attempt. Pure; all writes happen in
/// [`apply_resolution`].
fn resolve_attempt(
    job: &OutboundCampaignJob,
    outcome: Result<DispatchReport, PipelineError>,
    now: DateTime<Utc>,
) -> AttemptResolution {
    let reason = match outcome {
        Ok(report) if report.is_complete() => {
            let campaign = if report.total > 0 && report.sent == 0 {
                CampaignStatus::Failed
            } else {
                CampaignStatus::Sent
            };
            return AttemptResolution::Succeeded { campaign };
        }
        Ok(report) => format!(
            "{} of {} recipients failed at the provider",
            report.provider_failed, report.total
        ),
        Err(PipelineError::Transient(reason)) => reason,
        Err(PipelineError::Permanent(reason)) => {
            return AttemptResolution::Failed { error: reason };
        }
    };

    if job.attempts >= job.max_attempts {
        AttemptResolution::Failed { error: reason }
    } else {
        AttemptResolution::Rescheduled {
            next_attempt_at: now + backoff_delay(job.attempts),
            error: reason,
        }
    }
}

/// Campaign status to write after the job transition, or `None` when the
/// job was no longer running (canceled mid-pass). A canceled job's campaign
/// was already reset by the cancel path and must stay untouched.
fn campaign_followup(
    resolution: &AttemptResolution,
    job_transitioned: bool,
) -> Option<CampaignStatus> {
    if !job_transitioned {
        return None;
    }
    Some(match resolution {
        AttemptResolution::Succeeded { campaign } => *campaign,
        AttemptResolution::Rescheduled { .. } => CampaignStatus::Queued,
        AttemptResolution::Failed { .. } => CampaignStatus::Failed,
    })
}

async fn process_job(
    jobs: JobRepository,
    campaigns: CampaignRepository,
    pipeline: Arc<SendPipeline>,
    job: OutboundCampaignJob,
) {
    info!(
        job_id = %job.id,
        campaign_id = %job.campaign_id,
        attempt = job.attempts,
        "Processing outbound job"
    );

    if let Err(e) = campaigns
        .update_status(job.campaign_id, CampaignStatus::Sending)
        .await
    {
        error!(job_id = %job.id, error = %e, "Failed to mark campaign sending");
    }

    let outcome = pipeline
        .dispatch_campaign(job.tenant_id, job.campaign_id, None)
        .await;
    let resolution = resolve_attempt(&job, outcome, Utc::now());
    apply_resolution(&jobs, &campaigns, &job, resolution).await;
}

/// Apply a resolution: transition the job first, then the campaign, but
/// only when the job transition took effect. The job updates are guarded
/// on `status = 'running'`, so a concurrent cancel turns the whole
/// finalization into a no-op instead of reviving the campaign.
async fn apply_resolution(
    jobs: &JobRepository,
    campaigns: &CampaignRepository,
    job: &OutboundCampaignJob,
    resolution: AttemptResolution,
) {
    let transitioned = match &resolution {
        AttemptResolution::Succeeded { campaign } => {
            info!(job_id = %job.id, campaign_status = %campaign, "Job succeeded");
            jobs.mark_succeeded(job.id).await
        }
        AttemptResolution::Rescheduled {
            next_attempt_at,
            error,
        } => {
            warn!(
                job_id = %job.id,
                attempt = job.attempts,
                next_attempt_at = %next_attempt_at,
                reason = %error,
                "Attempt failed, rescheduling"
            );
            jobs.reschedule(job.id, error, *next_attempt_at).await
        }
        AttemptResolution::Failed { error } => {
            warn!(job_id = %job.id, attempts = job.attempts, reason = %error, "Job failed");
            jobs.mark_failed(job.id, error).await
        }
    };

    let transitioned = match transitioned {
        Ok(transitioned) => transitioned,
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Failed to transition job");
            return;
        }
    };

    match campaign_followup(&resolution, transitioned) {
        Some(status) => {
            if let Err(e) = campaigns.update_status(job.campaign_id, status).await {
                error!(job_id = %job.id, error = %e, "Failed to finalize campaign status");
            }
        }
        None => {
            info!(
                job_id = %job.id,
                campaign_id = %job.campaign_id,
                "Job no longer running, leaving campaign status alone"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn job(attempts: i32) -> OutboundCampaignJob {
        let now = Utc::now();
        OutboundCampaignJob {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            status: "running".to_string(),
            attempts,
            max_attempts: 5,
            next_attempt_at: now,
            last_error: None,
            created_at: now,
            updated_at: now,
            started_at: Some(now),
            completed_at: None,
        }
    }

    fn report(total: usize, sent: usize, provider_failed: usize) -> DispatchReport {
        DispatchReport {
            run_id: Uuid::new_v4(),
            total,
            sent,
            content_failed: total - sent - provider_failed,
            provider_failed,
        }
    }

    #[test]
    fn test_backoff_ladder() {
        assert_eq!(backoff_delay(1), chrono::Duration::minutes(1));
        assert_eq!(backoff_delay(2), chrono::Duration::minutes(5));
        assert_eq!(backoff_delay(3), chrono::Duration::minutes(15));
        assert_eq!(backoff_delay(4), chrono::Duration::minutes(60));
        assert_eq!(backoff_delay(5), chrono::Duration::minutes(180));
        // Anything past the ladder stays at the widest step
        assert_eq!(backoff_delay(9), chrono::Duration::minutes(180));
        assert_eq!(backoff_delay(0), chrono::Duration::minutes(1));
    }

    #[test]
    fn test_complete_pass_succeeds() {
        let now = Utc::now();
        let resolution = resolve_attempt(&job(1), Ok(report(10, 8, 0)), now);
        assert_eq!(
            resolution,
            AttemptResolution::Succeeded {
                campaign: CampaignStatus::Sent
            }
        );
    }

    #[test]
    fn test_nothing_sent_is_terminal_failure() {
        // A complete pass where every recipient bounced on content still
        // finishes the job, but the campaign reads failed.
        let now = Utc::now();
        let resolution = resolve_attempt(&job(1), Ok(report(10, 0, 0)), now);
        assert_eq!(
            resolution,
            AttemptResolution::Succeeded {
                campaign: CampaignStatus::Failed
            }
        );
    }

    #[test]
    fn test_provider_failures_reschedule_with_backoff() {
        let now = Utc::now();
        let resolution = resolve_attempt(&job(2), Ok(report(10, 7, 3)), now);
        assert_eq!(
            resolution,
            AttemptResolution::Rescheduled {
                next_attempt_at: now + backoff_delay(2),
                error: "3 of 10 recipients failed at the provider".to_string(),
            }
        );
    }

    #[test]
    fn test_exhausted_attempts_fail_instead_of_requeueing() {
        let now = Utc::now();
        let resolution = resolve_attempt(&job(5), Ok(report(10, 7, 3)), now);
        assert!(matches!(resolution, AttemptResolution::Failed { .. }));

        let transient = resolve_attempt(
            &job(5),
            Err(PipelineError::Transient("pool exhausted".to_string())),
            now,
        );
        assert!(matches!(transient, AttemptResolution::Failed { .. }));
    }

    #[test]
    fn test_permanent_error_fails_on_first_attempt() {
        let now = Utc::now();
        let resolution = resolve_attempt(
            &job(1),
            Err(PipelineError::Permanent("unknown provider".to_string())),
            now,
        );
        assert_eq!(
            resolution,
            AttemptResolution::Failed {
                error: "unknown provider".to_string()
            }
        );
    }

    #[test]
    fn test_canceled_job_leaves_campaign_alone() {
        // Cancel during a running pass: the guarded job update is a no-op,
        // so the campaign (already reset to draft by cancel) must not be
        // flipped back to queued or sent.
        let rescheduled = AttemptResolution::Rescheduled {
            next_attempt_at: Utc::now(),
            error: "provider down".to_string(),
        };
        assert_eq!(campaign_followup(&rescheduled, false), None);

        let succeeded = AttemptResolution::Succeeded {
            campaign: CampaignStatus::Sent,
        };
        assert_eq!(campaign_followup(&succeeded, false), None);

        // The normal path still writes the campaign status
        assert_eq!(
            campaign_followup(&rescheduled, true),
            Some(CampaignStatus::Queued)
        );
        assert_eq!(
            campaign_followup(&succeeded, true),
            Some(CampaignStatus::Sent)
        );
    }
}
