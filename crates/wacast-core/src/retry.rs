//! Failed-recipient retry on top of the send ledger.
//!
//! Retry selection is latest-wins: only the most recent ledger entry per
//! recipient counts, so a recipient that failed once but succeeded later is
//! never resent. The surviving set goes back through the same canonical send
//! pipeline the worker uses.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use wacast_common::types::{CampaignId, TenantId};
use wacast_common::Error;
use wacast_storage::models::{SendLog, SendStatus};
use wacast_storage::repository::SendLogRepository;

use crate::outbound::pipeline::{PipelineError, SendPipeline};

/// Summary of one retry pass
#[derive(Debug, Clone, Serialize)]
pub struct RetryReport {
    /// Recipients whose latest ledger entry is a failure
    pub considered_failed: usize,
    /// Recipients skipped because their latest entry is a success
    pub skipped: usize,
    /// Recipients resubmitted through the send pipeline
    pub retried: usize,
    /// Of the resubmitted, how many were sent
    pub sent: usize,
    /// Of the resubmitted, how many failed again
    pub failed: usize,
}

/// Pick the recipients whose latest ledger entry is a failure.
///
/// Expects one entry per recipient (the latest); ordering within the slice
/// does not matter.
pub fn select_retryable(latest: &[SendLog]) -> Vec<Uuid> {
    latest
        .iter()
        .filter(|log| log.status_enum() == Some(SendStatus::Failed))
        .map(|log| log.recipient_id)
        .collect()
}

pub struct RetryService {
    send_logs: SendLogRepository,
    pipeline: Arc<SendPipeline>,
}

impl RetryService {
    pub fn new(send_logs: SendLogRepository, pipeline: Arc<SendPipeline>) -> Self {
        Self { send_logs, pipeline }
    }

    /// Resend every recipient whose latest attempt failed.
    ///
    /// `limit` bounds how many ledger rows (one per recipient) are
    /// considered.
    pub async fn retry_failed(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
        limit: i64,
    ) -> Result<RetryReport, Error> {
        let latest = self
            .send_logs
            .latest_per_recipient(campaign_id, limit)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let retryable = select_retryable(&latest);
        let skipped = latest.len() - retryable.len();

        if retryable.is_empty() {
            info!(%campaign_id, "No failed recipients to retry");
            return Ok(RetryReport {
                considered_failed: 0,
                skipped,
                retried: 0,
                sent: 0,
                failed: 0,
            });
        }

        info!(%campaign_id, count = retryable.len(), "Retrying failed recipients");
        let report = self
            .pipeline
            .dispatch_campaign(tenant_id, campaign_id, Some(retryable.clone()))
            .await
            .map_err(|e| match e {
                PipelineError::Transient(msg) => Error::Database(msg),
                PipelineError::Permanent(msg) => Error::Validation(msg),
            })?;

        Ok(RetryReport {
            considered_failed: retryable.len(),
            skipped,
            retried: report.total,
            sent: report.sent,
            failed: report.content_failed + report.provider_failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn log(recipient_id: Uuid, status: &str) -> SendLog {
        SendLog {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            recipient_id,
            run_id: Uuid::new_v4(),
            provider: "meta_cloud".to_string(),
            provider_message_id: None,
            status: status.to_string(),
            error: None,
            raw_response: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_latest_failure_selected() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let latest = vec![log(a, "failed"), log(b, "sent")];

        let selected = select_retryable(&latest);
        assert_eq!(selected, vec![a]);
    }

    #[test]
    fn test_recovered_recipient_not_retried() {
        // The ledger view already collapsed [failed, sent] to the latest
        // entry; a recovered recipient shows up as sent and is skipped.
        let recovered = Uuid::new_v4();
        let latest = vec![log(recovered, "sent")];
        assert!(select_retryable(&latest).is_empty());
    }

    #[test]
    fn test_unknown_status_skipped() {
        let latest = vec![log(Uuid::new_v4(), "bogus")];
        assert!(select_retryable(&latest).is_empty());
    }
}
