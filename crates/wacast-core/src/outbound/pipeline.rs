//! The canonical send pipeline.
//!
//! Every real send goes through [`SendPipeline::dispatch_campaign`]: the
//! worker for regular dispatch, the retry service for failed-recipient
//! resubmission. Per recipient it materializes, freezes, builds the payload,
//! calls the provider and records the attempt in the send ledger. Content
//! errors fail the single recipient; provider and infrastructure errors are
//! reported so the job can be rescheduled.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use wacast_common::types::{CampaignId, Provider, RunId, TenantId};
use wacast_common::Error as CommonError;
use wacast_storage::models::{
    Campaign, CampaignRecipient, CreateSendLog, DeliveryStatus, SendStatus,
};
use wacast_storage::repository::{
    CampaignRepository, RecipientRepository, SendLogRepository,
};

use crate::materialize::{self, CampaignContext, MaterializationEngine};
use crate::payload;
use crate::provider::{ProviderAdapter, SenderResolver};

/// Upper bound on recipients loaded per dispatch pass
const DISPATCH_BATCH_LIMIT: i64 = 50_000;

/// Pipeline failure, split by what a retry can fix
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Infrastructure failure; the attempt can be retried with backoff
    #[error("{0}")]
    Transient(String),

    /// Structural campaign problem; retrying cannot help
    #[error("{0}")]
    Permanent(String),
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::Transient(format!("Database error: {}", e))
    }
}

impl From<CommonError> for PipelineError {
    fn from(e: CommonError) -> Self {
        match e {
            CommonError::Database(msg) => PipelineError::Transient(msg),
            other => PipelineError::Permanent(other.to_string()),
        }
    }
}

/// What happened to the recipients of one dispatch pass
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub run_id: RunId,
    pub total: usize,
    pub sent: usize,
    /// Recipients rejected for content reasons; never retried automatically
    pub content_failed: usize,
    /// Recipients that failed at the provider or infrastructure level
    pub provider_failed: usize,
}

impl DispatchReport {
    /// A pass succeeded when nothing retryable is left over
    pub fn is_complete(&self) -> bool {
        self.provider_failed == 0
    }
}

enum RecipientOutcome {
    Sent,
    ContentFailed,
    ProviderFailed,
}

/// Shared state cloned into each per-recipient task
#[derive(Clone)]
struct RecipientTask {
    campaign: Arc<Campaign>,
    ctx: Arc<CampaignContext>,
    provider: Provider,
    sender_id: Arc<String>,
    run_id: RunId,
    recipients: RecipientRepository,
    send_logs: SendLogRepository,
    adapter: Arc<dyn ProviderAdapter>,
}

pub struct SendPipeline {
    campaigns: CampaignRepository,
    recipients: RecipientRepository,
    send_logs: SendLogRepository,
    engine: Arc<MaterializationEngine>,
    resolver: Arc<SenderResolver>,
    adapter: Arc<dyn ProviderAdapter>,
    send_concurrency: usize,
}

impl SendPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        campaigns: CampaignRepository,
        recipients: RecipientRepository,
        send_logs: SendLogRepository,
        engine: Arc<MaterializationEngine>,
        resolver: Arc<SenderResolver>,
        adapter: Arc<dyn ProviderAdapter>,
        send_concurrency: usize,
    ) -> Self {
        Self {
            campaigns,
            recipients,
            send_logs,
            engine,
            resolver,
            adapter,
            send_concurrency: std::cmp::max(1, send_concurrency),
        }
    }

    /// Dispatch one campaign pass.
    ///
    /// `subset` narrows the pass to specific recipients (retry); otherwise
    /// everything not yet sent is attempted. Already-sent recipients are
    /// excluded either way, so a rescheduled job never double-sends.
    pub async fn dispatch_campaign(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
        subset: Option<Vec<Uuid>>,
    ) -> Result<DispatchReport, PipelineError> {
        let campaign = self.engine.load_campaign(tenant_id, campaign_id).await?;
        let provider = campaign.provider_enum().ok_or_else(|| {
            PipelineError::Permanent(format!("Unknown provider: {}", campaign.provider))
        })?;

        let ctx = self.engine.context_for(&campaign).await?;
        let sender_id = self
            .resolver
            .resolve(tenant_id, provider, campaign.sender_id.as_deref())
            .await?;

        let recipients = match subset {
            Some(ids) => self.recipients.list_by_ids(campaign_id, &ids).await?,
            None => {
                self.recipients
                    .list_sendable(campaign_id, DISPATCH_BATCH_LIMIT)
                    .await?
            }
        };

        let run_id = Uuid::new_v4();
        let total = recipients.len();
        info!(
            %campaign_id,
            %run_id,
            recipients = total,
            %provider,
            "Dispatching campaign pass"
        );

        let task = RecipientTask {
            campaign: Arc::new(campaign),
            ctx: Arc::new(ctx),
            provider,
            sender_id: Arc::new(sender_id),
            run_id,
            recipients: self.recipients.clone(),
            send_logs: self.send_logs.clone(),
            adapter: self.adapter.clone(),
        };

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.send_concurrency));
        let mut handles = Vec::with_capacity(total);
        for recipient in recipients {
            let task = task.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
                process_recipient(task, recipient).await
            }));
        }

        let mut sent = 0usize;
        let mut content_failed = 0usize;
        let mut provider_failed = 0usize;
        for handle in handles {
            match handle.await {
                Ok(RecipientOutcome::Sent) => sent += 1,
                Ok(RecipientOutcome::ContentFailed) => content_failed += 1,
                Ok(RecipientOutcome::ProviderFailed) => provider_failed += 1,
                Err(e) => {
                    error!(%campaign_id, error = %e, "Recipient task panicked");
                    provider_failed += 1;
                }
            }
        }

        if sent > 0 || content_failed > 0 || provider_failed > 0 {
            self.campaigns
                .add_counts(campaign_id, sent as i32, (content_failed + provider_failed) as i32)
                .await?;
        }

        info!(
            %campaign_id, %run_id, sent, content_failed, provider_failed,
            "Dispatch pass finished"
        );

        Ok(DispatchReport {
            run_id,
            total,
            sent,
            content_failed,
            provider_failed,
        })
    }
}

/// Process one recipient end to end. Each task owns its own repository
/// handles, so one recipient's database work never rides on another's
/// connection.
async fn process_recipient(task: RecipientTask, recipient: CampaignRecipient) -> RecipientOutcome {
    let recipient_id = recipient.id;
    let row = materialize::materialize_row(&task.ctx, &recipient);

    if !row.is_sendable() {
        let reason = row.errors.join("; ");
        debug!(%recipient_id, %reason, "Recipient unsendable");
        return record_failure(&task, recipient_id, reason, None, RecipientOutcome::ContentFailed)
            .await;
    }

    let phone = row.phone.clone().unwrap_or_default();
    let vars_map: std::collections::BTreeMap<String, String> = row.button_vars.clone();
    let key = payload::idempotency_key(
        task.campaign.id,
        &phone,
        &task.campaign.template_name,
        &row.parameters,
        &vars_map,
    );

    let params_json = serde_json::json!(row.parameters);
    let vars_json = serde_json::json!(vars_map);

    let frozen = match task
        .recipients
        .freeze(recipient_id, &params_json, &vars_json, &key, chrono::Utc::now())
        .await
    {
        Ok(Some(frozen)) => frozen,
        Ok(None) => {
            warn!(%recipient_id, "Recipient vanished before freeze");
            return RecipientOutcome::ProviderFailed;
        }
        Err(e) => {
            error!(%recipient_id, error = %e, "Failed to freeze recipient");
            return RecipientOutcome::ProviderFailed;
        }
    };

    let message = match payload::build_payload(&task.campaign, &task.ctx.template, &frozen) {
        Ok(message) => message,
        Err(e) => {
            return record_failure(
                &task,
                recipient_id,
                e.to_string(),
                None,
                RecipientOutcome::ContentFailed,
            )
            .await;
        }
    };

    let outcome = task
        .adapter
        .send(task.campaign.tenant_id, task.provider, &task.sender_id, &message)
        .await;

    if outcome.success {
        let log = CreateSendLog {
            campaign_id: task.campaign.id,
            recipient_id,
            run_id: task.run_id,
            provider: task.provider,
            provider_message_id: outcome.provider_message_id,
            status: SendStatus::Sent,
            error: None,
            raw_response: outcome.raw_response,
        };
        if let Err(e) = task.send_logs.append(log).await {
            error!(%recipient_id, error = %e, "Failed to record send log");
            return RecipientOutcome::ProviderFailed;
        }
        if let Err(e) = task
            .recipients
            .set_delivery_status(recipient_id, DeliveryStatus::Sent)
            .await
        {
            error!(%recipient_id, error = %e, "Failed to update delivery status");
            return RecipientOutcome::ProviderFailed;
        }
        RecipientOutcome::Sent
    } else {
        let reason = outcome
            .error
            .unwrap_or_else(|| "Unknown provider error".to_string());
        record_failure(
            &task,
            recipient_id,
            reason,
            outcome.raw_response,
            RecipientOutcome::ProviderFailed,
        )
        .await
    }
}

/// Append a failed ledger entry and mark the recipient row
async fn record_failure(
    task: &RecipientTask,
    recipient_id: Uuid,
    reason: String,
    raw_response: Option<serde_json::Value>,
    outcome: RecipientOutcome,
) -> RecipientOutcome {
    let log = CreateSendLog {
        campaign_id: task.campaign.id,
        recipient_id,
        run_id: task.run_id,
        provider: task.provider,
        provider_message_id: None,
        status: SendStatus::Failed,
        error: Some(reason),
        raw_response,
    };
    if let Err(e) = task.send_logs.append(log).await {
        error!(%recipient_id, error = %e, "Failed to record failure log");
    }
    if let Err(e) = task
        .recipients
        .set_delivery_status(recipient_id, DeliveryStatus::Failed)
        .await
    {
        error!(%recipient_id, error = %e, "Failed to update delivery status");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_classification() {
        let transient: PipelineError = CommonError::Database("pool closed".to_string()).into();
        assert!(matches!(transient, PipelineError::Transient(_)));

        let permanent: PipelineError =
            CommonError::Template("template gone".to_string()).into();
        assert!(matches!(permanent, PipelineError::Permanent(_)));

        let permanent: PipelineError =
            CommonError::AmbiguousSender("two defaults".to_string()).into();
        assert!(matches!(permanent, PipelineError::Permanent(_)));
    }

    #[test]
    fn test_report_completeness() {
        let report = DispatchReport {
            run_id: Uuid::new_v4(),
            total: 10,
            sent: 8,
            content_failed: 2,
            provider_failed: 0,
        };
        // Content failures alone do not keep a job alive
        assert!(report.is_complete());

        let report = DispatchReport {
            provider_failed: 1,
            ..report
        };
        assert!(!report.is_complete());
    }

    #[test]
    fn test_sqlx_errors_are_transient() {
        let e: PipelineError = sqlx::Error::PoolTimedOut.into();
        match e {
            PipelineError::Transient(msg) => assert!(msg.contains("Database")),
            other => panic!("expected transient, got {:?}", other),
        }
    }
}
