//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use wacast_common::types::{
    CampaignId, CampaignKind, JobId, PlanTier, Provider, RecipientId, RunId, TenantId,
};

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Queued,
    Sending,
    Sent,
    Failed,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Queued => write!(f, "queued"),
            CampaignStatus::Sending => write!(f, "sending"),
            CampaignStatus::Sent => write!(f, "sent"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "queued" => Ok(CampaignStatus::Queued),
            "sending" => Ok(CampaignStatus::Sending),
            "sent" => Ok(CampaignStatus::Sent),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Outbound job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    /// Whether a job in this status still blocks a new enqueue for the campaign
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "canceled" => Ok(JobStatus::Canceled),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Per-recipient delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Ready,
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Ready => write!(f, "ready"),
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "ready" => Ok(DeliveryStatus::Ready),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(format!("Invalid delivery status: {}", s)),
        }
    }
}

/// Send log outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Sent,
    Failed,
}

impl std::fmt::Display for SendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendStatus::Sent => write!(f, "sent"),
            SendStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SendStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(SendStatus::Sent),
            "failed" => Ok(SendStatus::Failed),
            _ => Err(format!("Invalid send status: {}", s)),
        }
    }
}

/// Campaign model: a send intent
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Campaign kind: text, image, video or document
    pub kind: String,
    pub provider: String,
    /// Chosen sender identifier; None means "resolve the default sender"
    pub sender_id: Option<String>,
    pub template_name: String,
    pub template_language: String,
    /// Frozen template schema snapshot, short-circuits the template resolver
    pub template_snapshot: Option<serde_json::Value>,
    pub header_media_url: Option<String>,
    /// Variable mappings: JSON array of {index, source, value, column, default}
    pub variable_mappings: serde_json::Value,
    pub plan_tier: String,
    pub status: String,
    pub sent_count: i32,
    pub failed_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    pub fn kind_enum(&self) -> Option<CampaignKind> {
        self.kind.parse().ok()
    }

    pub fn provider_enum(&self) -> Option<Provider> {
        self.provider.parse().ok()
    }

    pub fn plan_tier_enum(&self) -> PlanTier {
        self.plan_tier.parse().unwrap_or_default()
    }
}

/// One planned delivery to a single recipient
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignRecipient {
    pub id: RecipientId,
    pub campaign_id: CampaignId,
    pub tenant_id: TenantId,
    pub contact_id: Option<uuid::Uuid>,
    pub audience_member_id: Option<uuid::Uuid>,
    pub phone: Option<String>,
    /// Audience column values used by `audience_column` variable mappings
    pub attributes: serde_json::Value,
    /// Frozen ordered body parameters (JSON array of strings)
    pub resolved_parameters: Option<serde_json::Value>,
    /// Frozen header/button variables (JSON object, canonical keys)
    pub resolved_button_vars: Option<serde_json::Value>,
    pub materialized_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub delivery_status: String,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignRecipient {
    pub fn delivery_status_enum(&self) -> Option<DeliveryStatus> {
        self.delivery_status.parse().ok()
    }

    /// Frozen body parameters as strings, empty when not yet materialized
    pub fn frozen_parameters(&self) -> Vec<String> {
        self.resolved_parameters
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

/// A unit of queued work: "attempt to dispatch this campaign"
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OutboundCampaignJob {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OutboundCampaignJob {
    pub fn status_enum(&self) -> Option<JobStatus> {
        self.status.parse().ok()
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Append-only record of one send attempt for one recipient
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SendLog {
    pub id: uuid::Uuid,
    pub campaign_id: CampaignId,
    pub recipient_id: RecipientId,
    /// Groups all logs produced by one dispatch pass
    pub run_id: RunId,
    pub provider: String,
    pub provider_message_id: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub raw_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl SendLog {
    pub fn status_enum(&self) -> Option<SendStatus> {
        self.status.parse().ok()
    }
}

/// A sender identity configured for a tenant on one provider
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub id: uuid::Uuid,
    pub tenant_id: TenantId,
    pub provider: String,
    pub sender_id: String,
    pub display_name: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub tenant_id: TenantId,
    pub name: String,
    pub kind: CampaignKind,
    pub provider: Provider,
    pub sender_id: Option<String>,
    pub template_name: String,
    pub template_language: String,
    pub template_snapshot: Option<serde_json::Value>,
    pub header_media_url: Option<String>,
    pub variable_mappings: Option<serde_json::Value>,
    pub plan_tier: Option<PlanTier>,
}

/// Update campaign input (draft only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub sender_id: Option<String>,
    pub template_name: Option<String>,
    pub template_language: Option<String>,
    pub header_media_url: Option<String>,
    pub variable_mappings: Option<serde_json::Value>,
    pub plan_tier: Option<PlanTier>,
}

/// Create recipient input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipient {
    pub campaign_id: CampaignId,
    pub tenant_id: TenantId,
    pub contact_id: Option<uuid::Uuid>,
    pub audience_member_id: Option<uuid::Uuid>,
    pub phone: Option<String>,
    pub attributes: Option<serde_json::Value>,
}

/// Create send log input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSendLog {
    pub campaign_id: CampaignId,
    pub recipient_id: RecipientId,
    pub run_id: RunId,
    pub provider: Provider,
    pub provider_message_id: Option<String>,
    pub status: SendStatus,
    pub error: Option<String>,
    pub raw_response: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrips() {
        assert_eq!("sending".parse::<CampaignStatus>().unwrap(), CampaignStatus::Sending);
        assert_eq!(JobStatus::Canceled.to_string(), "canceled");
        assert_eq!("ready".parse::<DeliveryStatus>().unwrap(), DeliveryStatus::Ready);
        assert!("delivered".parse::<SendStatus>().is_err());
    }

    #[test]
    fn test_job_active() {
        assert!(JobStatus::Queued.is_active());
        assert!(JobStatus::Running.is_active());
        assert!(!JobStatus::Succeeded.is_active());
        assert!(!JobStatus::Canceled.is_active());
    }
}
