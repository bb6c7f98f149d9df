//! Dispatch and job management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use wacast_core::retry::RetryReport;
use wacast_storage::models::OutboundCampaignJob;

use super::{error_reply, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnqueueQuery {
    /// Skip active-job dedupe and always create a fresh job
    #[serde(default)]
    pub force: bool,
}

/// Job response
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<OutboundCampaignJob> for JobResponse {
    fn from(j: OutboundCampaignJob) -> Self {
        Self {
            id: j.id,
            campaign_id: j.campaign_id,
            status: j.status,
            attempts: j.attempts,
            max_attempts: j.max_attempts,
            next_attempt_at: j.next_attempt_at,
            last_error: j.last_error,
            created_at: j.created_at,
            started_at: j.started_at,
            completed_at: j.completed_at,
        }
    }
}

/// Enqueue a campaign for dispatch
///
/// POST /api/v1/tenants/:tenant_id/campaigns/:campaign_id/enqueue
pub async fn enqueue_campaign(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, campaign_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<EnqueueQuery>,
) -> Result<(StatusCode, Json<JobResponse>), (StatusCode, Json<ErrorResponse>)> {
    let job = state
        .queue
        .enqueue(tenant_id, campaign_id, query.force)
        .await
        .map_err(error_reply)?;

    info!(%campaign_id, job_id = %job.id, "Campaign enqueued");
    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

#[derive(Debug, Deserialize)]
pub struct RetryQuery {
    #[serde(default = "default_retry_limit")]
    pub limit: i64,
}

fn default_retry_limit() -> i64 {
    50_000
}

/// Retry every recipient whose latest send attempt failed
///
/// POST /api/v1/tenants/:tenant_id/campaigns/:campaign_id/retry-failed
pub async fn retry_failed(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, campaign_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<RetryQuery>,
) -> Result<Json<RetryReport>, (StatusCode, Json<ErrorResponse>)> {
    let report = state
        .retry
        .retry_failed(tenant_id, campaign_id, query.limit)
        .await
        .map_err(error_reply)?;

    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub data: Vec<JobResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default = "default_jobs_limit")]
    pub limit: i64,
}

fn default_jobs_limit() -> i64 {
    20
}

/// List dispatch jobs of a campaign, newest first
///
/// GET /api/v1/tenants/:tenant_id/campaigns/:campaign_id/jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, campaign_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<JobListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let jobs = state
        .queue
        .list_for_campaign(tenant_id, campaign_id, query.limit)
        .await
        .map_err(error_reply)?;

    Ok(Json(JobListResponse {
        data: jobs.into_iter().map(JobResponse::from).collect(),
    }))
}

/// Get one job
///
/// GET /api/v1/tenants/:tenant_id/jobs/:job_id
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, job_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<JobResponse>, (StatusCode, Json<ErrorResponse>)> {
    let job = state
        .queue
        .get(tenant_id, job_id)
        .await
        .map_err(error_reply)?;

    Ok(Json(job.into()))
}

#[derive(Debug, Serialize)]
pub struct JobActionResponse {
    pub applied: bool,
}

/// Cancel a queued or running job
///
/// POST /api/v1/tenants/:tenant_id/jobs/:job_id/cancel
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, job_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<JobActionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let applied = state
        .queue
        .cancel(tenant_id, job_id)
        .await
        .map_err(error_reply)?;

    Ok(Json(JobActionResponse { applied }))
}

/// Make a backed-off job due immediately
///
/// POST /api/v1/tenants/:tenant_id/jobs/:job_id/retry-now
pub async fn retry_job_now(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, job_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<JobActionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let applied = state
        .queue
        .force_retry_now(tenant_id, job_id)
        .await
        .map_err(error_reply)?;

    Ok(Json(JobActionResponse { applied }))
}
