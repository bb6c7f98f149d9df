//! Dispatch plan and preview handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use wacast_core::materialize::MaterializedCampaign;
use wacast_core::planner::DispatchPlan;

use super::{error_reply, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    #[serde(default = "default_plan_limit")]
    pub limit: i64,
}

fn default_plan_limit() -> i64 {
    50_000
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    #[serde(default = "default_preview_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_preview_limit() -> i64 {
    25
}

/// Compute the transient dispatch plan for a campaign
///
/// GET /api/v1/tenants/:tenant_id/campaigns/:campaign_id/plan
pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, campaign_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<DispatchPlan>, (StatusCode, Json<ErrorResponse>)> {
    let plan = state
        .planner
        .plan(tenant_id, campaign_id, query.limit)
        .await
        .map_err(error_reply)?;

    Ok(Json(plan))
}

/// Preview materialized rows without freezing anything
///
/// GET /api/v1/tenants/:tenant_id/campaigns/:campaign_id/preview
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, campaign_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<MaterializedCampaign>, (StatusCode, Json<ErrorResponse>)> {
    let materialized = state
        .engine
        .preview(tenant_id, campaign_id, query.limit, query.offset)
        .await
        .map_err(error_reply)?;

    Ok(Json(materialized))
}
