//! API routes

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{campaigns, dispatch, health, plan};
use crate::state::AppState;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/ready", get(health::readiness));

    let campaign_routes = Router::new()
        .route("/", get(campaigns::list_campaigns))
        .route("/", post(campaigns::create_campaign))
        .route("/:campaign_id", get(campaigns::get_campaign))
        .route("/:campaign_id", patch(campaigns::update_campaign))
        .route("/:campaign_id", delete(campaigns::delete_campaign))
        .route("/:campaign_id/recipients", post(campaigns::add_recipients))
        .route("/:campaign_id/recipients", get(campaigns::list_recipients))
        .route("/:campaign_id/plan", get(plan::get_plan))
        .route("/:campaign_id/preview", get(plan::preview))
        .route("/:campaign_id/enqueue", post(dispatch::enqueue_campaign))
        .route("/:campaign_id/retry-failed", post(dispatch::retry_failed))
        .route("/:campaign_id/jobs", get(dispatch::list_jobs));

    let job_routes = Router::new()
        .route("/:job_id", get(dispatch::get_job))
        .route("/:job_id/cancel", post(dispatch::cancel_job))
        .route("/:job_id/retry-now", post(dispatch::retry_job_now));

    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1/tenants/:tenant_id/campaigns", campaign_routes)
        .nest("/api/v1/tenants/:tenant_id/jobs", job_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
