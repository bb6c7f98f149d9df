//! Shared API state.

use std::sync::Arc;

use wacast_core::materialize::MaterializationEngine;
use wacast_core::outbound::OutboundQueue;
use wacast_core::planner::DispatchPlanner;
use wacast_core::retry::RetryService;
use wacast_storage::DatabasePool;

/// State shared by every handler
pub struct AppState {
    pub db_pool: DatabasePool,
    pub engine: Arc<MaterializationEngine>,
    pub planner: Arc<DispatchPlanner>,
    pub queue: Arc<OutboundQueue>,
    pub retry: Arc<RetryService>,
}
