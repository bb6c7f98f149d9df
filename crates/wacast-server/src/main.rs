//! Wacast - outbound campaign dispatch service entry point

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wacast_api::AppState;
use wacast_common::config::Config;
use wacast_core::materialize::MaterializationEngine;
use wacast_core::outbound::{OutboundQueue, OutboundWorker, SendPipeline};
use wacast_core::planner::DispatchPlanner;
use wacast_core::provider::http::HttpProviderAdapter;
use wacast_core::provider::settings::{SettingsCache, SystemClock};
use wacast_core::provider::{ProviderAdapter, SenderResolver};
use wacast_core::retry::RetryService;
use wacast_core::template::{HttpTemplateResolver, SnapshotOnlyResolver, TemplateResolver};
use wacast_storage::db::DatabasePool;
use wacast_storage::repository::{
    CampaignRepository, JobRepository, RecipientRepository, SendLogRepository, SenderRepository,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting Wacast dispatch service...");

    let config = Config::load()?;

    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    db_pool.migrate().await?;
    info!("Database migrations completed");

    let pool = db_pool.pool().clone();
    let campaigns = CampaignRepository::new(pool.clone());
    let recipients = RecipientRepository::new(pool.clone());
    let jobs = JobRepository::new(pool.clone());
    let send_logs = SendLogRepository::new(pool.clone());
    let senders = SenderRepository::new(pool.clone());

    // Template resolver: upstream store when configured, snapshots only
    // otherwise
    let resolver: Arc<dyn TemplateResolver> = match &config.template_store.base_url {
        Some(base_url) => {
            info!("Using template store at {}", base_url);
            Arc::new(HttpTemplateResolver::new(
                base_url.clone(),
                config.template_store.timeout_secs,
            )?)
        }
        None => {
            info!("No template store configured, campaigns must carry snapshots");
            Arc::new(SnapshotOnlyResolver)
        }
    };

    let engine = Arc::new(MaterializationEngine::new(
        campaigns.clone(),
        recipients.clone(),
        resolver,
        config.tracking.base_url.clone(),
    ));
    let planner = Arc::new(DispatchPlanner::new(engine.clone()));

    let settings_cache = SettingsCache::new(
        Duration::from_secs(config.providers.settings_ttl_secs),
        Arc::new(SystemClock),
    );
    let sender_resolver = Arc::new(SenderResolver::new(senders, settings_cache));
    let adapter: Arc<dyn ProviderAdapter> =
        Arc::new(HttpProviderAdapter::new(config.providers.clone())?);

    let pipeline = Arc::new(SendPipeline::new(
        campaigns.clone(),
        recipients.clone(),
        send_logs.clone(),
        engine.clone(),
        sender_resolver,
        adapter,
        config.worker.send_concurrency,
    ));

    let queue = Arc::new(OutboundQueue::new(jobs.clone(), campaigns.clone()));
    let retry = Arc::new(RetryService::new(send_logs, pipeline.clone()));

    // Start outbound worker
    let worker = Arc::new(OutboundWorker::new(
        jobs,
        campaigns,
        pipeline,
        config.worker.poll_interval_secs,
        config.worker.max_concurrent_jobs,
    ));
    let worker_handle = tokio::spawn(worker.run());

    // Start API server
    let api_handle = {
        let state = Arc::new(AppState {
            db_pool,
            engine,
            planner,
            queue,
            retry,
        });
        let bind = format!("{}:{}", config.api.bind, config.api.port);
        tokio::spawn(async move {
            let app = wacast_api::create_router(state);
            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .expect("Failed to bind API server");
            info!("Starting API server on {}", bind);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API server error: {}", e);
            }
        })
    };

    info!("Wacast service started successfully");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    worker_handle.abort();
    api_handle.abort();

    info!("Wacast shutdown complete");

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wacast=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}
