//! Rightsizer - resource rightsizing service
//!
//! Harvests sizing recommendations on a timer, persists them as pending
//! changes and applies each change when its record is written.

use anyhow::{Context, Result};
use rightsizer_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    provider::GatewayClient,
    store::{FileStateStore, StoreWatcher, NOTIFICATION_CHANNEL_CAPACITY},
    ApplyWorker, HarvestSchedulerBuilder, Pipeline, StateStore,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

use config::{Role, ServiceConfig};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ServiceConfig::load()?;
    info!(
        instance = %config.instance,
        role = config.role.as_str(),
        state_dir = %config.state_dir.display(),
        provider_endpoint = %config.provider_endpoint,
        "Rightsizer configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::STATE_STORE).await;
    health_registry.register(components::PROVIDER).await;
    if config.role.runs_harvester() {
        health_registry.register(components::HARVESTER).await;
    }
    if config.role.runs_applier() {
        health_registry.register(components::APPLIER).await;
    }

    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(SERVICE_VERSION, config.role.as_str());

    tokio::fs::create_dir_all(&config.state_dir)
        .await
        .with_context(|| format!("Failed to create state dir {}", config.state_dir.display()))?;
    let state_dir = tokio::fs::canonicalize(&config.state_dir)
        .await
        .with_context(|| format!("Failed to resolve state dir {}", config.state_dir.display()))?;
    let store = Arc::new(FileStateStore::new(&state_dir));

    let gateway = Arc::new(
        GatewayClient::new(&config.provider_endpoint, config.provider_timeout())
            .context("Failed to create provider gateway client")?,
    );

    let pipeline = Arc::new(
        Pipeline::with_provider(store.clone(), gateway)
            .with_logger(logger.clone())
            .with_health(health_registry.clone()),
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut tasks = Vec::new();

    // Subscribe before the first harvest so its writes are not missed
    let mut _watcher = None;
    if config.role.runs_applier() {
        let notifications = match config.role {
            Role::Applier => {
                let (tx, rx) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
                _watcher = Some(StoreWatcher::new(&state_dir, tx).start().await?);
                rx
            }
            _ => store.subscribe(),
        };

        let worker = ApplyWorker::new(pipeline.clone(), notifications)
            .with_resync(store.clone())
            .sweep_on_start(config.role.sweeps_on_start());
        let shutdown = shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            let stats = worker.run(shutdown).await;
            info!(
                received = stats.received,
                applied = stats.applied,
                client_errors = stats.client_errors,
                server_errors = stats.server_errors,
                lagged = stats.lagged,
                resynced = stats.resynced,
                "Apply worker stopped"
            );
        }));
    }

    if config.role.runs_harvester() {
        let scheduler = HarvestSchedulerBuilder::new()
            .invoker(pipeline.clone())
            .interval(config.harvest_interval())
            .jitter(config.harvest_jitter())
            .kinds(config.kinds.clone())
            .build()?;
        tasks.push(tokio::spawn(scheduler.run(shutdown_tx.subscribe())));
    }

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), pipeline));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    health_registry.set_ready(true).await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    if shutdown_tx.send(()).is_err() {
        warn!("No background tasks to stop");
    }
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }
    api_handle.abort();

    Ok(())
}
