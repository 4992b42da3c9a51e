mod cli;
mod telemetry;

use crate::cli::{StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use cutter_gateway::{App, AppState};
use cutter_generator::RandomGenerator;
use cutter_shortener::{DeletionQueue, ShortenerService, ShortenerSettings};
use cutter_storage::{LoggedRegistry, PostgresRegistry, Registry, VolatileRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    telemetry::init(config.log_format);

    let backend = config.storage_backend();
    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        storage_backend = %backend,
        "starting cutter"
    );

    match backend {
        StorageBackendArg::Volatile => run_server(&config, VolatileRegistry::new()).await,
        StorageBackendArg::Logged => {
            let path = config
                .file_storage_path
                .as_ref()
                .context("file storage path is required when storage backend is logged")?;
            let registry = LoggedRegistry::open(path)
                .await
                .with_context(|| format!("failed to open log {}", path.display()))?;
            run_server(&config, registry).await
        }
        StorageBackendArg::Postgres => {
            let dsn = config
                .database_dsn
                .as_deref()
                .context("database dsn is required when storage backend is postgres")?;
            let registry = PostgresRegistry::connect(dsn)
                .await
                .context("failed to connect to postgres")?;
            registry.migrate().await?;
            run_server(&config, registry).await
        }
    }
}

async fn run_server<R: Registry>(config: &CLI, registry: R) -> anyhow::Result<()> {
    let registry = Arc::new(registry);
    let generator = RandomGenerator::new(config.code_length)?;

    let settings = match config.deadline() {
        Some(deadline) => ShortenerSettings::builder().deadline(deadline).build(),
        None => ShortenerSettings::default(),
    };
    let service =
        ShortenerService::new(Arc::clone(&registry), generator).with_settings(settings);
    let (deletions, worker) =
        DeletionQueue::spawn(Arc::clone(&registry), config.deletion_queue_capacity);

    let state = AppState::new(Arc::new(service), deletions, config.base_url.clone());
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(
        listen_addr = %listener.local_addr()?,
        backend = registry.backend_name(),
        "listening"
    );

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last queue handle, so the worker now drains.
    match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await {
        Ok(joined) => joined.context("deletion worker panicked")?,
        Err(_) => warn!("deletion worker did not drain in time"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
