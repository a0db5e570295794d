// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `smsgate serve` and `smsgate migrate` command implementations.
//!
//! `serve` wires storage, the device directory, the push dispatcher, the
//! hashing task and the message lifecycle service together, starts their
//! background loops and runs until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use smsgate_config::SmsgateConfig;
use smsgate_config::model::StorageConfig;
use smsgate_core::{Cleanable, GatewayError};
use smsgate_devices::DevicesService;
use smsgate_messages::{HashingTask, MessagesService};
use smsgate_push::PushService;
use smsgate_storage::{Database, SqliteStorage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[cfg(feature = "prometheus")]
use tracing::warn;

use crate::{cleaner, shutdown};

/// How long background loops get to finish after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

const MEMORY_SAMPLE_INTERVAL: Duration = Duration::from_secs(15);

/// Runs the gateway daemon until a shutdown signal arrives.
pub async fn run_serve(config: SmsgateConfig) -> Result<(), GatewayError> {
    init_tracing(&config.daemon.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting smsgate");

    #[cfg(feature = "prometheus")]
    let _metrics = if config.metrics.enabled {
        match smsgate_prometheus::PrometheusMetrics::install() {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage initialized");

    let devices = Arc::new(DevicesService::new(&config.devices, storage.clone()));

    let push_client = smsgate_push::new_client(&config.push)?;
    info!(client = push_client.name(), "push client selected");
    let push = Arc::new(PushService::new(&config.push, push_client, devices.clone()));

    let hashing = Arc::new(HashingTask::new(storage.clone(), config.hashing.interval()));
    let messages = Arc::new(MessagesService::new(
        &config.messages,
        storage.clone(),
        push.clone(),
        hashing.clone(),
    )?);

    let cancel = shutdown::install_signal_handler();

    let cleanables: Vec<Arc<dyn Cleanable>> = vec![messages.clone(), devices.clone()];
    let tasks = vec![
        ("push", tokio::spawn(push.clone().run(cancel.clone()))),
        ("hashing", tokio::spawn(hashing.clone().run(cancel.clone()))),
        ("device-cache", {
            let devices = devices.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { devices.run_cache_cleanup(cancel).await })
        }),
        (
            "cleaner",
            tokio::spawn(cleaner::run_cleaner(
                cleanables,
                config.cleaner.interval(),
                cancel.clone(),
            )),
        ),
        ("memory", tokio::spawn(memory_monitor(cancel.clone()))),
    ];

    info!("smsgate is running");
    cancel.cancelled().await;

    info!("shutting down");
    shutdown::join_tasks(tasks, SHUTDOWN_GRACE).await;

    storage.close().await?;
    info!("smsgate stopped");
    Ok(())
}

/// Opens the database, which applies pending migrations, and exits.
pub async fn run_migrate(config: &SmsgateConfig) -> Result<(), GatewayError> {
    init_tracing(&config.daemon.log_level);
    migrate(&config.storage).await
}

async fn migrate(storage: &StorageConfig) -> Result<(), GatewayError> {
    let db = Database::open_with(&storage.database_path, storage.wal_mode).await?;
    db.close().await?;

    info!(path = %storage.database_path, "database schema is up to date");
    Ok(())
}

/// Samples jemalloc heap statistics into the memory gauges.
#[cfg(not(target_env = "msvc"))]
async fn memory_monitor(cancel: CancellationToken) {
    let mut interval = tokio::time::interval(MEMORY_SAMPLE_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Stats are cached until the epoch advances.
                let _ = tikv_jemalloc_ctl::epoch::advance();
                let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
                let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);

                #[cfg(feature = "prometheus")]
                smsgate_prometheus::set_memory(allocated as f64, resident as f64);

                tracing::trace!(allocated, resident, "memory sample");
            }
            _ = cancel.cancelled() => {
                debug!("memory monitor shutting down");
                break;
            }
        }
    }
}

/// Stub memory monitor for MSVC (no jemalloc).
#[cfg(target_env = "msvc")]
async fn memory_monitor(cancel: CancellationToken) {
    cancel.cancelled().await;
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence when set. A second call is a no-op.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("smsgate={log_level},warn")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
