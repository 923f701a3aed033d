//! ==============================================================================
//! main.rs - sensor hub entry point
//! ==============================================================================
//!
//! purpose:
//!     the hub that sensor nodes push readings to. every sensor gets its own
//!     append-only log under the data directory; clients fetch a sensor's
//!     whole history, sorted by timestamp.
//!
//! usage:
//!     sensor-hub [PORT] [DATA_DIR] [--config FILE]
//!
//!     PORT and DATA_DIR override `server.port` and `storage.data_dir` from
//!     host.toml. DATA_DIR is a prefix: sensor 7 under "./data/" lives in
//!     "./data/7".
//!
//! responsibilities:
//!     - load configuration and set up logging
//!     - start the storage worker (coordinator.rs) that owns every log file
//!     - serve the http api (server.rs) until ctrl-c / SIGTERM
//!     - let the worker drain queued requests before exiting
//!
//! ==============================================================================

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sensor_hub::config::HostConfig;
use sensor_hub::{server, Coordinator};

#[derive(Debug, Parser)]
#[command(name = "sensor-hub", version, about = "Stores and serves per-sensor readings")]
struct Cli {
    /// Port to listen on (overrides server.port)
    port: Option<u16>,

    /// Log file prefix; the sensor id is appended (overrides storage.data_dir)
    data_dir: Option<PathBuf>,

    /// Path to host.toml (default: config/host.toml, then ../config/host.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // step 1: load configuration
    let (config, origin) = HostConfig::resolve(cli.config.as_deref())?;
    let config = config.with_overrides(cli.port, cli.data_dir);

    // step 2: logging (RUST_LOG wins over logging.level)
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.level)
            .with_context(|| format!("invalid logging.level {:?}", config.logging.level))?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "sensor hub starting");
    config.log_summary(&origin);

    // step 3: storage worker
    let store = config.log_store();
    store
        .ensure_dir()
        .with_context(|| format!("failed to create data directory for {}", store.data_dir().display()))?;
    let (coordinator, worker) = Coordinator::spawn(store, config.coordinator.queue_depth)
        .context("failed to start storage worker")?;

    // step 4: http api
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, server::build_router(coordinator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    // step 5: the router held the last handles; the worker drains and exits
    let stats = tokio::task::spawn_blocking(move || worker.join())
        .await?
        .map_err(|_| anyhow!("storage worker panicked"))?;
    info!(
        reads = stats.reads,
        writes = stats.writes,
        failures = stats.failures,
        "sensor hub stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining");
}
