//! cloudmirror daemon - periodic local-to-cloud mirroring service
//!
//! This binary runs as a long-lived service (or once, from cron) and:
//! - Loads and validates the YAML configuration, refusing to start on error
//! - Appends plain-text logs to the configured log file
//! - Runs a sync cycle immediately, then every `sync.sync_period` seconds
//! - Shuts down gracefully on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! `main` wires the disk adapter, the tracing reporter and the cycle driver
//! together, then hands the driver to [`sync_loop`]. The loop is controlled
//! by a `CancellationToken` that the signal handler cancels. The token is
//! only checked between cycles, so an in-flight cycle always completes.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cloudmirror_core::config::{Config, LoggingConfig};
use cloudmirror_disk::DiskRemoteStore;
use cloudmirror_sync::{SyncCycleDriver, TracingReporter};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "cloudmirrord",
    version,
    about = "Mirror a local directory into a cloud folder"
)]
struct Cli {
    /// Use alternate config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run a single sync cycle and exit
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Installs the global subscriber, appending to `logging.file`
///
/// `RUST_LOG` takes precedence over `logging.level` when set.
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let file = open_log_file(&logging.file)?;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

// ============================================================================
// Periodic sync
// ============================================================================

/// Runs cycles until `shutdown` is cancelled
///
/// The first cycle starts immediately. With `once` set the loop returns
/// after that first cycle. Returns the number of cycles run.
async fn sync_loop(
    driver: &SyncCycleDriver,
    period: Duration,
    once: bool,
    shutdown: &CancellationToken,
) -> u64 {
    info!(period_secs = period.as_secs(), once, "Starting sync loop");

    let mut cycles: u64 = 0;
    loop {
        let summary = driver.run_cycle().await;
        cycles += 1;
        if !summary.is_clean() {
            warn!(
                cycle = cycles,
                failed = summary.failed,
                error = summary.error.as_deref().unwrap_or(""),
                "Cycle finished with problems"
            );
        }

        if once {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!(cycles, "Sync loop terminated");
    cycles
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and cancels `token`
///
/// If a handler cannot be installed the error is logged and that signal
/// source is ignored.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

fn build_driver(config: &Config) -> Result<SyncCycleDriver> {
    let store = DiskRemoteStore::from_config(config).context("Failed to create remote store")?;
    SyncCycleDriver::from_config(config, Arc::new(store), Arc::new(TracingReporter::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path();

    // Configuration problems are fatal before anything runs.
    let config = Config::load_validated(&config_path)
        .with_context(|| format!("Cannot start with config {}", config_path.display()))?;

    init_logging(&config.logging)?;
    info!(
        config_path = %config_path.display(),
        local = %config.sync.local_folder.display(),
        remote = %config.sync.cloud_folder_name,
        mode = %config.sync.sync_mode,
        period_secs = config.sync.sync_period,
        "cloudmirror daemon starting (cloudmirrord)"
    );

    let driver = build_driver(&config)?;

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    sync_loop(
        &driver,
        Duration::from_secs(config.sync.sync_period),
        cli.once,
        &shutdown_token,
    )
    .await;

    info!("cloudmirror daemon shut down gracefully");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
