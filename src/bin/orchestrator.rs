//! # Workflow Orchestrator
//!
//! Long-running process: listens for project-created events and records the
//! projects they announce. Runs until SIGINT or SIGTERM.
//!
//! ## Usage
//!
//! ```bash
//! # Configuration from .env and the process environment
//! cargo run --bin orchestrator
//!
//! # Alternate dotenv file
//! cargo run --bin orchestrator -- --env-file .env.staging
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use workflow_engine::config::ConfigManager;
use workflow_engine::logging;
use workflow_engine::orchestration::OrchestrationBootstrap;

#[derive(Debug, Parser)]
#[command(name = "orchestrator", version, about = "Run the workflow orchestration loop")]
struct Args {
    /// Dotenv file to load instead of `.env`
    #[arg(long, env = "WORKFLOW_ENV_FILE")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_manager = match args.env_file.as_deref() {
        Some(path) => ConfigManager::load_with_env_file(path),
        None => ConfigManager::load(),
    }
    .context("Failed to load configuration")?;

    logging::init_structured_logging(
        config_manager.environment(),
        &config_manager.config().logging,
    );

    info!("Starting workflow orchestrator");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));
    info!("   Environment: {}", config_manager.environment());
    info!("   Configuration: {}", config_manager.debug_config());

    let handle = match OrchestrationBootstrap::bootstrap(Arc::new(config_manager.config().clone()))
        .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "Failed to bootstrap orchestration");
            return Err(e).context("Failed to bootstrap orchestration");
        }
    };

    info!("Orchestrator started, press Ctrl+C to shut down");

    shutdown_signal().await?;

    info!("Shutdown signal received, draining in-flight handlers");
    let stats = handle.stop().await;
    info!(
        received = stats.received,
        succeeded = stats.succeeded,
        failed = stats.failed,
        malformed = stats.malformed,
        timed_out = stats.timed_out,
        cancelled = stats.cancelled,
        "Orchestrator shutdown complete"
    );

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
