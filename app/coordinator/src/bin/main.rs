//! Abusim coordinator binary entry point.
//!
//! Loads TOML configuration, applies command-line overrides, serves the
//! agent port and the HTTP API, and shuts down on ctrl-c or SIGTERM.

use abusim_coordinator::{CoordinatorConfig, config::CONFIG_FILE, serve_with_config};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Coordinator for abusim agent simulations.
#[derive(Parser, Debug)]
#[command(name = "abusim-coordinator", version)]
struct Cli {
    /// Configuration file. Defaults apply when it does not exist.
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,
    /// Address agents connect to, overriding the config file.
    #[arg(long)]
    agent_address: Option<String>,
    /// Address of the HTTP API, overriding the config file.
    #[arg(long)]
    http_address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log level from RUST_LOG (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = CoordinatorConfig::load_or_default(&cli.config)?;
    if let Some(addr) = cli.agent_address {
        config.server.agent_address = addr;
    }
    if let Some(addr) = cli.http_address {
        config.server.http_address = addr;
    }

    let handle = serve_with_config(&config).await?;
    shutdown_signal().await;
    handle.shutdown().await?;

    tracing::info!("coordinator shut down");
    Ok(())
}

/// Wait for ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("received shutdown signal");
}
