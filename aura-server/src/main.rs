//! Aura gateway binary entry point
//!
//! Loads the configuration, builds the provider registry and dispatcher,
//! and serves the HTTP API until ctrl-c.

use anyhow::{Context, Result};
use aura_core::{config, gateway};
use aura_server::{build_router, AppState};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Aura - multi-provider LLM gateway with automatic fallback
#[derive(Parser, Debug)]
#[command(name = "aura-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (.yaml, .yml or .json)
    #[arg(short, long, env = "AURA_CONFIG", default_value = "aura.yaml")]
    config: PathBuf,

    /// Listen address, overrides server.host
    #[arg(long, env = "AURA_HOST")]
    host: Option<String>,

    /// Listen port, overrides server.port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = config::load_from_path(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    info!(path = %cli.config.display(), providers = config.providers.len(), "Loaded configuration");

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let dispatcher = gateway::build_dispatcher(&config).context("Failed to build dispatcher")?;
    let app = build_router(AppState::new(dispatcher));

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("Aura gateway listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Aura gateway shut down");
    Ok(())
}

/// Wait for ctrl-c
async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
