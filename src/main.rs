//! Seisvault Server
//!
//! Run with: cargo run --bin seisvault -- [--config path/to/config.toml]
//!
//! # Configuration
//!
//! Without `--config` the default locations are searched (see
//! `Config::load_default`). Environment variables override file settings:
//! - `SEISVAULT_DATA_DIR`: Catalog directory
//! - `SEISVAULT_API_HOST` / `SEISVAULT_API_PORT`: Bind address
//! - `SEISVAULT_LOG_LEVEL` / `SEISVAULT_LOG_FORMAT`: Logging
//! - `RUST_LOG`: Full tracing filter (takes precedence over the log level)

use anyhow::Context;
use clap::Parser;
use seisvault::api::{serve, ApiConfig, AppState};
use seisvault::config::{Config, LoggingConfig};
use seisvault::documents::PluginRegistry;
use seisvault::waveform::WaveformEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "seisvault")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "FDSN dataselect waveform service")]
struct Args {
    /// Config file (default: search standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Index every waveform file below this directory before serving
    #[arg(long)]
    scan: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_tracing(&config.logging);

    tracing::info!("Starting Seisvault v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Data directory: {}", config.storage.data_dir);

    let engine = Arc::new(
        WaveformEngine::new(config.storage.engine_config())
            .await
            .context("Failed to open waveform catalog")?,
    );

    if let Some(dir) = &args.scan {
        let indexed = engine.index_directory(dir).await?;
        tracing::info!("Initial scan indexed {} files", indexed);
    }

    let documents = Arc::new(PluginRegistry::with_builtin(&config.documents)?);
    if config.auth.users.is_empty() {
        tracing::warn!("No users configured; queryauth will reject every request");
    }

    let api_config = ApiConfig::from(&config.api);
    let state = AppState::new(engine, documents, api_config.clone()).with_auth(config.auth.clone());

    serve(state, &api_config).await?;

    tracing::info!("Seisvault stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("seisvault={},tower_http={}", logging.level, logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}
