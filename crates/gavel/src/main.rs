//! gavel: run the group-management bot. Configuration comes from
//! `gavel.toml` (or `--config`), overridden by `GAVEL_*` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gavel::app;
use gavel_runtime::config::{ConfigLoader, validate_config};
use gavel_runtime::logging;
use tracing::info;

#[derive(Parser)]
#[command(name = "gavel")]
#[command(about = "A modular Telegram group-management bot", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file to load instead of searching the default locations.
    #[arg(short, long, env = "GAVEL_CONFIG")]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `production`.
    #[arg(short, long, env = "GAVEL_PROFILE")]
    profile: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(profile) = &cli.profile {
        loader = loader.profile(profile);
    }
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let config = loader.load().context("failed to load configuration")?;
    validate_config(&config).context("invalid configuration")?;

    logging::init_from_config(&config.logging);
    info!(version = env!("CARGO_PKG_VERSION"), mode = ?config.transport.mode, "Starting gavel");

    app::run(config).await
}
