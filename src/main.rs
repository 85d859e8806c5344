//! Strictly Rooms - CLI
//!
//! Runs the chess room server or prints its effective configuration.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use strictly_rooms::{DisconnectPolicy, ServerConfig};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            disconnect_policy,
        } => run_server(config, host, port, disconnect_policy).await,
        Command::Config { config } => print_config(config),
    }
}

/// Run the WebSocket room server
#[instrument(skip_all)]
async fn run_server(
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    disconnect_policy: Option<DisconnectPolicy>,
) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,strictly_rooms=debug")),
        )
        .init();

    let config = ServerConfig::load(config.as_deref())?
        .with_env()?
        .with_overrides(host, port, disconnect_policy);

    info!(
        address = %config.bind_address(),
        policy = %config.disconnect_policy(),
        lock_after_game_end = config.lock_after_game_end(),
        "Starting Strictly Rooms server"
    );

    strictly_rooms::serve(&config).await
}

/// Print the effective configuration
fn print_config(config: Option<PathBuf>) -> Result<()> {
    let config = ServerConfig::load(config.as_deref())?.with_env()?;
    print!("{}", config.to_toml()?);
    Ok(())
}
