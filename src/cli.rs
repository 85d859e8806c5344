//! Command-line interface for strictly_rooms.

use clap::{Parser, Subcommand};
use strictly_rooms::DisconnectPolicy;

/// Strictly Rooms - multiplayer chess rooms over WebSocket
#[derive(Parser, Debug)]
#[command(name = "strictly_rooms")]
#[command(about = "Chess room server with roles, spectators and chat", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the WebSocket room server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Host to bind to (overrides config and HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// How disconnects locate their session
        #[arg(long, value_enum)]
        disconnect_policy: Option<DisconnectPolicy>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,
    },
}
