//! Strictly Rooms library - multiplayer chess sessions over WebSocket
//!
//! Connections join sessions by key. The first two joiners take the
//! first-mover and second-mover roles, everyone after them spectates.
//! Moves are turn-checked here and judged by a pluggable rules engine.
//!
//! # Architecture
//!
//! - **Protocol**: JSON commands in, JSON events out, both tagged by `type`
//! - **Engine**: the [`RulesEngine`] seam, with [`ChessEngine`] as the default
//! - **Session**: roles, names, move log; produces an [`Outbox`] per operation
//! - **Registry**: session key to session, created on first join
//! - **Gateway**: connection ids, dispatch, disconnect cleanup, delivery
//! - **Server**: axum routes for `/ws`, `/health` and `/sessions`
//!
//! # Example
//!
//! ```no_run
//! use strictly_rooms::{ServerConfig, serve};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::default().with_env()?;
//! serve(&config).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod engine;
mod gateway;
mod protocol;
mod registry;
mod server;
mod session;

// Crate-level exports - Configuration
pub use config::{ConfigError, ServerConfig};

// Crate-level exports - Rules engine seam
pub use engine::{Applied, ChessEngine, Rejection, RulesEngine, Side};

// Crate-level exports - Connection handling
pub use gateway::{DEFAULT_OUTLET_CAPACITY, DisconnectPolicy, Gateway, Outlet};

// Crate-level exports - Wire protocol
pub use protocol::{
    CandidateMove, ChatSender, ClientCommand, CommandError, GameEnd, Role, ServerEvent,
    TerminalReason,
};

// Crate-level exports - Session management
pub use registry::{SessionRegistry, SharedSession, lock_session};
pub use session::{
    ConnectionId, Delivery, MoveOutcome, Outbox, RoleAssignment, Session, SessionKey,
    SessionSettings, SessionSummary,
};

// Crate-level exports - HTTP surface
pub use server::{chess_gateway, router, serve, serve_on};
