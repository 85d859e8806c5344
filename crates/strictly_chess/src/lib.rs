//! Strictly Chess - pure chess position logic.
//!
//! Wraps the `chess` crate's move generator with the pieces a game server
//! needs on top of raw legality:
//!
//! - **Moves** arrive as `(from, to, promotion?)` strings and are resolved
//!   against the legal move list
//! - **Records** are Standard Algebraic Notation
//! - **Snapshots** are FEN with real move counters
//! - **Terminations** cover mate, stalemate and the draw rules the `chess`
//!   crate leaves to the caller (fifty moves, repetition, bare material)

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod material;
mod notation;
mod position;

pub use chess::Color;
pub use error::MoveError;
pub use notation::{parse_promotion, parse_square};
pub use position::{Played, Position, Termination};
