//! The seam between sessions and game rules.
//!
//! Sessions never look inside a position. They ask the engine whose turn it
//! is, hand it candidate moves, and ask whether the game is over.

use crate::protocol::{CandidateMove, Role, TerminalReason};
use derive_more::{Display, Error};
use strictly_chess::{Color, MoveError, Position, Termination};
use tracing::{debug, instrument};

/// Which side of the underlying game is to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The side that moves first.
    First,
    /// The side that moves second.
    Second,
}

impl From<Role> for Side {
    fn from(role: Role) -> Self {
        match role {
            Role::FirstMover => Side::First,
            Role::SecondMover => Side::Second,
        }
    }
}

impl From<Side> for Role {
    fn from(side: Side) -> Self {
        match side {
            Side::First => Role::FirstMover,
            Side::Second => Role::SecondMover,
        }
    }
}

/// An accepted move.
#[derive(Debug, Clone)]
pub struct Applied<P> {
    /// Position after the move.
    pub position: P,
    /// Canonical notation for the move log.
    pub record: String,
}

/// Why the engine refused a move.
#[derive(Debug, Clone, Display, Error)]
pub enum Rejection {
    /// The move is illegal or its payload is malformed.
    #[display("Rejected: {}", reason)]
    Illegal {
        /// Engine diagnostic.
        reason: String,
    },
    /// The engine failed while evaluating the move.
    #[display("Engine fault: {}", reason)]
    Fault {
        /// Panic payload or diagnostic.
        reason: String,
    },
}

/// Authority over positions and legality.
///
/// Implementations must be pure: the same inputs yield the same outputs and
/// nothing outside the returned values changes.
pub trait RulesEngine: Send + Sync + 'static {
    /// Opaque game state.
    type Position: Clone + Send + 'static;

    /// Returns the starting position.
    fn initial_position(&self) -> Self::Position;

    /// Applies a candidate move, or refuses it.
    fn apply_move(
        &self,
        position: &Self::Position,
        candidate: &CandidateMove,
    ) -> Result<Applied<Self::Position>, Rejection>;

    /// Returns why the position is final, if it is.
    fn is_terminal(&self, position: &Self::Position) -> Option<TerminalReason>;

    /// Returns the side to move.
    fn side_to_move(&self, position: &Self::Position) -> Side;

    /// Serializes a position for clients.
    fn snapshot(&self, position: &Self::Position) -> String;

    /// Human label for a side, used for default chat names.
    fn side_label(&self, side: Side) -> &'static str;
}

/// Standard chess, backed by `strictly_chess`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessEngine;

impl ChessEngine {
    /// Creates the chess engine.
    pub fn new() -> Self {
        Self
    }
}

impl From<Termination> for TerminalReason {
    fn from(termination: Termination) -> Self {
        match termination {
            Termination::Checkmate => TerminalReason::Checkmate,
            Termination::FiftyMoveRule => TerminalReason::Draw,
            Termination::Stalemate => TerminalReason::Stalemate,
            Termination::ThreefoldRepetition => TerminalReason::ThreefoldRepetition,
            Termination::InsufficientMaterial => TerminalReason::InsufficientMaterial,
        }
    }
}

impl From<MoveError> for Rejection {
    fn from(err: MoveError) -> Self {
        Rejection::Illegal {
            reason: err.to_string(),
        }
    }
}

impl RulesEngine for ChessEngine {
    type Position = Position;

    fn initial_position(&self) -> Position {
        Position::new()
    }

    #[instrument(skip(self, position))]
    fn apply_move(
        &self,
        position: &Position,
        candidate: &CandidateMove,
    ) -> Result<Applied<Position>, Rejection> {
        let played = position.play(
            &candidate.from,
            &candidate.to,
            candidate.promotion.as_deref(),
        )?;
        debug!(record = %played.san, "Chess move accepted");
        Ok(Applied {
            position: played.position,
            record: played.san,
        })
    }

    fn is_terminal(&self, position: &Position) -> Option<TerminalReason> {
        let reasons = position.terminations().into_iter().map(TerminalReason::from);
        TerminalReason::most_significant(reasons)
    }

    fn side_to_move(&self, position: &Position) -> Side {
        match position.side_to_move() {
            Color::White => Side::First,
            Color::Black => Side::Second,
        }
    }

    fn snapshot(&self, position: &Position) -> String {
        position.fen()
    }

    fn side_label(&self, side: Side) -> &'static str {
        match side {
            Side::First => "White",
            Side::Second => "Black",
        }
    }
}
