//! Move resolution errors.

/// Why a candidate move could not be played.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// A square name was not `a1`..`h8`.
    #[display("Invalid square: {:?}", _0)]
    InvalidSquare(String),

    /// The promotion letter was not one of `q`, `r`, `b`, `n`.
    #[display("Invalid promotion piece: {:?}", _0)]
    InvalidPromotion(String),

    /// The origin square holds no piece.
    #[display("No piece on {}", _0)]
    EmptySquare(String),

    /// The move reaches the last rank but names no promotion piece.
    #[display("Promotion piece required for {}{}", from, to)]
    PromotionRequired {
        /// Origin square.
        from: String,
        /// Destination square.
        to: String,
    },

    /// No legal move matches.
    #[display("Illegal move {}{}", from, to)]
    Illegal {
        /// Origin square.
        from: String,
        /// Destination square.
        to: String,
    },

    /// A FEN string could not be loaded.
    #[display("Invalid FEN: {}", _0)]
    InvalidFen(String),

    /// A SAN record did not match any legal move during replay.
    #[display("Unknown move record {:?} at ply {}", record, ply)]
    UnknownRecord {
        /// The offending record.
        record: String,
        /// Zero-based ply index.
        ply: usize,
    },
}

impl std::error::Error for MoveError {}
