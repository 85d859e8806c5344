//! Chess position with move counters and repetition history.

use crate::material::insufficient_material;
use crate::notation::{parse_promotion, parse_square, san};
use crate::MoveError;
use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece};
use std::str::FromStr;
use tracing::{debug, instrument};

/// Halfmove clock value at which the fifty-move rule applies.
const FIFTY_MOVE_PLIES: u32 = 100;

/// Why a position ends the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Termination {
    /// Side to move is mated.
    Checkmate,
    /// Side to move has no legal move and is not in check.
    Stalemate,
    /// A hundred plies without a pawn move or capture.
    FiftyMoveRule,
    /// The same position occurred three times.
    ThreefoldRepetition,
    /// Neither side has mating material.
    InsufficientMaterial,
}

/// Result of playing a move.
#[derive(Debug, Clone)]
pub struct Played {
    /// Position after the move.
    pub position: Position,
    /// SAN record of the move.
    pub san: String,
}

/// A chess position: board plus the state FEN and draw rules need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
    /// Hashes of every position reached, current one last.
    seen: Vec<u64>,
}

impl Position {
    /// Creates the standard starting position.
    pub fn new() -> Self {
        let board = Board::default();
        Self {
            seen: vec![board.get_hash()],
            board,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// Loads a position from FEN. Missing move counters default to `0 1`.
    #[instrument]
    pub fn from_fen(fen: &str) -> Result<Self, MoveError> {
        let board = Board::from_str(fen).map_err(|e| MoveError::InvalidFen(e.to_string()))?;
        let fields: Vec<&str> = fen.split_whitespace().collect();
        let halfmove_clock = fields.get(4).and_then(|f| f.parse().ok()).unwrap_or(0);
        let fullmove_number = fields
            .get(5)
            .and_then(|f| f.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);

        Ok(Self {
            seen: vec![board.get_hash()],
            board,
            halfmove_clock,
            fullmove_number,
        })
    }

    /// Re-plays SAN records from the starting position.
    #[instrument(skip(records), fields(plies = records.len()))]
    pub fn replay<S: AsRef<str>>(records: &[S]) -> Result<Self, MoveError> {
        let mut position = Self::new();
        for (ply, record) in records.iter().enumerate() {
            let record = record.as_ref();
            let mv = MoveGen::new_legal(&position.board)
                .find(|mv| san(&position.board, *mv) == record)
                .ok_or_else(|| MoveError::UnknownRecord {
                    record: record.to_string(),
                    ply,
                })?;
            position = position.apply(mv).position;
        }
        Ok(position)
    }

    /// Returns the side to move.
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    /// Returns the halfmove clock used by the fifty-move rule.
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    /// Returns the fullmove number.
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Serializes the position as FEN.
    ///
    /// The en passant field names the target square behind the pushed pawn,
    /// and only when a capture there is legal.
    pub fn fen(&self) -> String {
        let board_fen = self.board.to_string();
        let fields: Vec<&str> = board_fen.split_whitespace().take(3).collect();
        let en_passant = self
            .board
            .en_passant()
            .map(|pawn| pawn.uforward(self.board.side_to_move()).to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} {} {} {}",
            fields.join(" "),
            en_passant,
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    /// Plays a move given as origin, destination and optional promotion letter.
    ///
    /// The promotion letter is ignored unless the move actually promotes.
    #[instrument(skip(self), fields(fen = %self.fen()))]
    pub fn play(
        &self,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Result<Played, MoveError> {
        let mv = self.resolve(from, to, promotion)?;
        Ok(self.apply(mv))
    }

    fn resolve(
        &self,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Result<ChessMove, MoveError> {
        let source = parse_square(from)?;
        let dest = parse_square(to)?;
        let promotion = promotion
            .filter(|letter| !letter.trim().is_empty())
            .map(parse_promotion)
            .transpose()?;

        if self.board.piece_on(source).is_none() {
            return Err(MoveError::EmptySquare(source.to_string()));
        }

        let candidates: Vec<ChessMove> = MoveGen::new_legal(&self.board)
            .filter(|mv| mv.get_source() == source && mv.get_dest() == dest)
            .collect();

        let illegal = || MoveError::Illegal {
            from: source.to_string(),
            to: dest.to_string(),
        };

        if candidates.iter().any(|mv| mv.get_promotion().is_some()) {
            let piece = promotion.ok_or_else(|| MoveError::PromotionRequired {
                from: source.to_string(),
                to: dest.to_string(),
            })?;
            candidates
                .into_iter()
                .find(|mv| mv.get_promotion() == Some(piece))
                .ok_or_else(illegal)
        } else {
            candidates.into_iter().next().ok_or_else(illegal)
        }
    }

    fn apply(&self, mv: ChessMove) -> Played {
        let record = san(&self.board, mv);
        let mover = self.board.side_to_move();
        let resets_clock = self.board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            || self.board.piece_on(mv.get_dest()).is_some();

        let board = self.board.make_move_new(mv);
        let mut seen = self.seen.clone();
        seen.push(board.get_hash());

        debug!(san = %record, "Move applied");

        Played {
            position: Self {
                board,
                halfmove_clock: if resets_clock { 0 } else { self.halfmove_clock + 1 },
                fullmove_number: if mover == Color::Black {
                    self.fullmove_number + 1
                } else {
                    self.fullmove_number
                },
                seen,
            },
            san: record,
        }
    }

    /// Lists every termination condition that holds, in no particular order.
    pub fn terminations(&self) -> Vec<Termination> {
        let mut found = Vec::new();
        match self.board.status() {
            BoardStatus::Checkmate => found.push(Termination::Checkmate),
            BoardStatus::Stalemate => found.push(Termination::Stalemate),
            BoardStatus::Ongoing => {}
        }
        if self.halfmove_clock >= FIFTY_MOVE_PLIES {
            found.push(Termination::FiftyMoveRule);
        }
        if self.repetitions() >= 3 {
            found.push(Termination::ThreefoldRepetition);
        }
        if insufficient_material(&self.board) {
            found.push(Termination::InsufficientMaterial);
        }
        found
    }

    /// How many times the current position has occurred.
    pub fn repetitions(&self) -> usize {
        let current = self.board.get_hash();
        self.seen.iter().filter(|hash| **hash == current).count()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}
