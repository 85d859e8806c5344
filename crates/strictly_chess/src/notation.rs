//! Square parsing and Standard Algebraic Notation.

use crate::MoveError;
use chess::{Board, BoardStatus, ChessMove, File, MoveGen, Piece, Rank, Square};

/// Parses an algebraic square name such as `e4` (case insensitive).
pub fn parse_square(name: &str) -> Result<Square, MoveError> {
    let lowered = name.trim().to_ascii_lowercase();
    let bytes = lowered.as_bytes();
    match bytes {
        [file @ b'a'..=b'h', rank @ b'1'..=b'8'] => Ok(Square::make_square(
            Rank::from_index((rank - b'1') as usize),
            File::from_index((file - b'a') as usize),
        )),
        _ => Err(MoveError::InvalidSquare(name.to_string())),
    }
}

/// Parses a promotion letter (`q`, `r`, `b`, `n`, case insensitive).
pub fn parse_promotion(letter: &str) -> Result<Piece, MoveError> {
    match letter.trim().to_ascii_lowercase().as_str() {
        "q" => Ok(Piece::Queen),
        "r" => Ok(Piece::Rook),
        "b" => Ok(Piece::Bishop),
        "n" => Ok(Piece::Knight),
        _ => Err(MoveError::InvalidPromotion(letter.to_string())),
    }
}

fn piece_letter(piece: Piece) -> Option<char> {
    match piece {
        Piece::Pawn => None,
        Piece::Knight => Some('N'),
        Piece::Bishop => Some('B'),
        Piece::Rook => Some('R'),
        Piece::Queen => Some('Q'),
        Piece::King => Some('K'),
    }
}

fn file_char(square: Square) -> char {
    (b'a' + square.get_file().to_index() as u8) as char
}

fn rank_char(square: Square) -> char {
    (b'1' + square.get_rank().to_index() as u8) as char
}

/// Formats a legal move in SAN relative to the board it is played on.
pub(crate) fn san(board: &Board, mv: ChessMove) -> String {
    let source = mv.get_source();
    let dest = mv.get_dest();
    let mut out = String::new();

    let Some(piece) = board.piece_on(source) else {
        return format!("{}{}", source, dest);
    };

    let file_shift = source.get_file().to_index().abs_diff(dest.get_file().to_index());
    if piece == Piece::King && file_shift == 2 {
        if dest.get_file().to_index() > source.get_file().to_index() {
            out.push_str("O-O");
        } else {
            out.push_str("O-O-O");
        }
    } else {
        // En passant lands on an empty square but still changes file.
        let capture = board.piece_on(dest).is_some() || (piece == Piece::Pawn && file_shift != 0);

        match piece_letter(piece) {
            None => {
                if capture {
                    out.push(file_char(source));
                }
            }
            Some(letter) => {
                out.push(letter);
                out.push_str(&disambiguation(board, mv, piece));
            }
        }

        if capture {
            out.push('x');
        }
        out.push_str(&dest.to_string());

        if let Some(promoted) = mv.get_promotion().and_then(piece_letter) {
            out.push('=');
            out.push(promoted);
        }
    }

    let after = board.make_move_new(mv);
    if after.status() == BoardStatus::Checkmate {
        out.push('#');
    } else if after.checkers().popcnt() > 0 {
        out.push('+');
    }
    out
}

fn disambiguation(board: &Board, mv: ChessMove, piece: Piece) -> String {
    let source = mv.get_source();
    let rivals: Vec<Square> = MoveGen::new_legal(board)
        .filter(|other| other.get_dest() == mv.get_dest() && other.get_source() != source)
        .filter(|other| board.piece_on(other.get_source()) == Some(piece))
        .map(|other| other.get_source())
        .collect();

    if rivals.is_empty() {
        String::new()
    } else if rivals.iter().all(|sq| sq.get_file() != source.get_file()) {
        file_char(source).to_string()
    } else if rivals.iter().all(|sq| sq.get_rank() != source.get_rank()) {
        rank_char(source).to_string()
    } else {
        source.to_string()
    }
}
