//! Insufficient-material detection.

use chess::{BitBoard, Board, Piece, Square};

/// Returns true when neither side can possibly deliver mate.
///
/// Covers bare kings, a single minor piece, and any number of bishops all
/// standing on squares of one colour.
pub(crate) fn insufficient_material(board: &Board) -> bool {
    let kings = *board.pieces(Piece::King);
    let others = *board.combined() & !kings;

    match others.popcnt() {
        0 => true,
        1 => {
            let minors = *board.pieces(Piece::Knight) | *board.pieces(Piece::Bishop);
            (others & minors).popcnt() == 1
        }
        _ => {
            let bishops = *board.pieces(Piece::Bishop);
            others == bishops && single_square_colour(bishops)
        }
    }
}

fn single_square_colour(squares: BitBoard) -> bool {
    let mut colours = squares.map(square_colour);
    match colours.next() {
        Some(first) => colours.all(|c| c == first),
        None => true,
    }
}

fn square_colour(square: Square) -> usize {
    (square.get_file().to_index() + square.get_rank().to_index()) % 2
}
