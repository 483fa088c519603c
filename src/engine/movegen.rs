//! Pseudo-legal move generation, one strategy per piece kind.
//!
//! Generators read a `Position` and never mutate it. They ignore whether the
//! mover's own king ends up attacked; `Position::legal_moves` filters that by
//! playing each candidate on a copy and testing for check.

use crate::engine::board::Position;
use crate::engine::types::{Move, Piece, PieceType, SpecialMove, Square};

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

const ROOK_DIRECTIONS: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

// =========================================================================
// Public API
// =========================================================================

/// Pseudo-legal candidate moves for `piece` in `pos`.
pub fn candidate_moves(piece: &Piece, pos: &Position) -> Vec<Move> {
    let mut moves = Vec::with_capacity(28);
    match piece.kind {
        PieceType::Pawn => pawn_moves(piece, pos, &mut moves),
        PieceType::Knight => step_moves(piece, pos, &KNIGHT_OFFSETS, &mut moves),
        PieceType::Bishop => slide_moves(piece, pos, &BISHOP_DIRECTIONS, &mut moves),
        PieceType::Rook => slide_moves(piece, pos, &ROOK_DIRECTIONS, &mut moves),
        PieceType::Queen => {
            slide_moves(piece, pos, &ROOK_DIRECTIONS, &mut moves);
            slide_moves(piece, pos, &BISHOP_DIRECTIONS, &mut moves);
        }
        PieceType::King => {
            step_moves(piece, pos, &KING_OFFSETS, &mut moves);
            castling_moves(piece, pos, &mut moves);
        }
    }
    moves
}

/// Home squares of the king and rook involved in a castle, and where each
/// lands. Returns `(king_to, rook_from, rook_to)` for the given side's
/// back rank.
pub fn castling_squares(special: SpecialMove, home_rank: u8) -> Option<(Square, Square, Square)> {
    match special {
        SpecialMove::CastleKingside => Some((
            Square::at(7, home_rank),
            Square::at(8, home_rank),
            Square::at(6, home_rank),
        )),
        SpecialMove::CastleQueenside => Some((
            Square::at(3, home_rank),
            Square::at(1, home_rank),
            Square::at(4, home_rank),
        )),
        _ => None,
    }
}

// =========================================================================
// Sliders (bishop, rook, queen)
// =========================================================================

fn slide_moves(piece: &Piece, pos: &Position, directions: &[(i8, i8)], moves: &mut Vec<Move>) {
    for &(df, dr) in directions {
        let mut current = piece.square;
        while let Some(next) = current.offset(df, dr) {
            match pos.piece_at(next) {
                None => moves.push(Move::new(piece, next)),
                Some(other) => {
                    if other.color != piece.color {
                        moves.push(Move::capture(piece, next, *other));
                    }
                    break;
                }
            }
            current = next;
        }
    }
}

// =========================================================================
// Steppers (knight, king)
// =========================================================================

fn step_moves(piece: &Piece, pos: &Position, offsets: &[(i8, i8)], moves: &mut Vec<Move>) {
    for &(df, dr) in offsets {
        let Some(to) = piece.square.offset(df, dr) else {
            continue;
        };
        match pos.piece_at(to) {
            None => moves.push(Move::new(piece, to)),
            Some(other) if other.color != piece.color => {
                moves.push(Move::capture(piece, to, *other));
            }
            Some(_) => {}
        }
    }
}

// =========================================================================
// Castling
// =========================================================================

/// Castling candidates: king and rook unmoved on their home squares with
/// nothing between them. Attacks on the squares the king crosses are not
/// examined; only the landing square is vetted by the legality filter.
fn castling_moves(king: &Piece, pos: &Position, moves: &mut Vec<Move>) {
    let home = king.color.home_rank();
    if king.moved || king.square != Square::at(5, home) {
        return;
    }

    for special in [SpecialMove::CastleKingside, SpecialMove::CastleQueenside] {
        let Some((king_to, rook_from, _)) = castling_squares(special, home) else {
            continue;
        };
        let rook_ready = matches!(
            pos.piece_at(rook_from),
            Some(rook) if rook.kind == PieceType::Rook && rook.color == king.color && !rook.moved
        );
        if !rook_ready {
            continue;
        }

        let (low, high) = if rook_from.file() < king.square.file() {
            (rook_from.file() + 1, king.square.file())
        } else {
            (king.square.file() + 1, rook_from.file())
        };
        let path_clear = (low..high).all(|file| pos.piece_at(Square::at(file, home)).is_none());
        if path_clear {
            moves.push(Move::new(king, king_to).with_special(special));
        }
    }
}

// =========================================================================
// Pawns
// =========================================================================

fn pawn_moves(pawn: &Piece, pos: &Position, moves: &mut Vec<Move>) {
    let dir = pawn.color.pawn_direction();

    // Pushes land on empty squares only.
    if let Some(one) = pawn.square.offset(0, dir)
        && pos.piece_at(one).is_none()
    {
        moves.push(tag_promotion(pawn, Move::new(pawn, one)));

        if !pawn.moved
            && let Some(two) = one.offset(0, dir)
            && pos.piece_at(two).is_none()
        {
            moves.push(Move::new(pawn, two));
        }
    }

    // Diagonals count only as captures.
    for df in [-1, 1] {
        let Some(to) = pawn.square.offset(df, dir) else {
            continue;
        };
        match pos.piece_at(to) {
            Some(other) if other.color != pawn.color => {
                moves.push(tag_promotion(pawn, Move::capture(pawn, to, *other)));
            }
            Some(_) => {}
            None => {
                if let Some(victim) = en_passant_victim(pawn, pos, to) {
                    moves.push(Move::capture(pawn, to, victim).with_special(SpecialMove::EnPassant));
                }
            }
        }
    }
}

/// Mark a pawn move reaching the last rank as a promotion. The piece it
/// becomes is chosen when the move is applied.
fn tag_promotion(pawn: &Piece, mv: Move) -> Move {
    if mv.to.rank() == pawn.color.promotion_rank() {
        mv.with_special(SpecialMove::Promotion)
    } else {
        mv
    }
}

/// The enemy pawn `pawn` may take en passant by moving to `to`: it must
/// have just double-stepped to the adjacent file on `pawn`'s rank, passing
/// through `to`.
fn en_passant_victim(pawn: &Piece, pos: &Position, to: Square) -> Option<Piece> {
    let last = pos.last_move()?;
    if last.piece != PieceType::Pawn || last.color == pawn.color {
        return None;
    }
    if last.from.rank().abs_diff(last.to.rank()) != 2 {
        return None;
    }
    if last.to.rank() != pawn.square.rank() || last.to.file() != to.file() {
        return None;
    }
    pos.piece_at(last.to)
        .copied()
        .filter(|victim| victim.kind == PieceType::Pawn && victim.color != pawn.color)
}

// =========================================================================
// Tests
// =========================================================================
