//! Standard Algebraic Notation (SAN) generation and parsing.
//!
//! SAN examples: `e4`, `Nf3`, `Bxe5`, `O-O`, `e8=Q+`, `Raxd1#`.

use crate::engine::board::Position;
use crate::engine::types::{ChessError, Move, PieceType, SpecialMove, Square};

// =========================================================================
// SAN generation
// =========================================================================

/// Convert a move to SAN.
///
/// `pos` is the position the move is played from. The check and mate
/// suffixes come from the move's `is_check`/`is_checkmate` flags, so encode
/// after those are known.
pub fn encode(pos: &Position, mv: &Move) -> Result<String, ChessError> {
    let mut san = String::with_capacity(8);

    match mv.special {
        SpecialMove::CastleKingside => san.push_str("O-O"),
        SpecialMove::CastleQueenside => san.push_str("O-O-O"),
        _ if mv.piece == PieceType::Pawn => {
            if mv.is_capture() {
                // Pawn captures name the departure file: "exd5".
                san.push(mv.from.file_char());
                san.push('x');
            }
            san.push_str(&mv.to.to_algebraic());
            if let Some(promo) = mv.promotion {
                san.push('=');
                san.push(promo.letter());
            }
        }
        _ => {
            san.push(mv.piece.letter());
            san.push_str(&disambiguation(pos, mv)?);
            if mv.is_capture() {
                san.push('x');
            }
            san.push_str(&mv.to.to_algebraic());
        }
    }

    if mv.is_checkmate {
        san.push('#');
    } else if mv.is_check {
        san.push('+');
    }
    Ok(san)
}

/// Minimal origin hint when another piece of the same type can also reach
/// the destination: file if that suffices, else rank, else both.
fn disambiguation(pos: &Position, mv: &Move) -> Result<String, ChessError> {
    let mut rivals = Vec::new();
    for other in pos.pieces_of(mv.color) {
        if other.kind != mv.piece || other.square == mv.from {
            continue;
        }
        if pos.legal_moves(other.square)?.iter().any(|m| m.to == mv.to) {
            rivals.push(other.square);
        }
    }

    if rivals.is_empty() {
        return Ok(String::new());
    }

    let same_file = rivals.iter().any(|s| s.file() == mv.from.file());
    let same_rank = rivals.iter().any(|s| s.rank() == mv.from.rank());

    Ok(match (same_file, same_rank) {
        (false, _) => mv.from.file_char().to_string(),
        (true, false) => mv.from.rank_char().to_string(),
        (true, true) => mv.from.to_algebraic(),
    })
}

// =========================================================================
// SAN parsing
// =========================================================================

/// The pieces of a SAN token after grammar validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SanToken {
    Castle(SpecialMove),
    Move {
        piece: PieceType,
        file: Option<u8>,
        rank: Option<u8>,
        to: Square,
        promotion: Option<PieceType>,
    },
}

/// Check `text` against the SAN grammar:
/// `O-O | O-O-O | [NBRQK][a-h][1-8][x]<square>[=[QRBN]][+|#]`.
///
/// The capture marker is accepted but carries no weight when resolving.
fn parse_token(text: &str) -> Option<SanToken> {
    let body = text.strip_suffix(['+', '#']).unwrap_or(text);

    match body {
        "O-O" | "0-0" => return Some(SanToken::Castle(SpecialMove::CastleKingside)),
        "O-O-O" | "0-0-0" => return Some(SanToken::Castle(SpecialMove::CastleQueenside)),
        _ => {}
    }

    let mut chars: Vec<char> = body.chars().collect();

    // Promotion suffix: "=Q" or a bare trailing letter.
    let mut promotion = None;
    if chars.len() > 2
        && let Some(kind) = chars.last().copied().and_then(PieceType::from_letter)
    {
        if !kind.is_promotion_target() {
            return None;
        }
        chars.pop();
        if chars.last() == Some(&'=') {
            chars.pop();
        }
        promotion = Some(kind);
    }

    // Destination: the last two characters.
    if chars.len() < 2 {
        return None;
    }
    let dest: String = chars.split_off(chars.len() - 2).into_iter().collect();
    let to = Square::from_algebraic(&dest).ok()?;

    // Optional piece letter.
    let mut rest = chars.as_slice();
    let piece = match rest.first().copied().and_then(PieceType::from_letter) {
        Some(kind) => {
            rest = &rest[1..];
            kind
        }
        None => PieceType::Pawn,
    };
    if promotion.is_some() && piece != PieceType::Pawn {
        return None;
    }

    // Optional file, rank and capture marker, in that order.
    let mut file = None;
    let mut rank = None;
    if let Some(&c) = rest.first()
        && ('a'..='h').contains(&c)
    {
        file = Some(c as u8 - b'a' + 1);
        rest = &rest[1..];
    }
    if let Some(&c) = rest.first()
        && ('1'..='8').contains(&c)
    {
        rank = Some(c as u8 - b'0');
        rest = &rest[1..];
    }
    let capture = rest.first() == Some(&'x');
    if capture {
        rest = &rest[1..];
    }
    // Pawn captures always name the origin file.
    if !rest.is_empty() || (capture && piece == PieceType::Pawn && file.is_none()) {
        return None;
    }

    Some(SanToken::Move {
        piece,
        file,
        rank,
        to,
        promotion,
    })
}

/// Resolve SAN text to a legal move for the side to move.
///
/// A promotion without a stated piece comes back with `promotion: None`;
/// the caller decides how to fill it in.
pub fn decode(pos: &Position, text: &str) -> Result<Move, ChessError> {
    let text = text.trim();
    let token = parse_token(text).ok_or_else(|| ChessError::IllegalNotation(text.to_string()))?;
    let us = pos.side_to_move();

    let (piece, file, rank, to, promotion) = match token {
        SanToken::Castle(side) => {
            let king = pos.king(us)?.square;
            return pos
                .legal_moves(king)?
                .into_iter()
                .find(|m| m.special == side)
                .ok_or_else(|| ChessError::IllegalNotation(text.to_string()));
        }
        SanToken::Move {
            piece,
            file,
            rank,
            to,
            promotion,
        } => (piece, file, rank, to, promotion),
    };

    let mut candidates = Vec::new();
    for p in pos.pieces_of(us) {
        if p.kind != piece
            || file.is_some_and(|f| p.square.file() != f)
            || rank.is_some_and(|r| p.square.rank() != r)
        {
            continue;
        }
        candidates.extend(
            pos.legal_moves(p.square)?
                .into_iter()
                .filter(|m| m.to == to && !m.special.is_castling()),
        );
    }

    let mut mv = match candidates.len() {
        0 => return Err(ChessError::IllegalNotation(text.to_string())),
        1 => candidates.remove(0),
        _ => {
            return Err(ChessError::AmbiguousMove {
                san: text.to_string(),
                candidates: candidates.iter().map(Move::to_uci).collect(),
            });
        }
    };

    match (mv.special, promotion) {
        (SpecialMove::Promotion, chosen) => mv.promotion = chosen,
        (_, Some(_)) => return Err(ChessError::IllegalNotation(text.to_string())),
        (_, None) => {}
    }
    Ok(mv)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    /// SAN of the move `from`-`to` as recorded after playing it.
    fn san(fen: &str, from: &str, to: &str, promo: Option<PieceType>) -> String {
        let p = pos(fen);
        let mut mv = p
            .legal_moves(sq(from))
            .unwrap()
            .into_iter()
            .find(|m| m.to == sq(to))
            .unwrap();
        mv.promotion = promo;
        p.play(mv).unwrap().last_move().unwrap().san.clone()
    }

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    // -------------------------------------------------------------------
    // Encoding
    // -------------------------------------------------------------------

    #[test]
    fn san_pawn_push_and_piece_move() {
        assert_eq!(san(START, "e2", "e4", None), "e4");
        assert_eq!(san(START, "g1", "f3", None), "Nf3");
    }

    #[test]
    fn san_pawn_capture_uses_origin_file() {
        let fen = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2";
        assert_eq!(san(fen, "e4", "d5", None), "exd5");
    }

    #[test]
    fn san_en_passant() {
        let fen = "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3";
        assert_eq!(san(fen, "e5", "f6", None), "exf6");
    }

    #[test]
    fn san_castling() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        assert_eq!(san(fen, "e1", "g1", None), "O-O");
        assert_eq!(san(fen, "e1", "c1", None), "O-O-O");
    }

    #[test]
    fn san_promotion_with_check() {
        let fen = "7k/4P3/8/8/8/8/8/4K3 w - - 0 1";
        assert_eq!(san(fen, "e7", "e8", Some(PieceType::Queen)), "e8=Q+");
        assert_eq!(san(fen, "e7", "e8", Some(PieceType::Knight)), "e8=N");
    }

    #[test]
    fn san_mate_suffix() {
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq g3 0 2";
        assert_eq!(san(fen, "d8", "h4", None), "Qh4#");
    }

    #[test]
    fn san_disambiguates_by_file() {
        let fen = "7k/8/8/8/8/8/8/R4RK1 w - - 0 1";
        assert_eq!(san(fen, "a1", "d1", None), "Rad1");
        assert_eq!(san(fen, "f1", "d1", None), "Rfd1");
    }

    #[test]
    fn san_disambiguates_by_rank() {
        let fen = "7k/8/8/R7/8/8/8/R5K1 w - - 0 1";
        assert_eq!(san(fen, "a1", "a3", None), "R1a3");
        assert_eq!(san(fen, "a5", "a3", None), "R5a3");
    }

    #[test]
    fn san_disambiguates_by_square() {
        let fen = "8/7k/8/8/8/Q7/8/Q1Q3K1 w - - 0 1";
        assert_eq!(san(fen, "a1", "b2", None), "Qa1b2");
        assert_eq!(san(fen, "c1", "b2", None), "Qcb2");
    }

    #[test]
    fn san_pinned_rival_needs_no_hint() {
        // The e2 knight also reaches d4 but is pinned by the e8 rook.
        let fen = "4r1k1/8/8/5N2/8/8/4N3/4K3 w - - 0 1";
        assert_eq!(san(fen, "f5", "d4", None), "Nd4");
    }

    // -------------------------------------------------------------------
    // Decoding
    // -------------------------------------------------------------------

    #[test]
    fn decode_simple_moves() {
        let p = Position::starting();
        let mv = decode(&p, "e4").unwrap();
        assert_eq!((mv.from, mv.to), (sq("e2"), sq("e4")));
        let mv = decode(&p, "Nf3").unwrap();
        assert_eq!((mv.from, mv.to), (sq("g1"), sq("f3")));
    }

    #[test]
    fn decode_castling_and_alias() {
        let p = pos("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        assert_eq!(decode(&p, "O-O").unwrap().special, SpecialMove::CastleKingside);
        assert_eq!(decode(&p, "0-0-0").unwrap().special, SpecialMove::CastleQueenside);
        assert!(matches!(decode(&p, "Kg1"), Err(ChessError::IllegalNotation(_))));
    }

    #[test]
    fn decode_ignores_capture_marker_and_suffix() {
        let p = Position::starting();
        assert_eq!(decode(&p, "Nxf3+").unwrap().to, sq("f3"));
    }

    #[test]
    fn decode_pawn_capture_needs_origin_file() {
        let p = pos("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1");
        assert!(matches!(decode(&p, "xd5"), Err(ChessError::IllegalNotation(_))));
        assert!(matches!(decode(&p, "4xd5"), Err(ChessError::IllegalNotation(_))));
        let mv = decode(&p, "exd5").unwrap();
        assert_eq!((mv.from, mv.to), (sq("e4"), sq("d5")));
    }

    #[test]
    fn decode_ambiguous() {
        let p = pos("7k/8/8/8/8/8/8/R4RK1 w - - 0 1");
        match decode(&p, "Rd1") {
            Err(ChessError::AmbiguousMove { candidates, .. }) => {
                assert_eq!(candidates.len(), 2);
                assert!(candidates.contains(&"a1d1".to_string()));
            }
            other => panic!("expected AmbiguousMove, got {other:?}"),
        }
        assert_eq!(decode(&p, "Rad1").unwrap().from, sq("a1"));
        assert!(matches!(
            decode(&p, "R1d1"),
            Err(ChessError::AmbiguousMove { .. })
        ));
    }

    #[test]
    fn decode_rejects_bad_text() {
        let p = Position::starting();
        for bad in ["", "Zz9", "e9", "Nf6", "e5", "Pe4x", "Nf3=Q", "O-O", "e4e5"] {
            assert!(
                matches!(decode(&p, bad), Err(ChessError::IllegalNotation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn decode_promotion_forms() {
        let p = pos("7k/4P3/8/8/8/8/8/4K3 w - - 0 1");
        assert_eq!(decode(&p, "e8=Q").unwrap().promotion, Some(PieceType::Queen));
        assert_eq!(decode(&p, "e8N").unwrap().promotion, Some(PieceType::Knight));
        let pending = decode(&p, "e8").unwrap();
        assert_eq!(pending.special, SpecialMove::Promotion);
        assert_eq!(pending.promotion, None);
        assert!(matches!(decode(&p, "e8=K"), Err(ChessError::IllegalNotation(_))));
    }

    #[test]
    fn promotion_letter_on_plain_move_rejected() {
        let p = Position::starting();
        assert!(matches!(decode(&p, "e4=Q"), Err(ChessError::IllegalNotation(_))));
    }

    // -------------------------------------------------------------------
    // Round trip over every legal move
    // -------------------------------------------------------------------

    #[test]
    fn encode_decode_round_trip() {
        for fen in [START, KIWIPETE, "7k/4P3/8/8/8/8/8/4K3 w - - 0 1"] {
            let p = pos(fen);
            for mut mv in p.all_legal_moves().unwrap() {
                if mv.special == SpecialMove::Promotion {
                    mv.promotion = Some(PieceType::Rook);
                }
                let next = p.play(mv.clone()).unwrap();
                let text = &next.last_move().unwrap().san;
                let back = decode(&p, text).unwrap();
                assert_eq!(
                    (back.from, back.to, back.promotion),
                    (mv.from, mv.to, mv.promotion),
                    "round trip of {text} in {fen}"
                );
            }
        }
    }
}
