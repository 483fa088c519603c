//! Piece-list chess position.
//!
//! `Position` is a snapshot: active pieces (white king at index 0, black king
//! at index 1), captured pieces in capture order, the move that produced it,
//! and the side to move. Playing a move never mutates a position; it builds
//! the next one.

use crate::engine::movegen::{self, candidate_moves};
use crate::engine::san;
use crate::engine::types::{ChessError, Color, Move, Piece, PieceType, SpecialMove, Square};

/// Standard starting position in FEN.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const BACK_RANK: [PieceType; 8] = [
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Queen,
    PieceType::King,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Rook,
];

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A complete chess position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    /// Active pieces. Index 0 is the white king, index 1 the black king.
    pieces: Vec<Piece>,

    /// Pieces taken so far, oldest first.
    captured: Vec<Piece>,

    /// The move that produced this position (`None` for a starting position).
    last_move: Option<Move>,

    /// Whose turn it is.
    side_to_move: Color,

    /// Plies since the last pawn move or capture (FEN only).
    halfmove_clock: u16,

    /// Full-move number (starts at 1, incremented after Black moves).
    fullmove_number: u16,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Position {
    /// Standard starting position.
    pub fn starting() -> Self {
        let mut pieces = vec![
            Piece::new(PieceType::King, Color::White, Square::at(5, 1)),
            Piece::new(PieceType::King, Color::Black, Square::at(5, 8)),
        ];
        for color in [Color::White, Color::Black] {
            for (file, kind) in (1u8..).zip(BACK_RANK) {
                if kind != PieceType::King {
                    pieces.push(Piece::new(kind, color, Square::at(file, color.home_rank())));
                }
            }
            for file in 1..=8 {
                pieces.push(Piece::new(
                    PieceType::Pawn,
                    color,
                    Square::at(file, color.pawn_rank()),
                ));
            }
        }

        Position {
            pieces,
            captured: Vec::new(),
            last_move: None,
            side_to_move: Color::White,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The piece (if any) on a square.
    pub fn piece_at(&self, sq: Square) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.square == sq)
    }

    fn index_of(&self, sq: Square) -> Option<usize> {
        self.pieces.iter().position(|p| p.square == sq)
    }

    /// All active pieces, kings first.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Active pieces of one colour.
    pub fn pieces_of(&self, color: Color) -> impl Iterator<Item = &Piece> {
        self.pieces.iter().filter(move |p| p.color == color)
    }

    /// Pieces removed from the board, oldest first.
    pub fn captured(&self) -> &[Piece] {
        &self.captured
    }

    /// The move that led here.
    pub fn last_move(&self) -> Option<&Move> {
        self.last_move.as_ref()
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn fullmove_number(&self) -> u16 {
        self.fullmove_number
    }

    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove_clock
    }

    /// The king of `color`, read from its fixed slot.
    ///
    /// A missing king means the position is corrupt; the error is fatal.
    pub fn king(&self, color: Color) -> Result<&Piece, ChessError> {
        self.pieces
            .get(color.index())
            .filter(|p| p.kind == PieceType::King && p.color == color)
            .ok_or_else(|| {
                ChessError::InvalidBoardState(format!("{color} king missing from slot {}", color.index()))
            })
    }

    /// Sum of point values of `color`'s active pieces.
    pub fn material(&self, color: Color) -> u32 {
        self.pieces_of(color).map(Piece::value).sum()
    }

    // -----------------------------------------------------------------------
    // Check, legality, mate
    // -----------------------------------------------------------------------

    /// Is `color`'s king attacked, i.e. can some enemy candidate move
    /// capture on the king's square?
    pub fn in_check(&self, color: Color) -> Result<bool, ChessError> {
        let king_sq = self.king(color)?.square;
        Ok(self
            .pieces
            .iter()
            .filter(|p| p.color != color)
            .any(|p| {
                candidate_moves(p, self)
                    .iter()
                    .any(|m| m.is_capture() && m.to == king_sq)
            }))
    }

    /// Legal moves of the piece on `sq`: its candidates minus those that
    /// leave its own king attacked. Empty if the square is empty.
    pub fn legal_moves(&self, sq: Square) -> Result<Vec<Move>, ChessError> {
        let Some(piece) = self.piece_at(sq) else {
            return Ok(Vec::new());
        };
        let mut legal = Vec::new();
        for mv in candidate_moves(piece, self) {
            if self.keeps_king_safe(&mv)? {
                legal.push(mv);
            }
        }
        Ok(legal)
    }

    /// Legal moves for every piece of the side to move.
    pub fn all_legal_moves(&self) -> Result<Vec<Move>, ChessError> {
        let mut legal = Vec::new();
        for piece in self.pieces_of(self.side_to_move) {
            legal.extend(self.legal_moves(piece.square)?);
        }
        Ok(legal)
    }

    /// True when `color` has no legal move.
    ///
    /// This does not also require `color` to be in check, so a stalemate
    /// reports `true` as well. Use `in_check` to tell the two apart.
    pub fn is_mate(&self, color: Color) -> Result<bool, ChessError> {
        for piece in self.pieces_of(color) {
            if !self.legal_moves(piece.square)?.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn keeps_king_safe(&self, mv: &Move) -> Result<bool, ChessError> {
        // The promotion piece cannot affect the mover's own king; probe with a queen.
        let next = if mv.special == SpecialMove::Promotion && mv.promotion.is_none() {
            self.make(&Move {
                promotion: Some(PieceType::Queen),
                ..mv.clone()
            })?
        } else {
            self.make(mv)?
        };
        Ok(!next.in_check(mv.color)?)
    }

    // -----------------------------------------------------------------------
    // Playing moves
    // -----------------------------------------------------------------------

    /// Play a legal move and return the resulting position. The move stored
    /// as its `last_move` carries check/mate flags and SAN.
    ///
    /// The caller must pass a move taken from `legal_moves` with any
    /// promotion choice filled in.
    pub fn play(&self, mut mv: Move) -> Result<Position, ChessError> {
        let mut next = self.make(&mv)?;
        let opponent = !mv.color;
        mv.is_check = next.in_check(opponent)?;
        mv.is_checkmate = next.is_mate(opponent)?;
        mv.san = san::encode(self, &mv)?;
        next.last_move = Some(mv);
        Ok(next)
    }

    /// Build the position after `mv`: relocate the mover, apply captures and
    /// special-move side effects, advance the turn.
    fn make(&self, mv: &Move) -> Result<Position, ChessError> {
        let mut next = self.clone();
        let mut mover = next.index_of(mv.from).ok_or_else(|| {
            ChessError::InvalidBoardState(format!("no piece on {} to move", mv.from))
        })?;

        // ---- Capture (en passant victims sit beside the destination) ----
        if let Some(victim) = mv.captured {
            if victim.kind == PieceType::King {
                return Err(ChessError::InvalidBoardState(format!(
                    "{} king captured on {}",
                    victim.color, victim.square
                )));
            }
            let at = next.index_of(victim.square).ok_or_else(|| {
                ChessError::InvalidBoardState(format!("no piece to capture on {}", victim.square))
            })?;
            let taken = next.pieces.remove(at);
            next.captured.push(taken);
            if at < mover {
                mover -= 1;
            }
        }

        // ---- Move the piece ----
        let piece = &mut next.pieces[mover];
        piece.square = mv.to;
        piece.moved = true;

        if mv.special == SpecialMove::Promotion {
            piece.kind = match mv.promotion {
                Some(kind) if kind.is_promotion_target() => kind,
                Some(kind) => return Err(ChessError::InvalidPromotion(kind.to_string())),
                None => {
                    return Err(ChessError::InvalidPromotion(format!(
                        "{} needs a promotion piece",
                        mv.to_uci()
                    )));
                }
            };
        }

        // ---- Castling: the rook comes along ----
        if let Some((_, rook_from, rook_to)) =
            movegen::castling_squares(mv.special, mv.color.home_rank())
        {
            let rook = next.index_of(rook_from).ok_or_else(|| {
                ChessError::InvalidBoardState(format!("no rook on {rook_from} to castle with"))
            })?;
            next.pieces[rook].square = rook_to;
            next.pieces[rook].moved = true;
        }

        // ---- Clocks and turn ----
        next.halfmove_clock = if mv.piece == PieceType::Pawn || mv.is_capture() {
            0
        } else {
            self.halfmove_clock.saturating_add(1)
        };
        if mv.color == Color::Black {
            next.fullmove_number = self.fullmove_number.saturating_add(1);
        }
        next.side_to_move = !mv.color;
        next.last_move = Some(mv.clone());

        Ok(next)
    }

    // -----------------------------------------------------------------------
    // Board display (8×8 text grid)
    // -----------------------------------------------------------------------

    /// Render the board as an 8-line string (rank 8 at top).
    pub fn board_string(&self) -> String {
        let mut grid = [['.'; 8]; 8];
        for p in &self.pieces {
            grid[p.square.rank_index()][p.square.file_index()] = p.to_char();
        }

        let mut s = String::with_capacity(200);
        for (rank, row) in grid.iter().enumerate().rev() {
            s.push((b'1' + rank as u8) as char);
            s.push(' ');
            for (file, ch) in row.iter().enumerate() {
                s.push(*ch);
                if file < 7 {
                    s.push(' ');
                }
            }
            s.push('\n');
        }
        s.push_str("  a b c d e f g h");
        s
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::starting()
    }
}

// ---------------------------------------------------------------------------
// FEN parsing & generation
// ---------------------------------------------------------------------------

/// Castling availability as read from or written to FEN: K, Q, k, q.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct CastlingFlags([bool; 4]);

impl CastlingFlags {
    /// Flag index and rook corner for each FEN letter.
    const CORNERS: [(char, Color, u8); 4] = [
        ('K', Color::White, 8),
        ('Q', Color::White, 1),
        ('k', Color::Black, 8),
        ('q', Color::Black, 1),
    ];

    fn parse(s: &str) -> Option<Self> {
        let mut flags = CastlingFlags::default();
        if s == "-" {
            return Some(flags);
        }
        for c in s.chars() {
            let idx = Self::CORNERS.iter().position(|&(l, _, _)| l == c)?;
            flags.0[idx] = true;
        }
        Some(flags)
    }

    fn any_for(self, color: Color) -> bool {
        Self::CORNERS
            .iter()
            .zip(self.0)
            .any(|(&(_, c, _), set)| set && c == color)
    }

    fn has_corner(self, color: Color, sq: Square) -> bool {
        Self::CORNERS
            .iter()
            .zip(self.0)
            .any(|(&(_, c, file), set)| set && c == color && sq == Square::at(file, color.home_rank()))
    }
}

impl Position {
    /// Parse a FEN string into a `Position`.
    ///
    /// Moved flags are inferred: pawns off their start rank have moved, and
    /// kings and rooks are unmoved only where the castling field allows it.
    /// An en-passant field becomes the double step that made it possible.
    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(ChessError::InvalidFen(format!(
                "expected 6 fields, got {}",
                fields.len()
            )));
        }

        // ----- Field 1: Piece placement -----
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(ChessError::InvalidFen(format!(
                "expected 8 ranks, got {}",
                ranks.len()
            )));
        }

        let mut kings: [Option<Piece>; 2] = [None, None];
        let mut others = Vec::new();
        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let rank = 8 - rank_idx as u8; // FEN starts from rank 8
            let mut file: u8 = 1;
            for ch in rank_str.chars() {
                if file > 8 {
                    return Err(ChessError::InvalidFen(format!(
                        "too many squares in rank {rank}"
                    )));
                }
                if let Some(digit) = ch.to_digit(10) {
                    if !(1..=8).contains(&digit) {
                        return Err(ChessError::InvalidFen(format!(
                            "invalid empty count '{ch}' in rank {rank}"
                        )));
                    }
                    file += digit as u8;
                } else if let Some((color, kind)) = PieceType::from_char(ch) {
                    let piece = Piece::new(kind, color, Square::at(file, rank));
                    if kind == PieceType::King {
                        if kings[color.index()].replace(piece).is_some() {
                            return Err(ChessError::InvalidFen(format!(
                                "{color} has more than one king"
                            )));
                        }
                    } else {
                        others.push(piece);
                    }
                    file += 1;
                } else {
                    return Err(ChessError::InvalidFen(format!(
                        "invalid character '{ch}' in piece placement"
                    )));
                }
            }
            if file != 9 {
                return Err(ChessError::InvalidFen(format!(
                    "rank {rank} has {} squares instead of 8",
                    file - 1
                )));
            }
        }

        let [Some(white_king), Some(black_king)] = kings else {
            return Err(ChessError::InvalidFen(
                "each side needs exactly one king".to_string(),
            ));
        };

        // ----- Field 2: Side to move -----
        let side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(ChessError::InvalidFen(format!(
                    "invalid side to move: '{other}'"
                )));
            }
        };

        // ----- Field 3: Castling availability -----
        let castling = CastlingFlags::parse(fields[2]).ok_or_else(|| {
            ChessError::InvalidFen(format!("invalid castling string: '{}'", fields[2]))
        })?;

        let mut pieces = Vec::with_capacity(2 + others.len());
        pieces.push(white_king);
        pieces.push(black_king);
        pieces.extend(others);
        for piece in &mut pieces {
            piece.moved = match piece.kind {
                PieceType::Pawn => piece.square.rank() != piece.color.pawn_rank(),
                PieceType::King => {
                    !(castling.any_for(piece.color)
                        && piece.square == Square::at(5, piece.color.home_rank()))
                }
                PieceType::Rook => !castling.has_corner(piece.color, piece.square),
                _ => false,
            };
        }

        let mut pos = Position {
            pieces,
            captured: Vec::new(),
            last_move: None,
            side_to_move,
            halfmove_clock: 0,
            fullmove_number: 1,
        };

        // ----- Field 4: En passant target square -----
        if fields[3] != "-" {
            let ep_sq = Square::from_algebraic(fields[3]).map_err(|_| {
                ChessError::InvalidFen(format!("invalid en passant square: '{}'", fields[3]))
            })?;
            pos.last_move = Some(double_step_through(&pos, ep_sq)?);
        }

        // ----- Field 5: Halfmove clock -----
        pos.halfmove_clock = fields[4].parse::<u16>().map_err(|_| {
            ChessError::InvalidFen(format!("invalid halfmove clock: '{}'", fields[4]))
        })?;

        // ----- Field 6: Fullmove number -----
        pos.fullmove_number = fields[5].parse::<u16>().map_err(|_| {
            ChessError::InvalidFen(format!("invalid fullmove number: '{}'", fields[5]))
        })?;
        if pos.fullmove_number == 0 {
            return Err(ChessError::InvalidFen(
                "fullmove number must be >= 1".to_string(),
            ));
        }

        // The side that just moved cannot still be in check.
        if pos.in_check(!side_to_move)? {
            return Err(ChessError::InvalidFen(format!(
                "{} is in check but not to move",
                !side_to_move
            )));
        }

        Ok(pos)
    }

    /// Export the position as a FEN string.
    pub fn to_fen(&self) -> String {
        let mut fen = String::with_capacity(80);

        // ----- Field 1: Piece placement -----
        for rank in (1..=8u8).rev() {
            let mut empty_count = 0u8;
            for file in 1..=8u8 {
                match self.piece_at(Square::at(file, rank)) {
                    Some(piece) => {
                        if empty_count > 0 {
                            fen.push((b'0' + empty_count) as char);
                            empty_count = 0;
                        }
                        fen.push(piece.to_char());
                    }
                    None => empty_count += 1,
                }
            }
            if empty_count > 0 {
                fen.push((b'0' + empty_count) as char);
            }
            if rank > 1 {
                fen.push('/');
            }
        }

        // ----- Field 2: Side to move -----
        fen.push(' ');
        fen.push(match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        });

        // ----- Field 3: Castling -----
        fen.push(' ');
        let castling = self.castling_fen();
        fen.push_str(&castling);

        // ----- Field 4: En passant -----
        fen.push(' ');
        match self.en_passant_square() {
            Some(sq) => fen.push_str(&sq.to_algebraic()),
            None => fen.push('-'),
        }

        // ----- Fields 5 & 6: Clocks -----
        fen.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));

        fen
    }

    fn castling_fen(&self) -> String {
        let mut s = String::with_capacity(4);
        for (letter, color, rook_file) in CastlingFlags::CORNERS {
            let home = color.home_rank();
            let king_ready = self
                .king(color)
                .is_ok_and(|k| !k.moved && k.square == Square::at(5, home));
            let rook_ready = matches!(
                self.piece_at(Square::at(rook_file, home)),
                Some(r) if r.kind == PieceType::Rook && r.color == color && !r.moved
            );
            if king_ready && rook_ready {
                s.push(letter);
            }
        }
        if s.is_empty() {
            s.push('-');
        }
        s
    }

    /// The square a pawn just skipped over with a double step, if any.
    pub fn en_passant_square(&self) -> Option<Square> {
        let last = self.last_move.as_ref()?;
        if last.piece == PieceType::Pawn && last.from.rank().abs_diff(last.to.rank()) == 2 {
            last.from.offset(0, last.color.pawn_direction())
        } else {
            None
        }
    }
}

/// Reconstruct the double step implied by a FEN en-passant square.
fn double_step_through(pos: &Position, ep_sq: Square) -> Result<Move, ChessError> {
    let mover = match ep_sq.rank() {
        3 => Color::White,
        6 => Color::Black,
        _ => {
            return Err(ChessError::InvalidFen(format!(
                "en passant square {ep_sq} is not on rank 3 or 6"
            )));
        }
    };
    if mover == pos.side_to_move {
        return Err(ChessError::InvalidFen(format!(
            "en passant square {ep_sq} does not fit side to move"
        )));
    }
    let dir = mover.pawn_direction();
    let (Some(from), Some(to)) = (ep_sq.offset(0, -dir), ep_sq.offset(0, dir)) else {
        return Err(ChessError::InvalidFen(format!(
            "en passant square {ep_sq} is off the board"
        )));
    };
    if let Some(blocker) = [ep_sq, from].into_iter().find(|s| pos.piece_at(*s).is_some()) {
        return Err(ChessError::InvalidFen(format!(
            "en passant square {ep_sq} needs {blocker} to be empty"
        )));
    }
    match pos.piece_at(to) {
        Some(pawn) if pawn.kind == PieceType::Pawn && pawn.color == mover => {
            let before = Piece {
                square: from,
                moved: false,
                ..*pawn
            };
            Ok(Move::new(&before, to))
        }
        _ => Err(ChessError::InvalidFen(format!(
            "no {mover} pawn on {to} for en passant square {ep_sq}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.board_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    fn find(p: &Position, from: &str, to: &str) -> Move {
        p.legal_moves(sq(from))
            .unwrap()
            .into_iter()
            .find(|m| m.to == sq(to))
            .unwrap_or_else(|| panic!("{from}{to} is not legal"))
    }

    // ===================================================================
    // Starting position
    // ===================================================================

    #[test]
    fn starting_position_fen() {
        assert_eq!(Position::starting().to_fen(), STARTING_FEN);
    }

    #[test]
    fn starting_position_matches_parsed_fen() {
        assert_eq!(pos(STARTING_FEN).to_fen(), Position::starting().to_fen());
    }

    #[test]
    fn kings_hold_fixed_slots() {
        let p = Position::starting();
        assert_eq!(p.pieces().len(), 32);
        assert_eq!(p.king(Color::White).unwrap().square, sq("e1"));
        assert_eq!(p.king(Color::Black).unwrap().square, sq("e8"));
        assert_eq!(p.pieces()[0].kind, PieceType::King);
        assert_eq!(p.pieces()[1].color, Color::Black);
    }

    #[test]
    fn starting_material() {
        let p = Position::starting();
        assert_eq!(p.material(Color::White), 39);
        assert_eq!(p.material(Color::Black), 39);
    }

    #[test]
    fn starting_position_has_20_moves() {
        assert_eq!(Position::starting().all_legal_moves().unwrap().len(), 20);
    }

    // ===================================================================
    // FEN
    // ===================================================================

    #[test]
    fn fen_round_trips() {
        for fen in [
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r3k2r/8/8/8/8/8/8/R3K2R w Kq - 3 20",
        ] {
            assert_eq!(pos(fen).to_fen(), fen);
        }
    }

    #[test]
    fn fen_rejects_bad_input() {
        for bad in [
            "",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQxq - 0 1",
            "rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq e3 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 0",
            "8/8/8/8/8/8/8/4K3 w - - 0 1",
            "4k3/8/8/8/8/8/8/3KK3 w - - 0 1",
        ] {
            assert!(
                matches!(Position::from_fen(bad), Err(ChessError::InvalidFen(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn fen_rejects_side_not_to_move_in_check() {
        // White to move but the black king on e8 is attacked by the rook on e1.
        assert!(matches!(
            Position::from_fen("4k3/8/8/8/8/8/8/K3R3 w - - 0 1"),
            Err(ChessError::InvalidFen(_))
        ));
    }

    #[test]
    fn fen_infers_moved_flags() {
        let p = pos("r3k2r/8/8/8/8/4P3/3P4/R3K2R w Kq - 0 1");
        assert!(!p.piece_at(sq("d2")).unwrap().moved);
        assert!(p.piece_at(sq("e3")).unwrap().moved);
        assert!(!p.piece_at(sq("h1")).unwrap().moved);
        assert!(p.piece_at(sq("a1")).unwrap().moved);
        assert!(!p.king(Color::White).unwrap().moved);
        assert!(p.piece_at(sq("h8")).unwrap().moved);
    }

    // ===================================================================
    // Check / mate
    // ===================================================================

    #[test]
    fn in_check_detects_attack() {
        let p = pos("4k3/8/8/8/8/8/8/R3K2q w - - 0 1");
        assert!(p.in_check(Color::White).unwrap());
        assert!(!p.in_check(Color::Black).unwrap());
    }

    #[test]
    fn pawn_gives_check_diagonally_only() {
        let p = pos("8/8/8/8/8/4k3/3P4/4K3 b - - 0 1");
        assert!(p.in_check(Color::Black).unwrap());
        let p = pos("8/8/8/8/8/3k4/3P4/4K3 b - - 0 1");
        assert!(!p.in_check(Color::Black).unwrap());
    }

    #[test]
    fn fools_mate_is_mate() {
        let p = pos("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3");
        assert!(p.in_check(Color::White).unwrap());
        assert!(p.is_mate(Color::White).unwrap());
        assert!(!p.is_mate(Color::Black).unwrap());
    }

    #[test]
    fn stalemate_reports_as_mate_without_check() {
        let p = pos("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1");
        assert!(!p.in_check(Color::Black).unwrap());
        assert!(p.is_mate(Color::Black).unwrap());
    }

    #[test]
    fn pinned_piece_cannot_leave_line() {
        // Knight on e2 pinned by the rook on e8.
        let p = pos("4r1k1/8/8/8/8/8/4N3/4K3 w - - 0 1");
        assert!(p.legal_moves(sq("e2")).unwrap().is_empty());
    }

    #[test]
    fn king_cannot_step_into_attack() {
        let p = pos("3r2k1/8/8/8/8/8/8/4K3 w - - 0 1");
        let dests: Vec<Square> = p.legal_moves(sq("e1")).unwrap().iter().map(|m| m.to).collect();
        assert!(!dests.contains(&sq("d1")));
        assert!(!dests.contains(&sq("d2")));
        assert!(dests.contains(&sq("f2")));
    }

    #[test]
    fn legal_moves_from_empty_square() {
        assert!(Position::starting().legal_moves(sq("e4")).unwrap().is_empty());
    }

    #[test]
    fn missing_king_is_fatal() {
        let mut p = Position::starting();
        p.pieces.swap(0, 5);
        let err = p.in_check(Color::White).unwrap_err();
        assert!(err.is_fatal());
    }

    // ===================================================================
    // Playing moves
    // ===================================================================

    #[test]
    fn play_switches_side_and_records_move() {
        let p = Position::starting();
        let next = p.play(find(&p, "e2", "e4")).unwrap();
        assert_eq!(next.side_to_move(), Color::Black);
        assert_eq!(next.last_move().unwrap().san, "e4");
        assert!(next.piece_at(sq("e4")).unwrap().moved);
        assert!(next.piece_at(sq("e2")).is_none());
        assert_eq!(next.to_fen(), "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
    }

    #[test]
    fn capture_moves_piece_to_captured() {
        let p = pos("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2");
        let next = p.play(find(&p, "e4", "d5")).unwrap();
        assert_eq!(next.captured().len(), 1);
        assert_eq!(next.captured()[0].kind, PieceType::Pawn);
        assert_eq!(next.captured()[0].color, Color::Black);
        assert_eq!(next.pieces().len(), 31);
        assert_eq!(next.material(Color::Black), 38);
    }

    #[test]
    fn en_passant_removes_passed_pawn() {
        let p = pos("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3");
        let next = p.play(find(&p, "e5", "f6")).unwrap();
        assert!(next.piece_at(sq("f5")).is_none());
        assert_eq!(next.piece_at(sq("f6")).unwrap().color, Color::White);
        assert_eq!(next.captured()[0].square, sq("f5"));
    }

    #[test]
    fn fullmove_number_saturates() {
        let p = pos("4k3/8/8/8/8/8/8/4K3 b - - 0 65535");
        let next = p.play(find(&p, "e8", "d8")).unwrap();
        assert_eq!(next.fullmove_number(), u16::MAX);
        assert_eq!(next.side_to_move(), Color::White);
    }

    #[test]
    fn en_passant_square_must_be_empty() {
        for fen in [
            "4k3/8/8/8/4P3/4N3/4B3/4K3 b - e3 0 1",
            "4k3/8/8/8/4P3/8/4B3/4K3 b - e3 0 1",
            "4k3/3n4/3n4/3p4/8/8/8/4K3 w - d6 0 2",
        ] {
            assert!(
                matches!(Position::from_fen(fen), Err(ChessError::InvalidFen(_))),
                "accepted {fen}"
            );
        }
        assert!(Position::from_fen("4k3/8/8/8/4P3/8/8/4K3 b - e3 0 1").is_ok());
    }

    #[test]
    fn castling_moves_rook_too() {
        let p = pos("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let next = p.play(find(&p, "e1", "c1")).unwrap();
        let king = next.king(Color::White).unwrap();
        assert_eq!(king.square, sq("c1"));
        assert!(king.moved);
        let rook = next.piece_at(sq("d1")).unwrap();
        assert_eq!(rook.kind, PieceType::Rook);
        assert!(rook.moved);
        assert!(next.piece_at(sq("a1")).is_none());
        assert_eq!(next.last_move().unwrap().san, "O-O-O");
        assert_eq!(next.to_fen(), "r3k2r/8/8/8/8/8/8/2KR3R b kq - 1 1");
    }

    #[test]
    fn promotion_needs_a_piece() {
        let p = pos("7k/4P3/8/8/8/8/8/4K3 w - - 0 1");
        let mv = find(&p, "e7", "e8");
        assert!(matches!(
            p.play(mv.clone()),
            Err(ChessError::InvalidPromotion(_))
        ));

        let promoted = p
            .play(Move {
                promotion: Some(PieceType::Knight),
                ..mv.clone()
            })
            .unwrap();
        assert_eq!(promoted.piece_at(sq("e8")).unwrap().kind, PieceType::Knight);

        assert!(matches!(
            p.play(Move {
                promotion: Some(PieceType::King),
                ..mv
            }),
            Err(ChessError::InvalidPromotion(_))
        ));
    }

    #[test]
    fn play_flags_check_and_mate() {
        let p = pos("rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq g3 0 2");
        let next = p.play(find(&p, "d8", "h4")).unwrap();
        let mv = next.last_move().unwrap();
        assert!(mv.is_check);
        assert!(mv.is_checkmate);
        assert_eq!(mv.san, "Qh4#");
    }

    #[test]
    fn board_string_layout() {
        let s = Position::starting().board_string();
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines[0], "8 r n b q k b n r");
        assert_eq!(lines[7], "1 R N B Q K B N R");
        assert_eq!(lines[8], "  a b c d e f g h");
    }
}
