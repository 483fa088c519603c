use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// The two sides in a chess game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Index for array lookups: White=0, Black=1. Also the king's slot in
    /// a position's piece list.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Rank step of this side's pawns: +1 for White, -1 for Black.
    #[inline]
    pub const fn pawn_direction(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// Back rank holding this side's king and rooks at the start.
    #[inline]
    pub const fn home_rank(self) -> u8 {
        match self {
            Color::White => 1,
            Color::Black => 8,
        }
    }

    /// Rank this side's pawns start on.
    #[inline]
    pub const fn pawn_rank(self) -> u8 {
        match self {
            Color::White => 2,
            Color::Black => 7,
        }
    }

    /// Rank on which this side's pawns promote.
    #[inline]
    pub const fn promotion_rank(self) -> u8 {
        match self {
            Color::White => 8,
            Color::Black => 1,
        }
    }
}

impl std::ops::Not for Color {
    type Output = Self;
    fn not(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

// ---------------------------------------------------------------------------
// PieceType
// ---------------------------------------------------------------------------

/// The six piece kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceType {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceType {
    /// All piece types in order.
    pub const ALL: [PieceType; 6] = [
        PieceType::Pawn,
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ];

    /// Pieces a pawn may promote to, strongest first.
    pub const PROMOTIONS: [PieceType; 4] = [
        PieceType::Queen,
        PieceType::Rook,
        PieceType::Bishop,
        PieceType::Knight,
    ];

    /// Material value in points.
    pub fn value(self) -> u32 {
        match self {
            PieceType::Pawn => 1,
            PieceType::Knight | PieceType::Bishop => 3,
            PieceType::Rook => 5,
            PieceType::Queen => 9,
            PieceType::King => 0,
        }
    }

    /// Whether a pawn may promote to this kind.
    pub fn is_promotion_target(self) -> bool {
        Self::PROMOTIONS.contains(&self)
    }

    /// Uppercase SAN letter (`P` for pawns, which SAN itself never prints).
    pub fn letter(self) -> char {
        match self {
            PieceType::Pawn => 'P',
            PieceType::Knight => 'N',
            PieceType::Bishop => 'B',
            PieceType::Rook => 'R',
            PieceType::Queen => 'Q',
            PieceType::King => 'K',
        }
    }

    /// Parse an uppercase SAN piece letter. Pawns have no letter.
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'N' => Some(PieceType::Knight),
            'B' => Some(PieceType::Bishop),
            'R' => Some(PieceType::Rook),
            'Q' => Some(PieceType::Queen),
            'K' => Some(PieceType::King),
            _ => None,
        }
    }

    /// Single uppercase letter for white, lowercase for black.
    pub fn to_char(self, color: Color) -> char {
        match color {
            Color::White => self.letter(),
            Color::Black => self.letter().to_ascii_lowercase(),
        }
    }

    /// Parse a FEN piece character; case gives the color.
    pub fn from_char(c: char) -> Option<(Color, PieceType)> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let piece = match c.to_ascii_uppercase() {
            'P' => PieceType::Pawn,
            other => PieceType::from_letter(other)?,
        };
        Some((color, piece))
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PieceType::Pawn => write!(f, "pawn"),
            PieceType::Knight => write!(f, "knight"),
            PieceType::Bishop => write!(f, "bishop"),
            PieceType::Rook => write!(f, "rook"),
            PieceType::Queen => write!(f, "queen"),
            PieceType::King => write!(f, "king"),
        }
    }
}

// ---------------------------------------------------------------------------
// Square
// ---------------------------------------------------------------------------

/// A board coordinate. Files and ranks both run 1..=8 (a1 = (1, 1)).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// Build a square, rejecting coordinates outside `[1, 8]`.
    pub fn new(file: u8, rank: u8) -> Result<Self, ChessError> {
        if (1..=8).contains(&file) && (1..=8).contains(&rank) {
            Ok(Square { file, rank })
        } else {
            Err(ChessError::InvalidSquare(format!("({file}, {rank})")))
        }
    }

    /// Unchecked constructor for coordinates the caller knows are on the board.
    #[inline]
    pub(crate) const fn at(file: u8, rank: u8) -> Self {
        debug_assert!(file >= 1 && file <= 8 && rank >= 1 && rank <= 8);
        Square { file, rank }
    }

    #[inline]
    pub fn file(self) -> u8 {
        self.file
    }

    #[inline]
    pub fn rank(self) -> u8 {
        self.rank
    }

    /// Zero-based file, 0 for the a-file.
    #[inline]
    pub fn file_index(self) -> usize {
        (self.file - 1) as usize
    }

    /// Zero-based rank, 0 for the first rank.
    #[inline]
    pub fn rank_index(self) -> usize {
        (self.rank - 1) as usize
    }

    /// File letter, `'a'..='h'`.
    #[inline]
    pub fn file_char(self) -> char {
        (b'a' + self.file - 1) as char
    }

    /// Rank digit, `'1'..='8'`.
    #[inline]
    pub fn rank_char(self) -> char {
        (b'0' + self.rank) as char
    }

    /// The square `df` files and `dr` ranks away, if it is on the board.
    #[inline]
    pub fn offset(self, df: i8, dr: i8) -> Option<Square> {
        let file = self.file as i8 + df;
        let rank = self.rank as i8 + dr;
        if (1..=8).contains(&file) && (1..=8).contains(&rank) {
            Some(Square::at(file as u8, rank as u8))
        } else {
            None
        }
    }

    /// Parse algebraic notation like "e4".
    pub fn from_algebraic(s: &str) -> Result<Self, ChessError> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(ChessError::InvalidSquare(s.to_string()));
        }
        let file = bytes[0].wrapping_sub(b'a').wrapping_add(1);
        let rank = bytes[1].wrapping_sub(b'0');
        Square::new(file, rank).map_err(|_| ChessError::InvalidSquare(s.to_string()))
    }

    /// Convert to algebraic notation like "e4".
    pub fn to_algebraic(self) -> String {
        format!("{}{}", self.file_char(), self.rank_char())
    }

    /// Every square, a1 first, then along the rank.
    pub fn all() -> impl Iterator<Item = Square> {
        (1..=8u8).flat_map(|rank| (1..=8u8).map(move |file| Square::at(file, rank)))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file_char(), self.rank_char())
    }
}

impl FromStr for Square {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Square::from_algebraic(s)
    }
}

impl Serialize for Square {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Piece
// ---------------------------------------------------------------------------

/// A piece on the board. Positions own their pieces outright; a move
/// produces a new position whose copy of the piece has the new square.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    pub kind: PieceType,
    pub color: Color,
    pub square: Square,
    /// Set once the piece has left its starting square. Governs the pawn
    /// double step and castling eligibility.
    pub moved: bool,
}

impl Piece {
    pub fn new(kind: PieceType, color: Color, square: Square) -> Self {
        Piece {
            kind,
            color,
            square,
            moved: false,
        }
    }

    #[inline]
    pub fn value(&self) -> u32 {
        self.kind.value()
    }

    /// FEN character for this piece.
    #[inline]
    pub fn to_char(&self) -> char {
        self.kind.to_char(self.color)
    }
}

// ---------------------------------------------------------------------------
// SpecialMove
// ---------------------------------------------------------------------------

/// Move kinds with side effects beyond relocating one piece.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SpecialMove {
    #[default]
    Normal,
    CastleKingside,
    CastleQueenside,
    EnPassant,
    Promotion,
}

impl SpecialMove {
    #[inline]
    pub fn is_castling(self) -> bool {
        matches!(self, SpecialMove::CastleKingside | SpecialMove::CastleQueenside)
    }
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// A proposed or completed move.
///
/// Generators build these with the derived fields (`is_check`,
/// `is_checkmate`, `san`) unset. They are filled in once, when the move is
/// played into a game, against the resulting position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: PieceType,
    pub color: Color,
    /// The captured piece as it stood before the move. For en passant
    /// its square differs from `to`.
    pub captured: Option<Piece>,
    pub special: SpecialMove,
    /// Chosen promotion piece. `None` on a `Promotion` move means the
    /// choice is still pending.
    pub promotion: Option<PieceType>,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub san: String,
}

impl Move {
    /// A quiet move of `piece` to `to`.
    pub fn new(piece: &Piece, to: Square) -> Self {
        Move {
            from: piece.square,
            to,
            piece: piece.kind,
            color: piece.color,
            captured: None,
            special: SpecialMove::Normal,
            promotion: None,
            is_check: false,
            is_checkmate: false,
            san: String::new(),
        }
    }

    /// A move of `piece` that takes `victim`.
    pub fn capture(piece: &Piece, to: Square, victim: Piece) -> Self {
        Move {
            captured: Some(victim),
            ..Move::new(piece, to)
        }
    }

    /// Same move with a different special kind.
    pub fn with_special(self, special: SpecialMove) -> Self {
        Move { special, ..self }
    }

    #[inline]
    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    /// Long algebraic form used by UCI: `e2e4`, `e7e8q`.
    pub fn to_uci(&self) -> String {
        let mut s = format!("{}{}", self.from, self.to);
        if let Some(promo) = self.promotion {
            s.push(promo.letter().to_ascii_lowercase());
        }
        s
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.san.is_empty() {
            write!(f, "{}", self.to_uci())
        } else {
            write!(f, "{}", self.san)
        }
    }
}

// ---------------------------------------------------------------------------
// MoveRequest
// ---------------------------------------------------------------------------

/// What a caller asks for: origin, destination and an optional promotion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceType>,
}

impl MoveRequest {
    pub fn new(from: Square, to: Square) -> Self {
        MoveRequest {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(from: Square, to: Square, promotion: PieceType) -> Self {
        MoveRequest {
            from,
            to,
            promotion: Some(promotion),
        }
    }

    /// Parse coordinate notation: `e2e4`, `e7e8q` (UCI) or `e7e8=Q`.
    pub fn from_coordinates(s: &str) -> Result<Self, ChessError> {
        let s = s.trim();
        if !s.is_ascii() || s.len() < 4 {
            return Err(ChessError::IllegalNotation(s.to_string()));
        }
        let from =
            Square::from_algebraic(&s[0..2]).map_err(|_| ChessError::IllegalNotation(s.into()))?;
        let to =
            Square::from_algebraic(&s[2..4]).map_err(|_| ChessError::IllegalNotation(s.into()))?;
        let promotion = match &s[4..] {
            "" => None,
            rest => {
                let letter = rest.strip_prefix('=').unwrap_or(rest);
                let mut chars = letter.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(
                        PieceType::from_letter(c.to_ascii_uppercase())
                            .filter(|p| p.is_promotion_target())
                            .ok_or_else(|| ChessError::InvalidPromotion(letter.to_string()))?,
                    ),
                    _ => return Err(ChessError::IllegalNotation(s.to_string())),
                }
            }
        };
        Ok(MoveRequest {
            from,
            to,
            promotion,
        })
    }
}

impl From<&Move> for MoveRequest {
    fn from(mv: &Move) -> Self {
        MoveRequest {
            from: mv.from,
            to: mv.to,
            promotion: mv.promotion,
        }
    }
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promo) = self.promotion {
            write!(f, "{}", promo.letter().to_ascii_lowercase())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChessError
// ---------------------------------------------------------------------------

/// Domain errors for the rules engine and its collaborators.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChessError {
    #[error("invalid square: {0}")]
    InvalidSquare(String),

    #[error("no piece on {0}")]
    NoPieceAtSquare(Square),

    #[error("illegal move {from}-{to}; legal moves from {from}: [{}]", .legal.join(", "))]
    IllegalMove {
        from: Square,
        to: Square,
        legal: Vec<String>,
    },

    #[error("invalid promotion: {0}")]
    InvalidPromotion(String),

    #[error("ambiguous move '{san}': candidates [{}]", .candidates.join(", "))]
    AmbiguousMove { san: String, candidates: Vec<String> },

    #[error("illegal notation: '{0}'")]
    IllegalNotation(String),

    #[error("invalid board state: {0}")]
    InvalidBoardState(String),

    #[error("engine protocol error: {0}")]
    EngineProtocol(String),

    #[error("invalid FEN string: {0}")]
    InvalidFen(String),

    #[error("invalid PGN: {0}")]
    InvalidPgn(String),

    #[error("no moves to undo")]
    NothingToUndo,

    #[error("no move to redo")]
    NothingToRedo,
}

impl ChessError {
    /// Structural corruption; the game that raised it must not be reused.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChessError::InvalidBoardState(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
