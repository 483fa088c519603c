//! Stateful game controller wrapping Position.
//!
//! `Game` owns the position history, the single-entry redo buffer, change
//! listeners and the promotion prompt. It is the only place positions are
//! advanced; every mutation either fully succeeds or leaves the game as it
//! was.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::engine::board::Position;
use crate::engine::san;
use crate::engine::types::{ChessError, Color, Move, MoveRequest, Piece, PieceType, SpecialMove, Square};

/// Callback run after every successful mutation.
pub type ChangeListener = Box<dyn FnMut(&GameEvent) + Send>;

/// Asked for a piece when a promotion arrives without one.
pub type PromotionPrompt = Box<dyn FnMut(&Move) -> Option<PieceType> + Send>;

// =========================================================================
// GameEvent
// =========================================================================

/// What kind of change a listener is being told about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEventKind {
    MoveApplied,
    MoveUndone,
    MoveRedone,
    Restarted,
}

/// Board-change notification. Serializable so hosts can forward it as JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    pub kind: GameEventKind,
    /// SAN of the move applied, undone or redone.
    pub san: Option<String>,
    pub fen: String,
    pub side_to_move: Color,
    pub check: bool,
    pub mate: bool,
    pub ply: usize,
}

// =========================================================================
// Game
// =========================================================================

/// A chess game: initial position plus one position per move played.
pub struct Game {
    initial: Position,
    /// `history[i]` is the position after ply `i + 1`.
    history: Vec<Position>,
    redo: Option<MoveRequest>,

    listeners: Vec<ChangeListener>,
    promotion_prompt: Option<PromotionPrompt>,

    // Metadata
    pub id: String,
    pub white_player: String,
    pub black_player: String,
    pub created_at: DateTime<Utc>,

    /// Set when the game did not start from the standard position.
    starting_fen: Option<String>,
}

impl Game {
    // -----------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------

    /// Create a new game from the standard starting position.
    pub fn new() -> Self {
        Self::with_initial(Position::starting(), None)
    }

    /// Create a game from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        let pos = Position::from_fen(fen)?;
        Ok(Self::with_initial(pos, Some(fen.trim().to_string())))
    }

    fn with_initial(initial: Position, starting_fen: Option<String>) -> Self {
        Self {
            initial,
            history: Vec::new(),
            redo: None,
            listeners: Vec::new(),
            promotion_prompt: None,
            id: Uuid::new_v4().to_string(),
            white_player: "Player".into(),
            black_player: "Player".into(),
            created_at: Utc::now(),
            starting_fen,
        }
    }

    /// Set both player names.
    pub fn with_players(mut self, white: impl Into<String>, black: impl Into<String>) -> Self {
        self.white_player = white.into();
        self.black_player = black.into();
        self
    }

    // -----------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------

    /// Register a listener for board changes.
    pub fn on_change(&mut self, listener: impl FnMut(&GameEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Register the callback that picks a promotion piece when a move
    /// request leaves it out. Replaces any earlier prompt.
    pub fn set_promotion_prompt(
        &mut self,
        prompt: impl FnMut(&Move) -> Option<PieceType> + Send + 'static,
    ) {
        self.promotion_prompt = Some(Box::new(prompt));
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    /// Current board position.
    pub fn position(&self) -> &Position {
        self.history.last().unwrap_or(&self.initial)
    }

    /// Position the game started from.
    pub fn initial_position(&self) -> &Position {
        &self.initial
    }

    /// Side to move.
    pub fn side_to_move(&self) -> Color {
        self.position().side_to_move()
    }

    /// Moves played so far, oldest first, with check/mate flags and SAN.
    pub fn moves(&self) -> impl Iterator<Item = &Move> {
        self.history.iter().filter_map(Position::last_move)
    }

    /// Most recent move.
    pub fn last_move(&self) -> Option<&Move> {
        self.history.last().and_then(Position::last_move)
    }

    /// Number of half-moves played.
    pub fn ply(&self) -> usize {
        self.history.len()
    }

    /// Move list in UCI long algebraic form.
    pub fn uci_moves(&self) -> Vec<String> {
        self.moves().map(Move::to_uci).collect()
    }

    /// Captured pieces in capture order.
    pub fn captured(&self) -> &[Piece] {
        self.position().captured()
    }

    /// Legal moves of the piece on `sq` in the current position.
    pub fn legal_moves(&self, sq: Square) -> Result<Vec<Move>, ChessError> {
        self.position().legal_moves(sq)
    }

    /// Is the side to move in check?
    pub fn in_check(&self) -> Result<bool, ChessError> {
        self.position().in_check(self.side_to_move())
    }

    /// Does the side to move have no legal move? (Also true on stalemate.)
    pub fn is_mate(&self) -> Result<bool, ChessError> {
        self.position().is_mate(self.side_to_move())
    }

    /// FEN of the current position.
    pub fn to_fen(&self) -> String {
        self.position().to_fen()
    }

    /// The FEN this game was created from, if not the standard start.
    pub fn starting_fen(&self) -> Option<&str> {
        self.starting_fen.as_deref()
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.redo.is_some()
    }

    // -----------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------

    /// Apply a move request for the side to move.
    ///
    /// Returns the played move with its check/mate flags and SAN. Clears
    /// the redo buffer.
    pub fn apply_move(&mut self, request: MoveRequest) -> Result<Move, ChessError> {
        let mut mv = resolve(self.position(), request)?;

        if mv.special == SpecialMove::Promotion && mv.promotion.is_none() {
            mv.promotion = self.promotion_prompt.as_mut().and_then(|ask| ask(&mv));
        }

        let next = self.position().play(mv)?;
        let played = next
            .last_move()
            .cloned()
            .ok_or_else(|| ChessError::InvalidBoardState("played position has no last move".into()))?;

        self.history.push(next);
        self.redo = None;

        debug!(game = %self.id, san = %played.san, ply = self.ply(), "move applied");
        self.notify(GameEventKind::MoveApplied, Some(played.san.clone()));
        Ok(played)
    }

    /// Resolve SAN text against the current position and apply it.
    pub fn apply_san(&mut self, text: &str) -> Result<Move, ChessError> {
        let mv = san::decode(self.position(), text)?;
        self.apply_move(MoveRequest::from(&mv))
    }

    /// Apply a move in coordinate form: `e2e4`, `e7e8q`.
    pub fn apply_coordinates(&mut self, text: &str) -> Result<Move, ChessError> {
        self.apply_move(MoveRequest::from_coordinates(text)?)
    }

    /// Apply a sequence of requests, stopping at the first failure.
    pub fn replay(
        &mut self,
        requests: impl IntoIterator<Item = MoveRequest>,
    ) -> Result<(), ChessError> {
        for request in requests {
            self.apply_move(request)?;
        }
        Ok(())
    }

    /// Take back the last move.
    ///
    /// The game is rebuilt by replaying every remaining move from the
    /// initial position. The undone move becomes available to `redo`.
    pub fn undo(&mut self) -> Result<Move, ChessError> {
        let undone = self.last_move().cloned().ok_or(ChessError::NothingToUndo)?;

        let keep = self.history.len() - 1;
        let mut rebuilt = Vec::with_capacity(keep);
        let mut pos = self.initial.clone();
        for request in self.history[..keep]
            .iter()
            .filter_map(Position::last_move)
            .map(MoveRequest::from)
        {
            pos = resolve(&pos, request)
                .and_then(|mv| pos.play(mv))
                .map_err(|e| {
                    ChessError::InvalidBoardState(format!("replay of {request} failed: {e}"))
                })?;
            rebuilt.push(pos.clone());
        }

        self.history = rebuilt;
        self.redo = Some(MoveRequest::from(&undone));

        debug!(game = %self.id, san = %undone.san, ply = self.ply(), "move undone");
        self.notify(GameEventKind::MoveUndone, Some(undone.san.clone()));
        Ok(undone)
    }

    /// Re-apply the most recently undone move.
    pub fn redo(&mut self) -> Result<Move, ChessError> {
        let request = self.redo.ok_or(ChessError::NothingToRedo)?;
        let next = resolve(self.position(), request).and_then(|mv| self.position().play(mv))?;
        let played = next
            .last_move()
            .cloned()
            .ok_or_else(|| ChessError::InvalidBoardState("played position has no last move".into()))?;

        self.history.push(next);
        self.redo = None;

        debug!(game = %self.id, san = %played.san, ply = self.ply(), "move redone");
        self.notify(GameEventKind::MoveRedone, Some(played.san.clone()));
        Ok(played)
    }

    /// Return to the initial position, dropping history and redo.
    pub fn restart(&mut self) {
        self.history.clear();
        self.redo = None;
        debug!(game = %self.id, "game restarted");
        self.notify(GameEventKind::Restarted, None);
    }

    fn notify(&mut self, kind: GameEventKind, san: Option<String>) {
        if self.listeners.is_empty() {
            return;
        }
        let pos = self.position();
        let (check, mate) = pos
            .last_move()
            .map_or((false, false), |m| (m.is_check, m.is_checkmate));
        let event = GameEvent {
            kind,
            san,
            fen: pos.to_fen(),
            side_to_move: pos.side_to_move(),
            check,
            mate,
            ply: self.ply(),
        };
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

/// Match a request against the legal moves in `pos`.
///
/// A promotion request without a piece comes back with `promotion: None`.
fn resolve(pos: &Position, request: MoveRequest) -> Result<Move, ChessError> {
    let piece = *pos
        .piece_at(request.from)
        .ok_or(ChessError::NoPieceAtSquare(request.from))?;

    // A piece of the side not to move has no legal moves this turn.
    let legal = if piece.color == pos.side_to_move() {
        pos.legal_moves(request.from)?
    } else {
        Vec::new()
    };

    let Some(mut mv) = legal.iter().find(|m| m.to == request.to).cloned() else {
        return Err(ChessError::IllegalMove {
            from: request.from,
            to: request.to,
            legal: legal.iter().map(Move::to_uci).collect(),
        });
    };

    match (mv.special, request.promotion) {
        (SpecialMove::Promotion, Some(kind)) if !kind.is_promotion_target() => {
            return Err(ChessError::InvalidPromotion(format!("cannot promote to {kind}")));
        }
        (SpecialMove::Promotion, chosen) => mv.promotion = chosen,
        (_, Some(kind)) => {
            return Err(ChessError::InvalidPromotion(format!(
                "{}{} is not a promotion (got {kind})",
                request.from, request.to
            )));
        }
        (_, None) => {}
    }
    Ok(mv)
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("fen", &self.to_fen())
            .field("ply", &self.ply())
            .field("redo", &self.redo)
            .field("listeners", &self.listeners.len())
            .field("promotion_prompt", &self.promotion_prompt.is_some())
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================
