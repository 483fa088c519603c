pub mod board;
pub mod game;
pub mod movegen;
pub mod pgn;
pub mod san;
pub mod types;

pub use board::{Position, STARTING_FEN};
pub use game::{Game, GameEvent, GameEventKind};
pub use types::*;
