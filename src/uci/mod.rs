//! Client side of the Universal Chess Interface.

pub mod client;
pub mod options;

pub use client::{EngineHandle, SearchLimits, UciEngine, position_command};
pub use options::{OptionKind, UciOption, setoption_command};
