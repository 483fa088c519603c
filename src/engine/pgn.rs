//! PGN (Portable Game Notation) export and import.
//!
//! Export produces the Seven Tag Roster and numbered move text. Import reads
//! tag pairs and replays the move text through the SAN decoder.

use crate::engine::game::Game;
use crate::engine::types::{ChessError, Color};

const RESULT_TOKENS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];
const LINE_WIDTH: usize = 80;

// =========================================================================
// PGN generation
// =========================================================================

/// Export a game as a PGN string.
pub fn to_pgn(game: &Game) -> String {
    let mut pgn = String::with_capacity(512);

    // Seven Tag Roster.
    let date = game.created_at.format("%Y.%m.%d").to_string();
    let result = result_string(game);

    push_tag(&mut pgn, "Event", "Casual Game");
    push_tag(&mut pgn, "Site", "rust-chess-core");
    push_tag(&mut pgn, "Date", &date);
    push_tag(&mut pgn, "Round", "-");
    push_tag(&mut pgn, "White", &game.white_player);
    push_tag(&mut pgn, "Black", &game.black_player);
    push_tag(&mut pgn, "Result", result);

    if let Some(fen) = game.starting_fen() {
        push_tag(&mut pgn, "SetUp", "1");
        push_tag(&mut pgn, "FEN", fen);
    }

    pgn.push('\n');

    // Move text, numbered from the initial position.
    let initial = game.initial_position();
    let mut move_num = initial.fullmove_number();
    let mut white_turn = initial.side_to_move() == Color::White;
    let mut tokens = Vec::with_capacity(game.ply() + 1);

    for (i, mv) in game.moves().enumerate() {
        let token = if white_turn {
            format!("{move_num}. {}", mv.san)
        } else if i == 0 {
            // First move by black: "N... move".
            format!("{move_num}... {}", mv.san)
        } else {
            mv.san.clone()
        };
        tokens.push(token);

        if !white_turn {
            move_num += 1;
        }
        white_turn = !white_turn;
    }
    tokens.push(result.to_string());

    // Line wrapping at ~80 chars.
    let mut line_len = 0;
    for token in tokens {
        if line_len > 0 && line_len + token.len() + 1 > LINE_WIDTH {
            pgn.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            pgn.push(' ');
            line_len += 1;
        }
        line_len += token.len();
        pgn.push_str(&token);
    }
    pgn.push('\n');

    pgn
}

fn push_tag(pgn: &mut String, name: &str, value: &str) {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    pgn.push_str(&format!("[{name} \"{escaped}\"]\n"));
}

/// `1-0`/`0-1` when the last move mated a king in check, otherwise `*`.
fn result_string(game: &Game) -> &'static str {
    match game.last_move() {
        Some(mv) if mv.is_checkmate && mv.is_check => match mv.color {
            Color::White => "1-0",
            Color::Black => "0-1",
        },
        _ => "*",
    }
}

// =========================================================================
// PGN parsing
// =========================================================================

/// Import a single-game PGN.
///
/// Honors the `FEN`, `White` and `Black` tags; other tags are read and
/// dropped. Comments, variations, NAGs, move numbers and annotation marks
/// are skipped.
pub fn from_pgn(text: &str) -> Result<Game, ChessError> {
    let mut tags = Vec::new();
    let mut movetext = String::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && movetext.trim().is_empty() {
            tags.push(parse_tag(trimmed)?);
        } else {
            movetext.push_str(line);
            movetext.push('\n');
        }
    }

    let mut game = match tag(&tags, "FEN") {
        Some(fen) => Game::from_fen(fen)?,
        None => Game::new(),
    };
    if let Some(white) = tag(&tags, "White") {
        game.white_player = white.to_string();
    }
    if let Some(black) = tag(&tags, "Black") {
        game.black_player = black.to_string();
    }

    for token in movetext_tokens(&movetext)? {
        if RESULT_TOKENS.contains(&token.as_str()) {
            break;
        }
        if token.starts_with('$') {
            continue;
        }
        let Some(san) = strip_move_number(&token) else {
            continue;
        };
        let san = san.trim_end_matches(['!', '?']);
        game.apply_san(san)
            .map_err(|e| ChessError::InvalidPgn(format!("move '{token}': {e}")))?;
    }

    Ok(game)
}

fn tag<'a>(tags: &'a [(String, String)], name: &str) -> Option<&'a str> {
    tags.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
}

/// Parse `[Name "Value"]`.
fn parse_tag(line: &str) -> Result<(String, String), ChessError> {
    let invalid = || ChessError::InvalidPgn(format!("bad tag pair: {line}"));
    let inner = line
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .ok_or_else(invalid)?;
    let (name, value) = inner.trim().split_once(char::is_whitespace).ok_or_else(invalid)?;
    let value = value
        .trim()
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(invalid)?;
    let value = value.replace("\\\"", "\"").replace("\\\\", "\\");
    Ok((name.to_string(), value))
}

/// Split move text into tokens, dropping `{}` and `;` comments and
/// `()` variations.
fn movetext_tokens(text: &str) -> Result<Vec<String>, ChessError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = text.chars();

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                flush(&mut current, &mut tokens);
                if !chars.by_ref().any(|c| c == '}') {
                    return Err(ChessError::InvalidPgn("unterminated comment".into()));
                }
            }
            ';' => {
                flush(&mut current, &mut tokens);
                let _ = chars.by_ref().find(|&c| c == '\n');
            }
            '(' => {
                flush(&mut current, &mut tokens);
                depth += 1;
            }
            ')' => {
                flush(&mut current, &mut tokens);
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ChessError::InvalidPgn("unbalanced ')'".into()))?;
            }
            c if c.is_whitespace() => flush(&mut current, &mut tokens),
            c if depth == 0 => current.push(c),
            _ => {}
        }
    }
    flush(&mut current, &mut tokens);

    if depth > 0 {
        return Err(ChessError::InvalidPgn("unterminated variation".into()));
    }
    Ok(tokens)
}

/// Drop a leading `12.` / `12...`; `None` if nothing is left.
fn strip_move_number(token: &str) -> Option<&str> {
    let rest = token.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == token.len() || !rest.starts_with('.') {
        return Some(token);
    }
    let rest = rest.trim_start_matches('.');
    (!rest.is_empty()).then_some(rest)
}

// =========================================================================
// Tests
// =========================================================================
