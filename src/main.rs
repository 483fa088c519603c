use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use rust_chess_core::config::AppConfig;
use rust_chess_core::engine::{ChessError, Game, Move, MoveRequest, PieceType, Square, pgn};
use rust_chess_core::uci::{EngineHandle, SearchLimits, UciEngine};

const HELP: &str = "commands: <move> (SAN or e2e4) | moves <square> | undo | redo | restart | board | fen | pgn | quit";

enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing (structured logging). Logs go to stderr so stdout
    // stays clean for board and event output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_chess_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env();
    let mut game = Game::new().with_players(&config.white_player, &config.black_player);

    if config.json_events {
        game.on_change(|event| match serde_json::to_string(event) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!(error = %e, "failed to serialize game event"),
        });
    }
    game.set_promotion_prompt(|mv| {
        info!(square = %mv.to, "no promotion piece given, promoting to queen");
        Some(PieceType::Queen)
    });

    let engine = match &config.engine_path {
        Some(path) => match start_engine(path, &config).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(engine = %path, error = %e, "engine unavailable, continuing without it");
                None
            }
        },
        None => None,
    };

    info!(
        game = %game.id,
        "rust-chess-core v{} ready",
        env!("CARGO_PKG_VERSION")
    );
    println!("{}\n{HELP}", game.position().board_string());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut code = ExitCode::SUCCESS;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "failed to read stdin");
                code = ExitCode::FAILURE;
                break;
            }
        };

        match run_command(&mut game, line.trim(), engine.as_ref(), &config).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) if e.is_fatal() => {
                error!(game = %game.id, error = %e, "game state corrupted");
                code = ExitCode::FAILURE;
                break;
            }
            Err(e) => println!("error: {e}"),
        }
    }

    if let Some(engine) = engine {
        engine.shutdown().await;
    }
    code
}

async fn start_engine(path: &str, config: &AppConfig) -> Result<EngineHandle, ChessError> {
    let mut engine = UciEngine::spawn(path, &[], config.engine_timeout())?;
    engine.handshake().await?;
    engine.new_game().await?;
    Ok(EngineHandle::start(engine))
}

async fn run_command(
    game: &mut Game,
    line: &str,
    engine: Option<&EngineHandle>,
    config: &AppConfig,
) -> Result<Flow, ChessError> {
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (None, _) => {}
        (Some("quit" | "exit"), _) => return Ok(Flow::Quit),
        (Some("help"), _) => println!("{HELP}"),
        (Some("board"), _) => println!("{}", game.position().board_string()),
        (Some("fen"), _) => println!("{}", game.to_fen()),
        (Some("pgn"), _) => print!("{}", pgn::to_pgn(game)),
        (Some("undo"), _) => {
            let mv = game.undo()?;
            println!("undid {mv}");
        }
        (Some("redo"), _) => {
            let mv = game.redo()?;
            println!("redid {mv}");
        }
        (Some("restart"), _) => {
            game.restart();
            println!("{}", game.position().board_string());
        }
        (Some("moves"), Some(square)) => {
            let sq: Square = square.parse()?;
            let moves: Vec<String> = game.legal_moves(sq)?.iter().map(Move::to_uci).collect();
            println!("{}", moves.join(" "));
        }
        (Some("moves"), None) => println!("usage: moves <square>"),
        (Some(text), None) => {
            let mv = apply_text(game, text)?;
            report(game, &mv)?;
            if let Some(engine) = engine
                && !game.is_mate()?
            {
                let reply = engine
                    .best_move(game, SearchLimits::depth(config.engine_depth))
                    .await?;
                let mv = game.apply_coordinates(&reply)?;
                report(game, &mv)?;
            }
        }
        _ => println!("{HELP}"),
    }
    Ok(Flow::Continue)
}

/// Coordinates first (`e2e4`), then SAN.
fn apply_text(game: &mut Game, text: &str) -> Result<Move, ChessError> {
    match MoveRequest::from_coordinates(text) {
        Ok(request) => game.apply_move(request),
        Err(_) => game.apply_san(text),
    }
}

fn report(game: &Game, mv: &Move) -> Result<(), ChessError> {
    println!("{} {}\n{}", game.ply(), mv, game.position().board_string());
    if game.is_mate()? {
        if game.in_check()? {
            println!("checkmate, {} wins", mv.color);
        } else {
            println!("{} has no legal moves", game.side_to_move());
        }
    } else if game.in_check()? {
        println!("{} is in check", game.side_to_move());
    }
    Ok(())
}
