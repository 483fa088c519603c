//! Async UCI client over a child process.
//!
//! Requests are line-oriented: write a command, then read engine lines until
//! the expected reply. Every wait is bounded by the configured timeout.

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::engine::game::Game;
use crate::engine::types::ChessError;
use crate::uci::options::{UciOption, setoption_command};

// ---------------------------------------------------------------------------
// Search limits
// ---------------------------------------------------------------------------

/// Parameters of a `go` command. Unset fields are left out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub depth: Option<u32>,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movetime: Option<u64>,
}

impl SearchLimits {
    pub fn depth(depth: u32) -> Self {
        SearchLimits {
            depth: Some(depth),
            ..Default::default()
        }
    }

    pub fn movetime(ms: u64) -> Self {
        SearchLimits {
            movetime: Some(ms),
            ..Default::default()
        }
    }

    /// The `go ...` line.
    pub fn to_command(&self) -> String {
        let mut cmd = String::from("go");
        let params = [
            ("depth", self.depth.map(u64::from)),
            ("wtime", self.wtime),
            ("btime", self.btime),
            ("winc", self.winc),
            ("binc", self.binc),
            ("movetime", self.movetime),
        ];
        for (key, value) in params {
            if let Some(v) = value {
                cmd.push_str(&format!(" {key} {v}"));
            }
        }
        cmd
    }
}

/// `position startpos|fen <fen> [moves m1 m2 ...]`.
pub fn position_command(fen: Option<&str>, moves: &[String]) -> String {
    let mut cmd = match fen {
        Some(fen) => format!("position fen {fen}"),
        None => "position startpos".to_string(),
    };
    if !moves.is_empty() {
        cmd.push_str(" moves ");
        cmd.push_str(&moves.join(" "));
    }
    cmd
}

// ---------------------------------------------------------------------------
// UciEngine
// ---------------------------------------------------------------------------

/// A running UCI engine process.
pub struct UciEngine {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    timeout: Duration,
    pub id_name: Option<String>,
    pub id_author: Option<String>,
    options: Vec<UciOption>,
}

impl UciEngine {
    /// Start the engine process. Must be called inside a Tokio runtime.
    pub fn spawn(
        path: impl AsRef<OsStr>,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Self, ChessError> {
        let path = path.as_ref();
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ChessError::EngineProtocol(format!("failed to start {}: {e}", path.to_string_lossy()))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ChessError::EngineProtocol("engine stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ChessError::EngineProtocol("engine stdout unavailable".into()))?;

        info!(engine = %path.to_string_lossy(), "engine process started");
        Ok(UciEngine {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            timeout,
            id_name: None,
            id_author: None,
            options: Vec::new(),
        })
    }

    /// Options announced during the handshake.
    pub fn options(&self) -> &[UciOption] {
        &self.options
    }

    /// `uci` → `id` / `option` lines → `uciok`.
    pub async fn handshake(&mut self) -> Result<(), ChessError> {
        self.send("uci").await?;
        let limit = self.timeout;
        loop {
            let line = self.read_line(limit).await?;
            if line == "uciok" {
                break;
            } else if let Some(name) = line.strip_prefix("id name ") {
                self.id_name = Some(name.trim().to_string());
            } else if let Some(author) = line.strip_prefix("id author ") {
                self.id_author = Some(author.trim().to_string());
            } else if line.starts_with("option ") {
                match UciOption::parse(&line) {
                    Ok(option) => self.options.push(option),
                    Err(e) => warn!(error = %e, "skipping engine option"),
                }
            }
        }
        info!(
            name = self.id_name.as_deref().unwrap_or("unknown"),
            options = self.options.len(),
            "engine handshake complete"
        );
        Ok(())
    }

    /// `isready` → `readyok`.
    pub async fn is_ready(&mut self) -> Result<(), ChessError> {
        self.send("isready").await?;
        self.wait_for(self.timeout, |line| line == "readyok").await?;
        Ok(())
    }

    /// Send `setoption` after checking the value against the declared type.
    pub async fn set_option(&mut self, name: &str, value: Option<&str>) -> Result<(), ChessError> {
        let option = self
            .options
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ChessError::EngineProtocol(format!("engine has no option '{name}'")))?;
        let value = option.validate(value)?;
        let cmd = setoption_command(&option.name, value.as_deref());
        self.send(&cmd).await
    }

    /// `ucinewgame` followed by a readiness check.
    pub async fn new_game(&mut self) -> Result<(), ChessError> {
        self.send("ucinewgame").await?;
        self.is_ready().await
    }

    /// Send the position as a start FEN (or `startpos`) plus UCI moves.
    pub async fn set_position(&mut self, fen: Option<&str>, moves: &[String]) -> Result<(), ChessError> {
        self.send(&position_command(fen, moves)).await
    }

    /// Send the current state of `game`.
    pub async fn set_game(&mut self, game: &Game) -> Result<(), ChessError> {
        self.set_position(game.starting_fen(), &game.uci_moves()).await
    }

    /// Start a search and wait for `bestmove`. Returns the move in UCI form.
    pub async fn go(&mut self, limits: &SearchLimits) -> Result<String, ChessError> {
        self.send(&limits.to_command()).await?;
        let limit = self.timeout + Duration::from_millis(limits.movetime.unwrap_or(0));
        let line = self.wait_for(limit, |line| line.starts_with("bestmove")).await?;
        match line.split_whitespace().nth(1) {
            Some("(none)") | None => Err(ChessError::EngineProtocol(format!(
                "engine returned no move: '{line}'"
            ))),
            Some(mv) => Ok(mv.to_string()),
        }
    }

    /// Send `quit` and wait for the process to exit, killing it on timeout.
    pub async fn quit(mut self) -> Result<(), ChessError> {
        self.send("quit").await?;
        match tokio::time::timeout(self.timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(%status, "engine exited");
                Ok(())
            }
            Ok(Err(e)) => Err(ChessError::EngineProtocol(format!("engine wait failed: {e}"))),
            Err(_) => {
                warn!("engine ignored quit, killing it");
                self.child
                    .kill()
                    .await
                    .map_err(|e| ChessError::EngineProtocol(format!("engine kill failed: {e}")))
            }
        }
    }

    async fn send(&mut self, cmd: &str) -> Result<(), ChessError> {
        debug!(command = cmd, "uci >");
        let write = async {
            self.stdin.write_all(cmd.as_bytes()).await?;
            self.stdin.write_all(b"\n").await?;
            self.stdin.flush().await
        };
        write
            .await
            .map_err(|e| ChessError::EngineProtocol(format!("write '{cmd}' failed: {e}")))
    }

    async fn read_line(&mut self, limit: Duration) -> Result<String, ChessError> {
        match tokio::time::timeout(limit, self.lines.next_line()).await {
            Ok(Ok(Some(line))) => {
                let line = line.trim().to_string();
                debug!(line = %line, "uci <");
                Ok(line)
            }
            Ok(Ok(None)) => Err(ChessError::EngineProtocol("engine closed its output".into())),
            Ok(Err(e)) => Err(ChessError::EngineProtocol(format!("read failed: {e}"))),
            Err(_) => Err(ChessError::EngineProtocol(format!(
                "no response within {} ms",
                limit.as_millis()
            ))),
        }
    }

    /// Read until a line satisfies `done`, all within `limit`.
    async fn wait_for(
        &mut self,
        limit: Duration,
        done: impl Fn(&str) -> bool,
    ) -> Result<String, ChessError> {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            let line = self.read_line(left).await?;
            if done(&line) {
                return Ok(line);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EngineHandle
// ---------------------------------------------------------------------------

enum EngineRequest {
    BestMove {
        fen: Option<String>,
        moves: Vec<String>,
        limits: SearchLimits,
        reply: oneshot::Sender<Result<String, ChessError>>,
    },
    Quit,
}

/// Cheap handle to an engine running on its own task.
///
/// Searches are queued over a channel; the game owner awaits each reply and
/// applies the move itself.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Move a ready engine onto a background task.
    pub fn start(mut engine: UciEngine) -> Self {
        let (tx, mut rx) = mpsc::channel::<EngineRequest>(8);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    EngineRequest::BestMove {
                        fen,
                        moves,
                        limits,
                        reply,
                    } => {
                        let result = async {
                            engine.set_position(fen.as_deref(), &moves).await?;
                            engine.go(&limits).await
                        }
                        .await;
                        if reply.send(result).is_err() {
                            debug!("search result dropped; requester went away");
                        }
                    }
                    EngineRequest::Quit => break,
                }
            }
            if let Err(e) = engine.quit().await {
                warn!(error = %e, "engine shutdown failed");
            }
        });
        EngineHandle { tx }
    }

    /// Ask for the best move in `game`'s current position.
    pub async fn best_move(&self, game: &Game, limits: SearchLimits) -> Result<String, ChessError> {
        let (reply, rx) = oneshot::channel();
        let request = EngineRequest::BestMove {
            fen: game.starting_fen().map(str::to_string),
            moves: game.uci_moves(),
            limits,
            reply,
        };
        self.tx
            .send(request)
            .await
            .map_err(|_| ChessError::EngineProtocol("engine task stopped".into()))?;
        rx.await
            .map_err(|_| ChessError::EngineProtocol("engine task dropped the request".into()))?
    }

    /// Stop the engine task and its process.
    pub async fn shutdown(self) {
        let _ = self.tx.send(EngineRequest::Quit).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_command_formatting() {
        assert_eq!(SearchLimits::default().to_command(), "go");
        assert_eq!(SearchLimits::depth(8).to_command(), "go depth 8");
        let clock = SearchLimits {
            wtime: Some(60000),
            btime: Some(55000),
            winc: Some(1000),
            binc: Some(1000),
            ..Default::default()
        };
        assert_eq!(
            clock.to_command(),
            "go wtime 60000 btime 55000 winc 1000 binc 1000"
        );
        assert_eq!(SearchLimits::movetime(500).to_command(), "go movetime 500");
    }

    #[test]
    fn position_command_formatting() {
        assert_eq!(position_command(None, &[]), "position startpos");
        assert_eq!(
            position_command(None, &["e2e4".into(), "e7e5".into()]),
            "position startpos moves e2e4 e7e5"
        );
        assert_eq!(
            position_command(Some("8/8/8/8/8/8/8/K1k5 w - - 0 1"), &[]),
            "position fen 8/8/8/8/8/8/8/K1k5 w - - 0 1"
        );
    }

    #[cfg(unix)]
    mod process {
        use super::super::*;
        use crate::engine::game::Game;

        const FAKE_ENGINE: &str = r#"
while read -r line; do
  case "$line" in
    uci)
      echo "id name Fake Engine"
      echo "id author Tests"
      echo "option name Hash type spin default 16 min 1 max 64"
      echo "option name Ponder type check default false"
      echo "option name Broken type spin"
      echo "uciok" ;;
    isready) echo "readyok" ;;
    go*)
      echo "info depth 1 score cp 20 pv e2e4"
      echo "bestmove e2e4 ponder e7e5" ;;
    quit) exit 0 ;;
  esac
done
"#;

        const SILENT_ENGINE: &str = "while read -r line; do :; done";

        fn fake(script: &str, timeout_ms: u64) -> UciEngine {
            UciEngine::spawn("sh", &["-c", script], Duration::from_millis(timeout_ms)).unwrap()
        }

        #[tokio::test]
        async fn full_session_with_fake_engine() {
            let mut engine = fake(FAKE_ENGINE, 2000);
            engine.handshake().await.unwrap();
            assert_eq!(engine.id_name.as_deref(), Some("Fake Engine"));
            assert_eq!(engine.id_author.as_deref(), Some("Tests"));
            assert_eq!(engine.options().len(), 2);

            engine.set_option("hash", Some("32")).await.unwrap();
            assert!(engine.set_option("Hash", Some("128")).await.is_err());
            assert!(engine.set_option("Threads", Some("2")).await.is_err());

            engine.new_game().await.unwrap();
            engine.set_game(&Game::new()).await.unwrap();
            assert_eq!(engine.go(&SearchLimits::depth(1)).await.unwrap(), "e2e4");
            engine.quit().await.unwrap();
        }

        #[tokio::test]
        async fn silent_engine_times_out() {
            let mut engine = fake(SILENT_ENGINE, 100);
            let err = engine.is_ready().await.unwrap_err();
            assert!(matches!(err, ChessError::EngineProtocol(_)));
        }

        #[tokio::test]
        async fn handle_runs_search_on_its_own_task() {
            let mut engine = fake(FAKE_ENGINE, 2000);
            engine.handshake().await.unwrap();
            let handle = EngineHandle::start(engine);

            let mut game = Game::new();
            let reply = handle.best_move(&game, SearchLimits::depth(1)).await.unwrap();
            game.apply_coordinates(&reply).unwrap();
            assert_eq!(game.uci_moves(), vec!["e2e4"]);
            handle.shutdown().await;
        }

        #[tokio::test]
        async fn missing_binary_is_protocol_error() {
            let err = UciEngine::spawn(
                "/nonexistent/engine-binary",
                &[],
                Duration::from_millis(100),
            )
            .err()
            .unwrap();
            assert!(matches!(err, ChessError::EngineProtocol(_)));
        }
    }
}
