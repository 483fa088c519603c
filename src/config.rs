use std::time::Duration;

/// Runtime configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to a UCI engine binary. When unset, both sides are played by hand.
    pub engine_path: Option<String>,
    /// Search depth passed to `go depth`.
    pub engine_depth: u32,
    /// Per-response engine timeout in milliseconds.
    pub engine_timeout_ms: u64,
    pub white_player: String,
    pub black_player: String,
    /// Print every game event as a JSON line.
    pub json_events: bool,
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = AppConfig::default();
        AppConfig {
            engine_path: lookup("CHESS_ENGINE_PATH").filter(|p| !p.trim().is_empty()),
            engine_depth: lookup("CHESS_ENGINE_DEPTH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.engine_depth),
            engine_timeout_ms: lookup("CHESS_ENGINE_TIMEOUT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.engine_timeout_ms),
            white_player: lookup("CHESS_WHITE").unwrap_or(defaults.white_player),
            black_player: lookup("CHESS_BLACK").unwrap_or(defaults.black_player),
            json_events: lookup("CHESS_JSON_EVENTS")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.json_events),
        }
    }

    /// Engine timeout as a `Duration`.
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            engine_path: None,
            engine_depth: 8,
            engine_timeout_ms: 5000,
            white_player: "Player".to_string(),
            black_player: "Player".to_string(),
            json_events: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config() {
        let config = AppConfig::default();
        assert_eq!(config.engine_path, None);
        assert_eq!(config.engine_depth, 8);
        assert_eq!(config.engine_timeout_ms, 5000);
        assert_eq!(config.engine_timeout(), Duration::from_secs(5));
        assert_eq!(config.white_player, "Player");
        assert!(!config.json_events);
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.engine_depth, 8);
        assert_eq!(config.black_player, "Player");
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CHESS_ENGINE_PATH", "/usr/bin/stockfish"),
            ("CHESS_ENGINE_DEPTH", "12"),
            ("CHESS_ENGINE_TIMEOUT", "250"),
            ("CHESS_WHITE", "Alice"),
            ("CHESS_JSON_EVENTS", "true"),
        ]));
        assert_eq!(config.engine_path.as_deref(), Some("/usr/bin/stockfish"));
        assert_eq!(config.engine_depth, 12);
        assert_eq!(config.engine_timeout(), Duration::from_millis(250));
        assert_eq!(config.white_player, "Alice");
        assert_eq!(config.black_player, "Player");
        assert!(config.json_events);
    }

    #[test]
    fn bad_values_fall_back() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CHESS_ENGINE_PATH", "  "),
            ("CHESS_ENGINE_DEPTH", "deep"),
            ("CHESS_JSON_EVENTS", "nope"),
        ]));
        assert_eq!(config.engine_path, None);
        assert_eq!(config.engine_depth, 8);
        assert!(!config.json_events);
    }
}
