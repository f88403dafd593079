use std::env;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_INITIAL_CLOCK_MS: i64 = 600_000;
pub const DEFAULT_ABANDONMENT_THRESHOLD_MS: i64 = 60_000;
pub const DEFAULT_DRAW_OFFER_WINDOW_MS: i64 = 30_000;
pub const DEFAULT_WATCHER_HEARTBEAT_MS: u64 = 1_000;

#[derive(Debug)]
pub enum ConfigError {
    Missing(String),
    Invalid { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} environment variable must be set", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Table names used by the DynamoDB backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TableNames {
    pub game_sessions: String,
    pub active_sessions: String,
    pub matches: String,
    pub moves: String,
    pub players: String,
    pub connections: String,
}

impl TableNames {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(TableNames {
            game_sessions: required("GAME_SESSIONS_TABLE")?,
            active_sessions: required("ACTIVE_SESSIONS_TABLE")?,
            matches: required("MATCHES_TABLE")?,
            moves: required("MOVES_TABLE")?,
            players: required("PLAYERS_TABLE")?,
            connections: required("CONNECTIONS_TABLE")?,
        })
    }
}

/// Timing knobs of the engine. All durations are in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Starting clock for each participant.
    pub initial_clock_ms: i64,
    /// How long a session may sit with no move before it is declared a draw.
    pub abandonment_threshold_ms: i64,
    /// Lifetime of a draw offer.
    pub draw_offer_window_ms: i64,
    /// Interval between two watcher sweeps.
    pub watcher_heartbeat_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_clock_ms: DEFAULT_INITIAL_CLOCK_MS,
            abandonment_threshold_ms: DEFAULT_ABANDONMENT_THRESHOLD_MS,
            draw_offer_window_ms: DEFAULT_DRAW_OFFER_WINDOW_MS,
            watcher_heartbeat_ms: DEFAULT_WATCHER_HEARTBEAT_MS,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(EngineConfig {
            initial_clock_ms: optional("INITIAL_CLOCK_MS", DEFAULT_INITIAL_CLOCK_MS)?,
            abandonment_threshold_ms: optional(
                "ABANDONMENT_THRESHOLD_MS",
                DEFAULT_ABANDONMENT_THRESHOLD_MS,
            )?,
            draw_offer_window_ms: optional("DRAW_OFFER_WINDOW_MS", DEFAULT_DRAW_OFFER_WINDOW_MS)?,
            watcher_heartbeat_ms: optional("WATCHER_HEARTBEAT_MS", DEFAULT_WATCHER_HEARTBEAT_MS)?,
        })
    }
}

pub fn required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))
}

pub fn optional<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => parse_value(key, &value),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}
