//! Game session engine: live match state, per-player clocks, draw and
//! resignation protocol, rating adjustment and the background timeout sweep.

pub mod config;
pub mod models;
pub mod repositories;
pub mod services;
pub mod time;

pub use config::{ConfigError, EngineConfig};
pub use models::game_session::{Color, Session, Winner};
pub use services::errors::game_session_service_errors::GameSessionServiceError;
pub use services::game_session_service::GameSessionService;
pub use services::timeout_watcher::{TimeoutWatcher, WatcherHandle};
