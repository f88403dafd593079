pub mod chess_service;
pub mod clock;
pub mod errors;
pub mod game_session_service;
pub mod notification_service;
pub mod rating_service;
pub mod session_cache;
pub mod session_locks;
pub mod timeout_watcher;
