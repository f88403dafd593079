pub mod game_session;
pub mod match_record;
pub mod move_request;
pub mod notification;
pub mod player;
pub mod rating;
pub mod snapshot;
