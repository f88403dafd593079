use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod health;
pub mod matches;
pub mod players;
pub mod sessions;

pub fn router(state: AppState) -> Router {
    // TODO: restrict origins once the web client has a fixed domain.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .merge(players::routes())
        .merge(sessions::routes())
        .merge(matches::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
