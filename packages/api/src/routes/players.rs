use axum::{extract::State, routing::put, Json, Router};
use serde::Deserialize;
use session_engine::models::snapshot::PlayerSummary;

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/players/me", put(register))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
}

/// Idempotent: an existing profile is returned unchanged.
async fn register(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<PlayerSummary>, ApiError> {
    let profile = state
        .service
        .ensure_player(&caller.user_id, &payload.username)
        .await?;
    Ok(Json(profile.into()))
}
