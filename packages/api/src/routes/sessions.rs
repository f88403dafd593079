use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use session_engine::models::game_session::DrawOffer;
use session_engine::models::move_request::MoveRequest;
use session_engine::models::rating::{MatchResult, RatingChange};
use session_engine::models::snapshot::{CreatedSession, MoveResult, SessionTimes, SessionView};

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/times", get(get_times))
        .route("/sessions/{id}/moves", post(make_move))
        .route("/sessions/{id}/draw-offer", post(offer_draw))
        .route("/sessions/{id}/draw-offer/response", post(respond_draw_offer))
        .route("/sessions/{id}/resign", post(resign))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub participants: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DrawResponseRequest {
    pub accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct DrawResponse {
    pub accepted: bool,
    pub rating_change: Option<RatingChange>,
}

async fn create_session(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreatedSession>), ApiError> {
    let created = state.service.create_session(&payload.participants).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_session(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.service.get_session_view(&session_id).await?))
}

async fn get_times(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<SessionTimes>, ApiError> {
    let now = state.service.now_ms();
    Ok(Json(state.service.get_times(&session_id, now).await?))
}

async fn make_move(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(session_id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<MoveResult>, ApiError> {
    // Stamped on arrival, before waiting for the session lock.
    let requested_at = state.service.now_ms();
    let result = state
        .service
        .make_move(&session_id, &caller.user_id, &request, requested_at)
        .await?;
    Ok(Json(result))
}

async fn offer_draw(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<DrawOffer>, ApiError> {
    Ok(Json(
        state
            .service
            .offer_draw(&session_id, &caller.user_id)
            .await?,
    ))
}

async fn respond_draw_offer(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(session_id): Path<String>,
    Json(payload): Json<DrawResponseRequest>,
) -> Result<Json<DrawResponse>, ApiError> {
    let rating_change = state
        .service
        .respond_draw_offer(&session_id, &caller.user_id, payload.accepted)
        .await?;

    Ok(Json(DrawResponse {
        accepted: payload.accepted,
        rating_change,
    }))
}

async fn resign(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<MatchResult>, ApiError> {
    Ok(Json(
        state.service.resign(&session_id, &caller.user_id).await?,
    ))
}
