use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use session_engine::models::snapshot::{ActiveMatchSnapshot, MatchSummary, MatchWithMoves};

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};

const DEFAULT_PAGE_SIZE: i64 = 20;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/matches/active", get(active_match))
        .route("/matches/history", get(match_history))
        .route("/matches/{id}", get(match_with_moves))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

async fn active_match(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> Result<Json<ActiveMatchSnapshot>, ApiError> {
    Ok(Json(state.service.get_active_match(&caller.user_id).await?))
}

async fn match_history(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MatchSummary>>, ApiError> {
    let history = state
        .service
        .get_match_history(
            &caller.user_id,
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(history))
}

async fn match_with_moves(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(match_id): Path<String>,
) -> Result<Json<MatchWithMoves>, ApiError> {
    Ok(Json(state.service.get_match_with_moves(&match_id).await?))
}
