use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use session_engine::GameSessionServiceError;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    GameSessionService(GameSessionServiceError),
    Unauthorized(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub error: String,
}

impl From<GameSessionServiceError> for ApiError {
    fn from(error: GameSessionServiceError) -> Self {
        ApiError::GameSessionService(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::GameSessionService(err) => match err {
                GameSessionServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                GameSessionServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
                GameSessionServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
                GameSessionServiceError::Conflict(_) => StatusCode::CONFLICT,
                GameSessionServiceError::InvalidMove(_) => StatusCode::UNPROCESSABLE_ENTITY,
                GameSessionServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Unauthorized(msg) => ErrorResponse {
                kind: "unauthorized".to_string(),
                error: msg,
            },
            // Internal details stay in the log.
            ApiError::GameSessionService(GameSessionServiceError::Internal(msg)) => {
                error!("Request failed: {}", msg);
                ErrorResponse {
                    kind: "internal".to_string(),
                    error: "Internal server error".to_string(),
                }
            }
            ApiError::GameSessionService(err) => ErrorResponse {
                kind: err.kind().to_string(),
                error: err.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}
