use crate::repositories::errors::match_repository_errors::MatchRepositoryError;
use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;
use crate::repositories::errors::session_repository_errors::SessionRepositoryError;
use crate::services::errors::chess_service_errors::RulesError;

#[derive(Debug)]
pub enum GameSessionServiceError {
    NotFound(String),
    /// Caller is not a participant, or it is not their turn.
    Forbidden(String),
    BadRequest(String),
    Conflict(String),
    /// Rejected by the rules engine. Nothing was persisted.
    InvalidMove(RulesError),
    Internal(String),
}

impl GameSessionServiceError {
    /// Stable identifier for the error kind, safe to expose to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            GameSessionServiceError::NotFound(_) => "not_found",
            GameSessionServiceError::Forbidden(_) => "forbidden",
            GameSessionServiceError::BadRequest(_) => "bad_request",
            GameSessionServiceError::Conflict(_) => "conflict",
            GameSessionServiceError::InvalidMove(_) => "invalid_move",
            GameSessionServiceError::Internal(_) => "internal",
        }
    }
}

impl std::fmt::Display for GameSessionServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameSessionServiceError::NotFound(msg)
            | GameSessionServiceError::Forbidden(msg)
            | GameSessionServiceError::BadRequest(msg)
            | GameSessionServiceError::Conflict(msg) => write!(f, "{}", msg),
            GameSessionServiceError::InvalidMove(err) => write!(f, "{}", err),
            GameSessionServiceError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for GameSessionServiceError {}

impl From<SessionRepositoryError> for GameSessionServiceError {
    fn from(err: SessionRepositoryError) -> Self {
        match err {
            SessionRepositoryError::VersionConflict(session_id) => {
                GameSessionServiceError::Conflict(format!(
                    "Session {} was modified concurrently, re-read and retry",
                    session_id
                ))
            }
            SessionRepositoryError::AlreadyExists(user_id) => GameSessionServiceError::Conflict(
                format!("User {} already has an active match", user_id),
            ),
            other => GameSessionServiceError::Internal(other.to_string()),
        }
    }
}

impl From<MatchRepositoryError> for GameSessionServiceError {
    fn from(err: MatchRepositoryError) -> Self {
        match err {
            MatchRepositoryError::NotFound => {
                GameSessionServiceError::NotFound("Match not found".to_string())
            }
            MatchRepositoryError::AlreadyFinished(_) => {
                GameSessionServiceError::Conflict("Match already finished".to_string())
            }
            MatchRepositoryError::Contended(_) => GameSessionServiceError::Conflict(
                "Match result could not be recorded, retry".to_string(),
            ),
            MatchRepositoryError::ConditionFailed(_) => {
                GameSessionServiceError::Conflict("Match record already exists".to_string())
            }
            other => GameSessionServiceError::Internal(other.to_string()),
        }
    }
}

impl From<PlayerRepositoryError> for GameSessionServiceError {
    fn from(err: PlayerRepositoryError) -> Self {
        match err {
            PlayerRepositoryError::NotFound => {
                GameSessionServiceError::NotFound("Player not found".to_string())
            }
            other => GameSessionServiceError::Internal(other.to_string()),
        }
    }
}

impl From<RulesError> for GameSessionServiceError {
    fn from(err: RulesError) -> Self {
        match err {
            // A stored position that does not parse is corrupt state, not a bad move.
            RulesError::InvalidPosition(msg) => {
                GameSessionServiceError::Internal(format!("Invalid position: {}", msg))
            }
            other => GameSessionServiceError::InvalidMove(other),
        }
    }
}
