#[derive(Debug)]
pub enum SessionRepositoryError {
    /// The stored version no longer matches the one the write was based on.
    VersionConflict(String),
    /// A participant is already indexed against another session.
    AlreadyExists(String),
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for SessionRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRepositoryError::VersionConflict(session_id) => {
                write!(f, "Session {} was modified concurrently", session_id)
            }
            SessionRepositoryError::AlreadyExists(user_id) => {
                write!(f, "User {} already has an active session", user_id)
            }
            SessionRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            SessionRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for SessionRepositoryError {}
