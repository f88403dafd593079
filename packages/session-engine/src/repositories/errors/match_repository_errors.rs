#[derive(Debug)]
pub enum MatchRepositoryError {
    NotFound,
    /// The record being written already exists.
    ConditionFailed(String),
    /// The match already has a result.
    AlreadyFinished(String),
    /// A rating changed since it was read, or another write raced the
    /// result. Nothing was written and the completion can be retried.
    Contended(String),
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for MatchRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchRepositoryError::NotFound => write!(f, "Match not found"),
            MatchRepositoryError::ConditionFailed(msg) => {
                write!(f, "Conditional write failed: {}", msg)
            }
            MatchRepositoryError::AlreadyFinished(id) => {
                write!(f, "Match {} already has a result", id)
            }
            MatchRepositoryError::Contended(msg) => {
                write!(f, "Result write was contended: {}", msg)
            }
            MatchRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            MatchRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for MatchRepositoryError {}
