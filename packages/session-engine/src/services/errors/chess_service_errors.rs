#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    /// The stored position could not be parsed.
    InvalidPosition(String),
    InvalidSquare(String),
    InvalidPromotion(char),
    IllegalMove(String),
}

impl std::fmt::Display for RulesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulesError::InvalidPosition(msg) => write!(f, "Invalid position: {}", msg),
            RulesError::InvalidSquare(square) => write!(f, "Invalid square: {}", square),
            RulesError::InvalidPromotion(piece) => {
                write!(f, "Invalid promotion piece: {}", piece)
            }
            RulesError::IllegalMove(notation) => write!(f, "Illegal move: {}", notation),
        }
    }
}

impl std::error::Error for RulesError {}
