use serde::{Deserialize, Serialize};

use crate::models::game_session::Winner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub white_delta: i32,
    pub white_new_rating: i32,
    pub black_delta: i32,
    pub black_new_rating: i32,
}

impl RatingChange {
    pub fn unchanged(white_rating: i32, black_rating: i32) -> Self {
        RatingChange {
            white_delta: 0,
            white_new_rating: white_rating,
            black_delta: 0,
            black_new_rating: black_rating,
        }
    }
}

/// What a finalize produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner: Winner,
    pub rating_change: RatingChange,
}
