use serde::{Deserialize, Serialize};

pub const DEFAULT_RATING: i32 = 1200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: String,
    pub username: String,
    pub rating: i32,
    /// Number of decisive games already rated.
    #[serde(default)]
    pub games_played: u32,
}

impl PlayerProfile {
    pub fn new(id: &str, username: &str) -> Self {
        PlayerProfile {
            id: id.to_string(),
            username: username.to_string(),
            rating: DEFAULT_RATING,
            games_played: 0,
        }
    }
}

/// A rating write that only applies if the stored rating still equals
/// `expected_rating`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRatingUpdate {
    pub player_id: String,
    pub expected_rating: i32,
    pub new_rating: i32,
}
