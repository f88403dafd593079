use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::game_session::{Color, Winner};

/// Permanent record of a match. `ended_at` and `winner` stay empty while the
/// match is in progress and are written exactly once at finalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub white_player_id: String,
    pub black_player_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
}

impl MatchRecord {
    pub fn new(
        id: &str,
        white_player_id: &str,
        black_player_id: &str,
        started_at: DateTime<Utc>,
    ) -> Self {
        MatchRecord {
            id: id.to_string(),
            white_player_id: white_player_id.to_string(),
            black_player_id: black_player_id.to_string(),
            started_at,
            ended_at: None,
            winner: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn involves(&self, player_id: &str) -> bool {
        self.white_player_id == player_id || self.black_player_id == player_id
    }

    pub fn player_ids(&self) -> Vec<String> {
        vec![self.white_player_id.clone(), self.black_player_id.clone()]
    }
}

/// One accepted move. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub id: String,
    pub match_id: String,
    pub move_number: u32,
    pub color: Color,
    pub notation: String,
    pub resulting_position: String,
    pub white_clock_ms: i64,
    pub black_clock_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_match_is_in_progress() {
        let record = MatchRecord::new("match-1", "white", "black", Utc::now());

        assert!(!record.is_finished());
        assert!(record.winner.is_none());
        assert!(record.involves("white"));
        assert!(record.involves("black"));
        assert!(!record.involves("someone-else"));
    }

    #[test]
    fn test_in_progress_match_omits_end_fields() {
        let record = MatchRecord::new("match-1", "white", "black", Utc::now());
        let serialized = serde_json::to_string(&record).unwrap();

        assert!(!serialized.contains("ended_at"));
        assert!(!serialized.contains("winner"));

        let deserialized: MatchRecord = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, record);
    }
}
