use serde::{Deserialize, Serialize};

use crate::models::game_session::{Color, DrawOffer, Winner};
use crate::models::rating::RatingChange;

/// Events pushed to the clients of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GameEvent {
    PositionUpdated {
        position: String,
        last_move: String,
        white_time_ms: i64,
        black_time_ms: i64,
    },
    DrawOffered {
        offer: DrawOffer,
    },
    DrawRejected {
        rejected_by: Color,
    },
    MatchOver {
        winner: Winner,
        rating_change: RatingChange,
    },
    TimeExpired {
        winner: Winner,
        rating_change: RatingChange,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Session the event belongs to.
    pub room: String,
    /// Users connected to the room.
    pub recipients: Vec<String>,
    pub event: GameEvent,
}

impl Notification {
    pub fn new(room: &str, recipients: Vec<String>, event: GameEvent) -> Self {
        Notification {
            room: room.to_string(),
            recipients,
            event,
        }
    }

    /// Wire payload sent to each recipient.
    pub fn payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&serde_json::json!({
            "session_id": self.room,
            "event": self.event,
        }))
    }
}
