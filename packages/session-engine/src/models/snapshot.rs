use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::game_session::{Color, DrawOffer, Participant, Winner};
use crate::models::match_record::{MatchRecord, MoveRecord};
use crate::models::player::PlayerProfile;
use crate::models::rating::MatchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTimes {
    pub white_ms: i64,
    pub black_ms: i64,
}

impl SessionTimes {
    pub fn for_color(&self, color: Color) -> i64 {
        match color {
            Color::White => self.white_ms,
            Color::Black => self.black_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: String,
    pub username: String,
    pub rating: i32,
}

impl From<PlayerProfile> for PlayerSummary {
    fn from(profile: PlayerProfile) -> Self {
        PlayerSummary {
            id: profile.id,
            username: profile.username,
            rating: profile.rating,
        }
    }
}

/// Returned to the matchmaking collaborator after a session is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedSession {
    pub session_id: String,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveResult {
    pub position: String,
    pub times: SessionTimes,
    /// Present when the move ended the game.
    pub result: Option<MatchResult>,
}

/// Read-only view of a live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub position: String,
    pub turn: Color,
    pub times: SessionTimes,
    pub game_over: bool,
    pub winner: Option<Winner>,
    pub draw_offer: Option<DrawOffer>,
}

/// Everything a client needs to resume its current match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveMatchSnapshot {
    pub match_id: String,
    pub white: PlayerSummary,
    pub black: PlayerSummary,
    pub started_at: DateTime<Utc>,
    pub position: String,
    pub turn: Color,
    pub times: SessionTimes,
    pub game_over: bool,
    pub winner: Option<Winner>,
    pub draw_offer: Option<DrawOffer>,
    /// Time left before a session without moves is treated as abandoned.
    pub abandonment_remaining_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub id: String,
    pub white: PlayerSummary,
    pub black: PlayerSummary,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub winner: Option<Winner>,
}

impl MatchSummary {
    pub fn new(record: MatchRecord, white: PlayerSummary, black: PlayerSummary) -> Self {
        MatchSummary {
            id: record.id,
            white,
            black,
            started_at: record.started_at,
            ended_at: record.ended_at,
            winner: record.winner,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchWithMoves {
    #[serde(flatten)]
    pub summary: MatchSummary,
    pub moves: Vec<MoveRecord>,
}
