use serde::{Deserialize, Serialize};

pub const STARTING_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// Outcome of a finished match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    White,
    Black,
    Draw,
}

impl Winner {
    pub fn is_draw(self) -> bool {
        matches!(self, Winner::Draw)
    }
}

impl From<Color> for Winner {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Winner::White,
            Color::Black => Winner::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub remaining_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub color: Color,
    pub clock: Clock,
}

impl Participant {
    pub fn new(user_id: &str, color: Color, remaining_ms: i64) -> Self {
        Participant {
            user_id: user_id.to_string(),
            color,
            clock: Clock { remaining_ms },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawOffer {
    pub offered_by: Color,
    pub expires_at: i64,
}

impl DrawOffer {
    pub fn is_live(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at
    }
}

/// Live state of an in-progress match, held in the ephemeral store.
///
/// The stored clock of the participant on move does not include the time
/// elapsed since `last_move_epoch`; see `services::clock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub participants: Vec<Participant>,
    pub position: String,
    /// Epoch millis of the last accepted move, 0 until the first move.
    pub last_move_epoch: i64,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw_offer: Option<DrawOffer>,
    #[serde(default)]
    pub move_count: u32,
    #[serde(default)]
    pub version: u64,
}

impl Session {
    pub fn new(
        session_id: &str,
        participants: Vec<Participant>,
        position: &str,
        started_at: i64,
    ) -> Self {
        Session {
            session_id: session_id.to_string(),
            participants,
            position: position.to_string(),
            last_move_epoch: 0,
            started_at,
            draw_offer: None,
            move_count: 0,
            version: 0,
        }
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn participant_by_color(&self, color: Color) -> Option<&Participant> {
        self.participants.iter().find(|p| p.color == color)
    }

    pub fn participant_by_color_mut(&mut self, color: Color) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.color == color)
    }

    pub fn participant_ids(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.user_id.clone()).collect()
    }

    pub fn stored_remaining_ms(&self, color: Color) -> Option<i64> {
        self.participant_by_color(color).map(|p| p.clock.remaining_ms)
    }

    pub fn has_moved(&self) -> bool {
        self.last_move_epoch != 0
    }

    /// Instant from which the side on move has been spending time.
    pub fn clock_anchor(&self) -> i64 {
        if self.has_moved() {
            self.last_move_epoch
        } else {
            self.started_at
        }
    }

    /// Exactly two distinct participants, one per color.
    pub fn is_well_formed(&self) -> bool {
        self.participants.len() == 2
            && self.participants[0].user_id != self.participants[1].user_id
            && self.participant_by_color(Color::White).is_some()
            && self.participant_by_color(Color::Black).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> Session {
        Session::new(
            "session-1",
            vec![
                Participant::new("white-player", Color::White, 600_000),
                Participant::new("black-player", Color::Black, 600_000),
            ],
            STARTING_POSITION,
            1_000,
        )
    }

    #[test]
    fn test_new_session_fields() {
        let session = sample_session();

        assert_eq!(session.session_id, "session-1");
        assert_eq!(session.position, STARTING_POSITION);
        assert_eq!(session.last_move_epoch, 0);
        assert_eq!(session.started_at, 1_000);
        assert!(session.draw_offer.is_none());
        assert_eq!(session.version, 0);
        assert!(session.is_well_formed());
    }

    #[test]
    fn test_participant_lookup() {
        let session = sample_session();

        assert_eq!(
            session.participant("black-player").map(|p| p.color),
            Some(Color::Black)
        );
        assert!(session.participant("stranger").is_none());
        assert_eq!(
            session
                .participant_by_color(Color::White)
                .map(|p| p.user_id.as_str()),
            Some("white-player")
        );
    }

    #[test]
    fn test_clock_anchor_uses_start_until_first_move() {
        let mut session = sample_session();
        assert!(!session.has_moved());
        assert_eq!(session.clock_anchor(), 1_000);

        session.last_move_epoch = 5_000;
        assert!(session.has_moved());
        assert_eq!(session.clock_anchor(), 5_000);
    }

    #[test]
    fn test_same_player_twice_is_not_well_formed() {
        let session = Session::new(
            "session-2",
            vec![
                Participant::new("same", Color::White, 1),
                Participant::new("same", Color::Black, 1),
            ],
            STARTING_POSITION,
            0,
        );

        assert!(!session.is_well_formed());
    }

    #[test]
    fn test_two_whites_is_not_well_formed() {
        let session = Session::new(
            "session-3",
            vec![
                Participant::new("a", Color::White, 1),
                Participant::new("b", Color::White, 1),
            ],
            STARTING_POSITION,
            0,
        );

        assert!(!session.is_well_formed());
    }

    #[test]
    fn test_session_serialization_round_trip() {
        let mut session = sample_session();
        session.draw_offer = Some(DrawOffer {
            offered_by: Color::Black,
            expires_at: 42,
        });

        let serialized = serde_json::to_string(&session).unwrap();
        assert!(serialized.contains("\"last_move_epoch\""));
        assert!(serialized.contains("\"draw_offer\""));

        let deserialized: Session = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, session);
    }

    #[test]
    fn test_absent_draw_offer_is_not_serialized() {
        let serialized = serde_json::to_string(&sample_session()).unwrap();
        assert!(!serialized.contains("draw_offer"));
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(serde_json::to_string(&Color::White).unwrap(), "\"White\"");
        assert_eq!(serde_json::to_string(&Winner::Draw).unwrap(), "\"Draw\"");
    }

    #[test]
    fn test_winner_from_color() {
        assert_eq!(Winner::from(Color::Black), Winner::Black);
        assert_eq!(Color::White.opposite(), Color::Black);
    }

    #[test]
    fn test_draw_offer_liveness() {
        let offer = DrawOffer {
            offered_by: Color::White,
            expires_at: 100,
        };

        assert!(offer.is_live(99));
        assert!(!offer.is_live(100));
    }
}
