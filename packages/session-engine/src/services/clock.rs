//! Lazy per-player clocks.
//!
//! Only the side on move spends time, and that time is never written back
//! until a move is accepted. Everything here is a pure function of the stored
//! session and an instant.

use crate::models::game_session::{Color, Session};
use crate::models::snapshot::SessionTimes;

/// Time spent by the side on move since the clock anchor. Never negative.
pub fn elapsed_ms(session: &Session, now_ms: i64) -> i64 {
    (now_ms - session.clock_anchor()).max(0)
}

/// Effective remaining time for `color` at `now_ms`, given whose turn it is.
pub fn effective_remaining(session: &Session, color: Color, on_move: Color, now_ms: i64) -> i64 {
    let stored = session.stored_remaining_ms(color).unwrap_or(0);
    if color == on_move {
        stored - elapsed_ms(session, now_ms)
    } else {
        stored
    }
}

pub fn times(session: &Session, on_move: Color, now_ms: i64) -> SessionTimes {
    SessionTimes {
        white_ms: effective_remaining(session, Color::White, on_move, now_ms),
        black_ms: effective_remaining(session, Color::Black, on_move, now_ms),
    }
}

/// The color whose effective clock has run out, if any.
pub fn expired(times: &SessionTimes) -> Option<Color> {
    if times.white_ms <= 0 {
        Some(Color::White)
    } else if times.black_ms <= 0 {
        Some(Color::Black)
    } else {
        None
    }
}
