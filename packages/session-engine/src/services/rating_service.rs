//! Elo rating adjustment applied when a match is finalized.

use crate::models::game_session::Winner;
use crate::models::player::{PlayerProfile, PlayerRatingUpdate};
use crate::models::rating::RatingChange;

/// Players with at most this many decisive games use the provisional K-factor.
pub const PROVISIONAL_GAMES: u32 = 30;
pub const MASTER_RATING: i32 = 2400;

pub fn k_factor(games_played: u32, rating: i32) -> i32 {
    if games_played <= PROVISIONAL_GAMES {
        40
    } else if rating <= MASTER_RATING {
        20
    } else {
        10
    }
}

/// Expected score of a player rated `rating` against `opponent_rating`.
pub fn expected_score(rating: i32, opponent_rating: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent_rating - rating) / 400.0))
}

fn delta(player: &PlayerProfile, opponent: &PlayerProfile, actual: f64) -> i32 {
    let k = f64::from(k_factor(player.games_played, player.rating));
    (k * (actual - expected_score(player.rating, opponent.rating))).round() as i32
}

/// Each side's K-factor comes from its own history.
pub fn compute(white: &PlayerProfile, black: &PlayerProfile, winner: Winner) -> RatingChange {
    let (white_actual, black_actual) = match winner {
        Winner::Draw => return RatingChange::unchanged(white.rating, black.rating),
        Winner::White => (1.0, 0.0),
        Winner::Black => (0.0, 1.0),
    };

    let white_delta = delta(white, black, white_actual);
    let black_delta = delta(black, white, black_actual);

    RatingChange {
        white_delta,
        white_new_rating: white.rating + white_delta,
        black_delta,
        black_new_rating: black.rating + black_delta,
    }
}

/// Conditional writes for a decisive result. A draw writes nothing.
pub fn rating_updates(
    white: &PlayerProfile,
    black: &PlayerProfile,
    winner: Winner,
    change: &RatingChange,
) -> Vec<PlayerRatingUpdate> {
    if winner.is_draw() {
        return Vec::new();
    }

    vec![
        PlayerRatingUpdate {
            player_id: white.id.clone(),
            expected_rating: white.rating,
            new_rating: change.white_new_rating,
        },
        PlayerRatingUpdate {
            player_id: black.id.clone(),
            expected_rating: black.rating,
            new_rating: change.black_new_rating,
        },
    ]
}
