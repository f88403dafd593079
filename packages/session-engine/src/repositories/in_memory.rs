//! In-process store backends for local runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::models::game_session::Session;
use crate::models::match_record::{MatchRecord, MoveRecord};
use crate::models::player::PlayerProfile;
use crate::repositories::errors::match_repository_errors::MatchRepositoryError;
use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;
use crate::repositories::errors::session_repository_errors::SessionRepositoryError;
use crate::repositories::match_repository::{page_finished, MatchCompletion, MatchRepository};
use crate::repositories::player_repository::PlayerRepository;
use crate::repositories::session_repository::SessionRepository;

/// Sessions are kept serialized, the way a key-value cache would hold them.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, String>>,
    active: RwLock<HashMap<String, String>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a payload as-is, bypassing serialization.
    pub async fn insert_raw(&self, session_id: &str, raw: &str) {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), raw.to_string());
    }

    pub async fn raw(&self, session_id: &str) -> Option<String> {
        self.sessions.read().await.get(session_id).cloned()
    }
}

fn encode(session: &Session) -> Result<String, SessionRepositoryError> {
    serde_json::to_string(session).map_err(|e| SessionRepositoryError::Serialization(e.to_string()))
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: &Session) -> Result<(), SessionRepositoryError> {
        let raw = encode(session)?;
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.session_id) {
            return Err(SessionRepositoryError::VersionConflict(
                session.session_id.clone(),
            ));
        }
        sessions.insert(session.session_id.clone(), raw);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionRepositoryError> {
        let sessions = self.sessions.read().await;
        let Some(raw) = sessions.get(session_id) else {
            return Ok(None);
        };

        match serde_json::from_str::<Session>(raw) {
            Ok(session) if session.is_well_formed() => Ok(Some(session)),
            Ok(_) => {
                warn!("Discarding malformed session {}", session_id);
                Ok(None)
            }
            Err(e) => {
                warn!("Discarding unreadable session {}: {}", session_id, e);
                Ok(None)
            }
        }
    }

    async fn update(&self, session: &Session) -> Result<u64, SessionRepositoryError> {
        let mut sessions = self.sessions.write().await;
        let stored_version = sessions
            .get(&session.session_id)
            .and_then(|raw| serde_json::from_str::<Session>(raw).ok())
            .map(|stored| stored.version);

        if stored_version != Some(session.version) {
            return Err(SessionRepositoryError::VersionConflict(
                session.session_id.clone(),
            ));
        }

        let mut next = session.clone();
        next.version += 1;
        sessions.insert(next.session_id.clone(), encode(&next)?);
        Ok(next.version)
    }

    async fn remove(&self, session_id: &str) -> Result<(), SessionRepositoryError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn list_active_session_ids(&self) -> Result<Vec<String>, SessionRepositoryError> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn set_active(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<(), SessionRepositoryError> {
        let mut active = self.active.write().await;
        if active.contains_key(user_id) {
            return Err(SessionRepositoryError::AlreadyExists(user_id.to_string()));
        }
        active.insert(user_id.to_string(), session_id.to_string());
        Ok(())
    }

    async fn get_active_session_id(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, SessionRepositoryError> {
        Ok(self.active.read().await.get(user_id).cloned())
    }

    async fn clear_active(
        &self,
        session_id: &str,
        user_ids: &[String],
    ) -> Result<(), SessionRepositoryError> {
        let mut active = self.active.write().await;
        for user_id in user_ids {
            if active.get(user_id).is_some_and(|indexed| indexed == session_id) {
                active.remove(user_id);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPlayerRepository {
    players: RwLock<HashMap<String, PlayerProfile>>,
    rating_writes: AtomicUsize,
}

impl InMemoryPlayerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of individual player rating writes applied so far.
    pub fn rating_write_count(&self) -> usize {
        self.rating_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlayerRepository for InMemoryPlayerRepository {
    async fn create_player(&self, player: &PlayerProfile) -> Result<(), PlayerRepositoryError> {
        self.players
            .write()
            .await
            .insert(player.id.clone(), player.clone());
        Ok(())
    }

    async fn get_player(&self, player_id: &str) -> Result<PlayerProfile, PlayerRepositoryError> {
        self.players
            .read()
            .await
            .get(player_id)
            .cloned()
            .ok_or(PlayerRepositoryError::NotFound)
    }
}

pub struct InMemoryMatchRepository {
    matches: RwLock<HashMap<String, MatchRecord>>,
    moves: RwLock<HashMap<String, Vec<MoveRecord>>>,
    players: Arc<InMemoryPlayerRepository>,
    completions: AtomicUsize,
}

impl InMemoryMatchRepository {
    pub fn new(players: Arc<InMemoryPlayerRepository>) -> Self {
        Self {
            matches: RwLock::new(HashMap::new()),
            moves: RwLock::new(HashMap::new()),
            players,
            completions: AtomicUsize::new(0),
        }
    }

    /// Number of results successfully recorded.
    pub fn completion_count(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatchRepository for InMemoryMatchRepository {
    async fn create_match(&self, record: &MatchRecord) -> Result<(), MatchRepositoryError> {
        let mut matches = self.matches.write().await;
        if matches.contains_key(&record.id) {
            return Err(MatchRepositoryError::ConditionFailed(record.id.clone()));
        }
        matches.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_match(&self, match_id: &str) -> Result<Option<MatchRecord>, MatchRepositoryError> {
        Ok(self.matches.read().await.get(match_id).cloned())
    }

    async fn complete_match(
        &self,
        completion: &MatchCompletion,
    ) -> Result<(), MatchRepositoryError> {
        // Lock order: matches, then players.
        let mut matches = self.matches.write().await;
        let mut players = self.players.players.write().await;

        let record = matches
            .get(&completion.match_id)
            .ok_or(MatchRepositoryError::NotFound)?;
        if record.is_finished() {
            return Err(MatchRepositoryError::AlreadyFinished(
                completion.match_id.clone(),
            ));
        }

        for rating_update in &completion.rating_updates {
            let current = players.get(&rating_update.player_id).map(|p| p.rating);
            if current != Some(rating_update.expected_rating) {
                return Err(MatchRepositoryError::Contended(format!(
                    "rating of {} changed",
                    rating_update.player_id
                )));
            }
        }

        for rating_update in &completion.rating_updates {
            if let Some(player) = players.get_mut(&rating_update.player_id) {
                player.rating = rating_update.new_rating;
                player.games_played += 1;
                self.players.rating_writes.fetch_add(1, Ordering::SeqCst);
            }
        }

        if let Some(record) = matches.get_mut(&completion.match_id) {
            record.ended_at = Some(completion.ended_at);
            record.winner = Some(completion.winner);
        }
        self.completions.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    async fn append_move(&self, record: &MoveRecord) -> Result<(), MatchRepositoryError> {
        let mut moves = self.moves.write().await;
        let history = moves.entry(record.match_id.clone()).or_default();
        if history.iter().any(|m| m.move_number == record.move_number) {
            return Err(MatchRepositoryError::ConditionFailed(record.id.clone()));
        }
        history.push(record.clone());
        Ok(())
    }

    async fn list_moves(&self, match_id: &str) -> Result<Vec<MoveRecord>, MatchRepositoryError> {
        let mut history = self
            .moves
            .read()
            .await
            .get(match_id)
            .cloned()
            .unwrap_or_default();
        history.sort_by_key(|record| record.move_number);
        Ok(history)
    }

    async fn list_finished_matches(
        &self,
        player_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MatchRecord>, MatchRepositoryError> {
        let records = self
            .matches
            .read()
            .await
            .values()
            .filter(|record| record.involves(player_id))
            .cloned()
            .collect();
        Ok(page_finished(records, limit, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game_session::{Color, Participant, Winner, STARTING_POSITION};
    use crate::models::player::PlayerRatingUpdate;
    use chrono::Utc;

    fn session(id: &str) -> Session {
        Session::new(
            id,
            vec![
                Participant::new("w", Color::White, 1_000),
                Participant::new("b", Color::Black, 1_000),
            ],
            STARTING_POSITION,
            10,
        )
    }

    #[tokio::test]
    async fn test_session_round_trips_unchanged() {
        let repository = InMemorySessionRepository::new();
        let original = session("s1");

        repository.create(&original).await.unwrap();
        let loaded = repository.get("s1").await.unwrap();

        assert_eq!(loaded, Some(original));
    }

    #[tokio::test]
    async fn test_corrupt_session_reads_as_absent() {
        let repository = InMemorySessionRepository::new();
        repository.insert_raw("broken", "{not json").await;

        assert_eq!(repository.get("broken").await.unwrap(), None);
        assert_eq!(
            repository.list_active_session_ids().await.unwrap(),
            vec!["broken".to_string()]
        );
    }

    #[tokio::test]
    async fn test_session_without_both_colors_reads_as_absent() {
        let repository = InMemorySessionRepository::new();
        let mut lopsided = session("s1");
        lopsided.participants[1].color = Color::White;
        repository
            .insert_raw("s1", &serde_json::to_string(&lopsided).unwrap())
            .await;

        assert_eq!(repository.get("s1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let repository = InMemorySessionRepository::new();
        let original = session("s1");
        repository.create(&original).await.unwrap();

        let version = repository.update(&original).await.unwrap();
        assert_eq!(version, 1);

        match repository.update(&original).await {
            Err(SessionRepositoryError::VersionConflict(id)) => assert_eq!(id, "s1"),
            other => panic!("Expected VersionConflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_active_index_rejects_second_session() {
        let repository = InMemorySessionRepository::new();
        repository.set_active("w", "s1").await.unwrap();

        let result = repository.set_active("w", "s2").await;
        assert!(matches!(result, Err(SessionRepositoryError::AlreadyExists(_))));

        repository.set_active("b", "s1").await.unwrap();
        repository
            .clear_active("s1", &["w".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(repository.get_active_session_id("w").await.unwrap(), None);
        assert_eq!(repository.get_active_session_id("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_active_keeps_entries_of_other_sessions() {
        let repository = InMemorySessionRepository::new();
        repository.set_active("w", "s1").await.unwrap();
        repository.set_active("b", "s2").await.unwrap();

        repository
            .clear_active("s1", &["w".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(repository.get_active_session_id("w").await.unwrap(), None);
        assert_eq!(
            repository.get_active_session_id("b").await.unwrap(),
            Some("s2".to_string())
        );
    }

    #[tokio::test]
    async fn test_complete_match_is_all_or_nothing() {
        let players = Arc::new(InMemoryPlayerRepository::new());
        let mut white = PlayerProfile::new("w", "white");
        white.rating = 1500;
        let mut black = PlayerProfile::new("b", "black");
        black.rating = 1500;
        players.create_player(&white).await.unwrap();
        players.create_player(&black).await.unwrap();

        let repository = InMemoryMatchRepository::new(players.clone());
        repository
            .create_match(&MatchRecord::new("m1", "w", "b", Utc::now()))
            .await
            .unwrap();

        let completion = MatchCompletion {
            match_id: "m1".to_string(),
            winner: Winner::White,
            ended_at: Utc::now(),
            rating_updates: vec![
                PlayerRatingUpdate {
                    player_id: "w".to_string(),
                    expected_rating: 1500,
                    new_rating: 1510,
                },
                PlayerRatingUpdate {
                    player_id: "b".to_string(),
                    expected_rating: 1499,
                    new_rating: 1490,
                },
            ],
        };

        let result = repository.complete_match(&completion).await;
        assert!(matches!(result, Err(MatchRepositoryError::Contended(_))));
        assert_eq!(players.get_player("w").await.unwrap().rating, 1500);
        assert!(!repository.get_match("m1").await.unwrap().unwrap().is_finished());
        assert_eq!(repository.completion_count(), 0);
    }

    #[tokio::test]
    async fn test_complete_match_only_once() {
        let players = Arc::new(InMemoryPlayerRepository::new());
        let repository = InMemoryMatchRepository::new(players);
        repository
            .create_match(&MatchRecord::new("m1", "w", "b", Utc::now()))
            .await
            .unwrap();

        let completion = MatchCompletion {
            match_id: "m1".to_string(),
            winner: Winner::Draw,
            ended_at: Utc::now(),
            rating_updates: vec![],
        };

        repository.complete_match(&completion).await.unwrap();
        let second = repository.complete_match(&completion).await;

        assert!(matches!(second, Err(MatchRepositoryError::AlreadyFinished(_))));
        assert_eq!(repository.completion_count(), 1);
    }
}
