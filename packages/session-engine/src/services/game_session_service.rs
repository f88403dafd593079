use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    models::{
        game_session::{Color, DrawOffer, Participant, Session, Winner, STARTING_POSITION},
        match_record::{MatchRecord, MoveRecord},
        move_request::MoveRequest,
        notification::{GameEvent, Notification},
        player::PlayerProfile,
        rating::{MatchResult, RatingChange},
        snapshot::{
            ActiveMatchSnapshot, CreatedSession, MatchSummary, MatchWithMoves, MoveResult,
            PlayerSummary, SessionTimes, SessionView,
        },
    },
    repositories::{
        errors::{
            player_repository_errors::PlayerRepositoryError,
            session_repository_errors::SessionRepositoryError,
        },
        match_repository::{MatchCompletion, MatchRepository},
        player_repository::PlayerRepository,
        session_repository::SessionRepository,
    },
    services::{
        chess_service::RulesEngine, clock,
        errors::game_session_service_errors::GameSessionServiceError,
        notification_service::NotificationSink, rating_service, session_cache::SessionCache,
        session_locks::SessionLocks, timeout_watcher::WatcherHandle,
    },
    time::{to_datetime, TimeSource},
};

type ServiceResult<T> = Result<T, GameSessionServiceError>;

/// The stores the engine reads and writes.
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionRepository + Send + Sync>,
    pub matches: Arc<dyn MatchRepository + Send + Sync>,
    pub players: Arc<dyn PlayerRepository + Send + Sync>,
}

/// A session the watcher has just finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiredSession {
    pub session_id: String,
    pub participants: Vec<String>,
    pub result: MatchResult,
}

pub struct GameSessionService {
    cache: SessionCache,
    locks: SessionLocks,
    matches: Arc<dyn MatchRepository + Send + Sync>,
    players: Arc<dyn PlayerRepository + Send + Sync>,
    rules: Arc<dyn RulesEngine>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn TimeSource>,
    config: EngineConfig,
    watcher: WatcherHandle,
}

impl GameSessionService {
    pub fn new(
        stores: Stores,
        rules: Arc<dyn RulesEngine>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn TimeSource>,
        config: EngineConfig,
        watcher: WatcherHandle,
    ) -> Self {
        GameSessionService {
            cache: SessionCache::new(stores.sessions),
            locks: SessionLocks::new(),
            matches: stores.matches,
            players: stores.players,
            rules,
            notifier,
            clock,
            config,
            watcher,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Returns the player's profile, registering it at the default rating on
    /// first sight.
    pub async fn ensure_player(
        &self,
        user_id: &str,
        username: &str,
    ) -> ServiceResult<PlayerProfile> {
        match self.players.get_player(user_id).await {
            Ok(profile) => Ok(profile),
            Err(PlayerRepositoryError::NotFound) => {
                let profile = PlayerProfile::new(user_id, username);
                self.players.create_player(&profile).await?;
                info!("Registered player {} ({})", user_id, username);
                Ok(profile)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Starts a match between two distinct players with randomly assigned colors.
    pub async fn create_session(
        &self,
        participant_ids: &[String],
    ) -> ServiceResult<CreatedSession> {
        let [first, second] = participant_ids else {
            return Err(GameSessionServiceError::BadRequest(
                "Exactly two participants are required".to_string(),
            ));
        };
        if first == second {
            return Err(GameSessionServiceError::BadRequest(
                "Participants must be distinct".to_string(),
            ));
        }

        for user_id in participant_ids {
            if self
                .cache
                .store()
                .get_active_session_id(user_id)
                .await?
                .is_some()
            {
                return Err(GameSessionServiceError::Conflict(format!(
                    "User {} already has an active match",
                    user_id
                )));
            }
        }

        // Both profiles must exist so the match can be rated when it ends.
        self.players.get_player(first).await?;
        self.players.get_player(second).await?;

        let (white_id, black_id) = if rand::random::<bool>() {
            (first, second)
        } else {
            (second, first)
        };

        let session_id = Uuid::new_v4().to_string();
        let now = self.clock.now_ms();
        let session = Session::new(
            &session_id,
            vec![
                Participant::new(white_id, Color::White, self.config.initial_clock_ms),
                Participant::new(black_id, Color::Black, self.config.initial_clock_ms),
            ],
            STARTING_POSITION,
            now,
        );

        let player_ids = vec![white_id.clone(), black_id.clone()];
        self.claim_participants(&session_id, &player_ids).await?;

        let record = MatchRecord::new(&session_id, white_id, black_id, to_datetime(now));
        if let Err(e) = self.matches.create_match(&record).await {
            error!("Failed to create match record {}: {}", session_id, e);
            self.release_participants(&session_id, &player_ids).await;
            return Err(e.into());
        }

        if let Err(e) = self.cache.create(&session).await {
            error!("Failed to store session {}: {}", session_id, e);
            self.release_participants(&session_id, &player_ids).await;
            return Err(e.into());
        }

        info!(
            "Created session {} (white: {}, black: {})",
            session_id, white_id, black_id
        );
        self.watcher.wake();

        Ok(CreatedSession {
            session_id,
            participants: session.participants,
        })
    }

    async fn claim_participants(
        &self,
        session_id: &str,
        user_ids: &[String],
    ) -> ServiceResult<()> {
        for user_id in user_ids {
            if let Err(e) = self.cache.store().set_active(user_id, session_id).await {
                warn!(
                    "Could not index user {} against session {}: {}",
                    user_id, session_id, e
                );
                self.release_participants(session_id, user_ids).await;
                return Err(e.into());
            }
        }
        Ok(())
    }

    async fn release_participants(&self, session_id: &str, user_ids: &[String]) {
        if let Err(e) = self.cache.store().clear_active(session_id, user_ids).await {
            error!(
                "Failed to clear active index for session {}: {}",
                session_id, e
            );
        }
    }

    /// Applies `request` for `user_id` as of `request_ts`.
    ///
    /// An illegal move leaves the stored session untouched.
    pub async fn make_move(
        &self,
        session_id: &str,
        user_id: &str,
        request: &MoveRequest,
        request_ts: i64,
    ) -> ServiceResult<MoveResult> {
        let (guard, mut session) = self.lock_session(session_id).await?;

        let mover = Self::color_of(&session, user_id)?;
        let turn = self.rules.turn_of(&session.position)?;
        if mover != turn {
            return Err(GameSessionServiceError::Forbidden(
                "Not your turn".to_string(),
            ));
        }

        let remaining = clock::effective_remaining(&session, mover, turn, request_ts);
        if remaining <= 0 || self.rules.is_terminal(&session.position)? {
            return Err(GameSessionServiceError::BadRequest(
                "Game is already over".to_string(),
            ));
        }

        let applied = self.rules.apply_move(
            &session.position,
            &request.from,
            &request.to,
            request.promotion,
        )?;

        let moved_at = request_ts.max(session.clock_anchor());
        if let Some(participant) = session.participant_by_color_mut(mover) {
            participant.clock.remaining_ms = remaining;
        }
        session.position = applied.position;
        session.last_move_epoch = moved_at;
        session.move_count += 1;
        session.draw_offer = None;

        let saved = self.save(&session).await?;
        self.record_move(&saved, mover, &applied.notation, moved_at)
            .await;

        let next_turn = mover.opposite();
        let times = clock::times(&saved, next_turn, moved_at);

        let result = if self.rules.is_terminal(&saved.position)? {
            let winner = self
                .winner_at(&saved, moved_at)?
                .unwrap_or(Winner::Draw);
            let rating_change = self.finalize_locked(session_id, winner).await?;
            Some(MatchResult {
                winner,
                rating_change,
            })
        } else {
            None
        };
        drop(guard);

        self.notify(
            &saved,
            GameEvent::PositionUpdated {
                position: saved.position.clone(),
                last_move: applied.notation,
                white_time_ms: times.white_ms,
                black_time_ms: times.black_ms,
            },
        )
        .await;
        if let Some(MatchResult {
            winner,
            rating_change,
        }) = result
        {
            self.notify(
                &saved,
                GameEvent::MatchOver {
                    winner,
                    rating_change,
                },
            )
            .await;
        }

        Ok(MoveResult {
            position: saved.position,
            times,
            result,
        })
    }

    async fn record_move(&self, session: &Session, color: Color, notation: &str, moved_at: i64) {
        let record = MoveRecord {
            id: Uuid::new_v4().to_string(),
            match_id: session.session_id.clone(),
            move_number: session.move_count,
            color,
            notation: notation.to_string(),
            resulting_position: session.position.clone(),
            white_clock_ms: session.stored_remaining_ms(Color::White).unwrap_or(0),
            black_clock_ms: session.stored_remaining_ms(Color::Black).unwrap_or(0),
            created_at: to_datetime(moved_at),
        };

        if let Err(e) = self.matches.append_move(&record).await {
            error!(
                "Failed to record move {} of match {}: {}",
                record.move_number, record.match_id, e
            );
        }
    }

    pub async fn get_times(&self, session_id: &str, now_ms: i64) -> ServiceResult<SessionTimes> {
        let session = self.load_session(session_id).await?;
        let turn = self.rules.turn_of(&session.position)?;
        Ok(clock::times(&session, turn, now_ms))
    }

    pub async fn get_position(&self, session_id: &str) -> ServiceResult<String> {
        Ok(self.load_session(session_id).await?.position)
    }

    pub async fn is_over(&self, session_id: &str) -> ServiceResult<bool> {
        let session = self.load_session(session_id).await?;
        self.over_at(&session, self.clock.now_ms())
    }

    pub async fn get_winner(&self, session_id: &str) -> ServiceResult<Option<Winner>> {
        let session = self.load_session(session_id).await?;
        self.winner_at(&session, self.clock.now_ms())
    }

    pub async fn get_session_view(&self, session_id: &str) -> ServiceResult<SessionView> {
        let session = self.load_session(session_id).await?;
        let now = self.clock.now_ms();
        let turn = self.rules.turn_of(&session.position)?;

        Ok(SessionView {
            session_id: session.session_id.clone(),
            position: session.position.clone(),
            turn,
            times: clock::times(&session, turn, now),
            game_over: self.over_at(&session, now)?,
            winner: self.winner_at(&session, now)?,
            draw_offer: session.draw_offer.filter(|offer| offer.is_live(now)),
        })
    }

    fn over_at(&self, session: &Session, now_ms: i64) -> ServiceResult<bool> {
        if self.rules.is_terminal(&session.position)? {
            return Ok(true);
        }
        let turn = self.rules.turn_of(&session.position)?;
        Ok(clock::expired(&clock::times(session, turn, now_ms)).is_some())
    }

    fn winner_at(&self, session: &Session, now_ms: i64) -> ServiceResult<Option<Winner>> {
        if self.rules.is_draw(&session.position)? {
            return Ok(Some(Winner::Draw));
        }

        let turn = self.rules.turn_of(&session.position)?;
        if self.rules.is_checkmate(&session.position)? {
            return Ok(Some(Winner::from(turn.opposite())));
        }

        let times = clock::times(session, turn, now_ms);
        Ok(clock::expired(&times).map(|loser| Winner::from(loser.opposite())))
    }

    /// Replaces any earlier offer in the session.
    pub async fn offer_draw(&self, session_id: &str, user_id: &str) -> ServiceResult<DrawOffer> {
        let (guard, mut session) = self.lock_session(session_id).await?;
        let offered_by = Self::color_of(&session, user_id)?;

        let offer = DrawOffer {
            offered_by,
            expires_at: self.clock.now_ms() + self.config.draw_offer_window_ms,
        };
        session.draw_offer = Some(offer);
        let saved = self.save(&session).await?;
        drop(guard);

        info!("User {} offered a draw in session {}", user_id, session_id);
        self.notify(&saved, GameEvent::DrawOffered { offer }).await;

        Ok(offer)
    }

    /// Accepting ends the game as a draw and returns the rating change.
    /// Declining clears the offer and returns `None`.
    pub async fn respond_draw_offer(
        &self,
        session_id: &str,
        user_id: &str,
        accepted: bool,
    ) -> ServiceResult<Option<RatingChange>> {
        let (guard, mut session) = self.lock_session(session_id).await?;
        let responder = Self::color_of(&session, user_id)?;

        let offer = session.draw_offer.ok_or_else(|| {
            GameSessionServiceError::BadRequest("No pending draw offer".to_string())
        })?;
        if offer.offered_by == responder {
            return Err(GameSessionServiceError::Forbidden(
                "Cannot respond to your own draw offer".to_string(),
            ));
        }

        if !offer.is_live(self.clock.now_ms()) {
            session.draw_offer = None;
            self.save(&session).await?;
            return Err(GameSessionServiceError::BadRequest(
                "No pending draw offer".to_string(),
            ));
        }

        if accepted {
            let rating_change = self.finalize_locked(session_id, Winner::Draw).await?;
            drop(guard);
            self.notify(
                &session,
                GameEvent::MatchOver {
                    winner: Winner::Draw,
                    rating_change,
                },
            )
            .await;
            return Ok(Some(rating_change));
        }

        session.draw_offer = None;
        let saved = self.save(&session).await?;
        drop(guard);
        info!("User {} declined the draw in session {}", user_id, session_id);
        self.notify(
            &saved,
            GameEvent::DrawRejected {
                rejected_by: responder,
            },
        )
        .await;

        Ok(None)
    }

    pub async fn resign(&self, session_id: &str, user_id: &str) -> ServiceResult<MatchResult> {
        let (guard, session) = self.lock_session(session_id).await?;
        let color = Self::color_of(&session, user_id)?;

        let winner = Winner::from(color.opposite());
        let rating_change = self.finalize_locked(session_id, winner).await?;
        drop(guard);
        info!("User {} resigned session {}", user_id, session_id);
        self.notify(
            &session,
            GameEvent::MatchOver {
                winner,
                rating_change,
            },
        )
        .await;

        Ok(MatchResult {
            winner,
            rating_change,
        })
    }

    /// Ends the match with `winner`. Fails `Conflict` if it already ended.
    pub async fn finalize(&self, session_id: &str, winner: Winner) -> ServiceResult<RatingChange> {
        let guard = self.locks.acquire(session_id).await;
        let result = self.finalize_locked(session_id, winner).await;
        if let Err(GameSessionServiceError::NotFound(_)) = result {
            drop(guard);
            self.locks.release(session_id);
        }
        result
    }

    /// Caller must hold the session lock.
    async fn finalize_locked(
        &self,
        session_id: &str,
        winner: Winner,
    ) -> ServiceResult<RatingChange> {
        let record = self.matches.get_match(session_id).await?.ok_or_else(|| {
            GameSessionServiceError::NotFound("Match not found".to_string())
        })?;

        if record.is_finished() {
            // A previous finalize committed but did not get to clean up.
            self.discard_session(session_id, &record.player_ids()).await;
            return Err(GameSessionServiceError::Conflict(
                "Match already finished".to_string(),
            ));
        }

        let white = self.players.get_player(&record.white_player_id).await?;
        let black = self.players.get_player(&record.black_player_id).await?;
        let rating_change = rating_service::compute(&white, &black, winner);

        let completion = MatchCompletion {
            match_id: record.id.clone(),
            winner,
            ended_at: to_datetime(self.clock.now_ms()),
            rating_updates: rating_service::rating_updates(&white, &black, winner, &rating_change),
        };
        self.matches.complete_match(&completion).await.map_err(|e| {
            warn!("Finalize of match {} was rejected: {}", session_id, e);
            GameSessionServiceError::from(e)
        })?;

        self.discard_session(session_id, &record.player_ids()).await;
        info!(
            "Finalized match {} with winner {:?} ({:+} / {:+})",
            session_id, winner, rating_change.white_delta, rating_change.black_delta
        );

        Ok(rating_change)
    }

    async fn discard_session(&self, session_id: &str, player_ids: &[String]) {
        if let Err(e) = self.cache.store().remove(session_id).await {
            error!("Failed to remove session {}: {}", session_id, e);
        }
        self.release_participants(session_id, player_ids).await;
        self.cache.invalidate(session_id);
        self.locks.release(session_id);
    }

    pub async fn active_session_ids(&self) -> ServiceResult<Vec<String>> {
        Ok(self.cache.store().list_active_session_ids().await?)
    }

    /// Finalizes the session if its clock, or its abandonment window, has run
    /// out. Reads the store rather than the cache.
    pub async fn expire_if_due(&self, session_id: &str) -> ServiceResult<Option<ExpiredSession>> {
        let _guard = self.locks.acquire(session_id).await;
        let Some(session) = self.cache.refresh(session_id).await? else {
            self.locks.release(session_id);
            return Ok(None);
        };
        let now = self.clock.now_ms();

        let winner = if !session.has_moved() {
            if now - session.started_at > self.config.abandonment_threshold_ms {
                Some(Winner::Draw)
            } else {
                None
            }
        } else if self.rules.is_terminal(&session.position)? {
            self.winner_at(&session, now)?
        } else {
            let turn = self.rules.turn_of(&session.position)?;
            if clock::effective_remaining(&session, turn, turn, now) <= 0 {
                Some(Winner::from(turn.opposite()))
            } else {
                None
            }
        };

        let Some(winner) = winner else {
            return Ok(None);
        };

        let rating_change = self.finalize_locked(session_id, winner).await?;
        Ok(Some(ExpiredSession {
            session_id: session_id.to_string(),
            participants: session.participant_ids(),
            result: MatchResult {
                winner,
                rating_change,
            },
        }))
    }

    pub async fn get_active_match(&self, user_id: &str) -> ServiceResult<ActiveMatchSnapshot> {
        let no_match = || GameSessionServiceError::NotFound("No active match".to_string());

        let match_id = self
            .cache
            .store()
            .get_active_session_id(user_id)
            .await?
            .ok_or_else(no_match)?;
        let record = self
            .matches
            .get_match(&match_id)
            .await?
            .filter(|record| !record.is_finished())
            .ok_or_else(no_match)?;

        let white = self.players.get_player(&record.white_player_id).await?;
        let black = self.players.get_player(&record.black_player_id).await?;
        let session = self.load_session(&match_id).await?;

        let now = self.clock.now_ms();
        let turn = self.rules.turn_of(&session.position)?;
        let abandonment_remaining_ms = if session.has_moved() {
            None
        } else {
            Some((self.config.abandonment_threshold_ms - (now - session.started_at)).max(0))
        };

        Ok(ActiveMatchSnapshot {
            match_id: record.id,
            white: white.into(),
            black: black.into(),
            started_at: record.started_at,
            position: session.position.clone(),
            turn,
            times: clock::times(&session, turn, now),
            game_over: self.over_at(&session, now)?,
            winner: self.winner_at(&session, now)?,
            draw_offer: session.draw_offer.filter(|offer| offer.is_live(now)),
            abandonment_remaining_ms,
        })
    }

    /// Finished matches of `user_id`, most recent first.
    pub async fn get_match_history(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> ServiceResult<Vec<MatchSummary>> {
        if limit < 0 || offset < 0 {
            return Err(GameSessionServiceError::BadRequest(
                "limit and offset must be non-negative".to_string(),
            ));
        }

        let records = self
            .matches
            .list_finished_matches(user_id, limit as usize, offset as usize)
            .await?;

        let mut profiles: HashMap<String, PlayerSummary> = HashMap::new();
        let mut summaries = Vec::with_capacity(records.len());
        for record in records {
            let white = self.summary_of(&record.white_player_id, &mut profiles).await?;
            let black = self.summary_of(&record.black_player_id, &mut profiles).await?;
            summaries.push(MatchSummary::new(record, white, black));
        }

        Ok(summaries)
    }

    async fn summary_of(
        &self,
        player_id: &str,
        seen: &mut HashMap<String, PlayerSummary>,
    ) -> ServiceResult<PlayerSummary> {
        if let Some(summary) = seen.get(player_id) {
            return Ok(summary.clone());
        }
        let summary = PlayerSummary::from(self.players.get_player(player_id).await?);
        seen.insert(player_id.to_string(), summary.clone());
        Ok(summary)
    }

    pub async fn get_match_with_moves(&self, match_id: &str) -> ServiceResult<MatchWithMoves> {
        let record = self.matches.get_match(match_id).await?.ok_or_else(|| {
            GameSessionServiceError::NotFound("Match not found".to_string())
        })?;
        if !record.is_finished() {
            return Err(GameSessionServiceError::BadRequest(
                "Match is still in progress".to_string(),
            ));
        }

        let moves = self.matches.list_moves(match_id).await?;
        let white = self.players.get_player(&record.white_player_id).await?;
        let black = self.players.get_player(&record.black_player_id).await?;

        Ok(MatchWithMoves {
            summary: MatchSummary::new(record, white.into(), black.into()),
            moves,
        })
    }

    /// Takes the session's lock and loads it. An unknown session leaves no
    /// lock behind.
    async fn lock_session(
        &self,
        session_id: &str,
    ) -> ServiceResult<(OwnedMutexGuard<()>, Session)> {
        let guard = self.locks.acquire(session_id).await;
        match self.load_session(session_id).await {
            Ok(session) => Ok((guard, session)),
            Err(e) => {
                if let GameSessionServiceError::NotFound(_) = e {
                    drop(guard);
                    self.locks.release(session_id);
                }
                Err(e)
            }
        }
    }

    async fn load_session(&self, session_id: &str) -> ServiceResult<Session> {
        self.cache.load(session_id).await?.ok_or_else(|| {
            GameSessionServiceError::NotFound(format!("Session {} not found", session_id))
        })
    }

    async fn save(&self, session: &Session) -> ServiceResult<Session> {
        self.cache.save(session).await.map_err(|e| {
            if let SessionRepositoryError::VersionConflict(_) = e {
                warn!("Session {} changed underneath a write", session.session_id);
            } else {
                error!("Failed to save session {}: {}", session.session_id, e);
            }
            GameSessionServiceError::from(e)
        })
    }

    fn color_of(session: &Session, user_id: &str) -> ServiceResult<Color> {
        session
            .participant(user_id)
            .map(|participant| participant.color)
            .ok_or_else(|| {
                GameSessionServiceError::Forbidden(
                    "Not a participant in this session".to_string(),
                )
            })
    }

    async fn notify(&self, session: &Session, event: GameEvent) {
        let notification = Notification::new(&session.session_id, session.participant_ids(), event);
        self.notifier.publish(&notification).await;
    }
}
