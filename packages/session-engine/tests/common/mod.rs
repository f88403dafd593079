#![allow(dead_code)]

use std::sync::Arc;

use session_engine::models::player::PlayerProfile;
use session_engine::repositories::in_memory::{
    InMemoryMatchRepository, InMemoryPlayerRepository, InMemorySessionRepository,
};
use session_engine::repositories::player_repository::PlayerRepository;
use session_engine::services::chess_service::ChessRules;
use session_engine::services::game_session_service::Stores;
use session_engine::services::notification_service::LogNotificationSink;
use session_engine::time::ManualTimeSource;
use session_engine::{Color, EngineConfig, GameSessionService, TimeoutWatcher, WatcherHandle};

pub const START: i64 = 1_700_000_000_000;

pub struct TestEngine {
    pub service: Arc<GameSessionService>,
    pub sessions: Arc<InMemorySessionRepository>,
    pub matches: Arc<InMemoryMatchRepository>,
    pub players: Arc<InMemoryPlayerRepository>,
    pub clock: Arc<ManualTimeSource>,
    pub handle: WatcherHandle,
}

impl TestEngine {
    pub async fn new(player_ids: &[&str]) -> Self {
        Self::with_config(player_ids, EngineConfig::default()).await
    }

    pub async fn with_config(player_ids: &[&str], config: EngineConfig) -> Self {
        let sessions = Arc::new(InMemorySessionRepository::new());
        let players = Arc::new(InMemoryPlayerRepository::new());
        let matches = Arc::new(InMemoryMatchRepository::new(players.clone()));
        let clock = Arc::new(ManualTimeSource::new(START));
        let handle = WatcherHandle::new();

        for id in player_ids {
            let mut profile = PlayerProfile::new(id, id);
            profile.rating = 1500;
            profile.games_played = 40;
            players
                .create_player(&profile)
                .await
                .expect("Failed to seed player");
        }

        let service = Arc::new(GameSessionService::new(
            Stores {
                sessions: sessions.clone(),
                matches: matches.clone(),
                players: players.clone(),
            },
            Arc::new(ChessRules::new()),
            Arc::new(LogNotificationSink),
            clock.clone(),
            config,
            handle.clone(),
        ));

        TestEngine {
            service,
            sessions,
            matches,
            players,
            clock,
            handle,
        }
    }

    pub fn watcher(&self) -> TimeoutWatcher {
        TimeoutWatcher::new(
            self.service.clone(),
            Arc::new(LogNotificationSink),
            self.handle.clone(),
        )
    }

    /// Starts a match and returns (session id, white id, black id).
    pub async fn start(&self, a: &str, b: &str) -> (String, String, String) {
        let created = self
            .service
            .create_session(&[a.to_string(), b.to_string()])
            .await
            .expect("Failed to create session");

        let id_of = |color: Color| {
            created
                .participants
                .iter()
                .find(|p| p.color == color)
                .map(|p| p.user_id.clone())
                .expect("Missing participant color")
        };

        (created.session_id.clone(), id_of(Color::White), id_of(Color::Black))
    }
}
