use std::sync::Arc;

use session_engine::config::TableNames;
use session_engine::repositories::in_memory::{
    InMemoryMatchRepository, InMemoryPlayerRepository, InMemorySessionRepository,
};
use session_engine::repositories::match_repository::DynamoDbMatchRepository;
use session_engine::repositories::player_repository::DynamoDbPlayerRepository;
use session_engine::repositories::session_repository::DynamoDbSessionRepository;
use session_engine::repositories::websocket_repository::DynamoDbWebSocketRepository;
use session_engine::services::chess_service::ChessRules;
use session_engine::services::game_session_service::Stores;
use session_engine::services::notification_service::{
    LogNotificationSink, NotificationSink, WebSocketNotificationSink,
};
use session_engine::time::SystemTimeSource;
use session_engine::{ConfigError, EngineConfig, GameSessionService, TimeoutWatcher, WatcherHandle};
use tracing::info;

use crate::config::{ServerConfig, StorageBackend};
use crate::middleware::auth::TokenVerifier;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GameSessionService>,
    pub tokens: Arc<TokenVerifier>,
}

/// Everything `main` needs: shared state for the router and the watcher to spawn.
pub struct Engine {
    pub state: AppState,
    pub watcher: TimeoutWatcher,
}

impl Engine {
    fn assemble(
        stores: Stores,
        notifier: Arc<dyn NotificationSink>,
        engine_config: EngineConfig,
        jwt_secret: &str,
    ) -> Self {
        let handle = WatcherHandle::new();
        let service = Arc::new(GameSessionService::new(
            stores,
            Arc::new(ChessRules::new()),
            notifier.clone(),
            Arc::new(SystemTimeSource),
            engine_config,
            handle.clone(),
        ));

        Engine {
            watcher: TimeoutWatcher::new(service.clone(), notifier, handle),
            state: AppState {
                service,
                tokens: Arc::new(TokenVerifier::new(jwt_secret)),
            },
        }
    }

    pub async fn build(
        config: &ServerConfig,
        engine_config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        match config.storage {
            StorageBackend::Memory => Ok(Self::in_memory(config, engine_config)),
            StorageBackend::DynamoDb => Self::dynamodb(config, engine_config).await,
        }
    }

    pub fn in_memory(config: &ServerConfig, engine_config: EngineConfig) -> Self {
        info!("Using in-memory storage");
        let players = Arc::new(InMemoryPlayerRepository::new());
        let stores = Stores {
            sessions: Arc::new(InMemorySessionRepository::new()),
            matches: Arc::new(InMemoryMatchRepository::new(players.clone())),
            players,
        };

        Self::assemble(
            stores,
            Arc::new(LogNotificationSink),
            engine_config,
            &config.jwt_secret,
        )
    }

    async fn dynamodb(
        config: &ServerConfig,
        engine_config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        info!("Using DynamoDB storage");
        let tables = TableNames::from_env()?;
        let aws_config = aws_config::load_from_env().await;
        let client = aws_sdk_dynamodb::Client::new(&aws_config);

        let stores = Stores {
            sessions: Arc::new(DynamoDbSessionRepository::new(
                client.clone(),
                &tables.game_sessions,
                &tables.active_sessions,
            )),
            matches: Arc::new(DynamoDbMatchRepository::new(
                client.clone(),
                &tables.matches,
                &tables.moves,
                &tables.players,
            )),
            players: Arc::new(DynamoDbPlayerRepository::new(client.clone(), &tables.players)),
        };

        let notifier: Arc<dyn NotificationSink> = match &config.websocket_endpoint {
            Some(endpoint) => {
                info!("Pushing notifications through {}", endpoint);
                let api_gateway =
                    DynamoDbWebSocketRepository::api_gateway_client(&aws_config, endpoint);
                Arc::new(WebSocketNotificationSink::new(Arc::new(
                    DynamoDbWebSocketRepository::new(client, api_gateway, &tables.connections),
                )))
            }
            None => Arc::new(LogNotificationSink),
        };

        Ok(Self::assemble(stores, notifier, engine_config, &config.jwt_secret))
    }
}
