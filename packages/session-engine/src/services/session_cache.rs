use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::models::game_session::Session;
use crate::repositories::errors::session_repository_errors::SessionRepositoryError;
use crate::repositories::session_repository::SessionRepository;

/// Read-through, write-through cache of live sessions for this process.
///
/// The store stays the system of record. Entries are filled on first read,
/// replaced on every successful write, and dropped on finalize or on a
/// failed write.
pub struct SessionCache {
    store: Arc<dyn SessionRepository + Send + Sync>,
    entries: DashMap<String, Session>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn SessionRepository + Send + Sync>) -> Self {
        SessionCache {
            store,
            entries: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionRepository + Send + Sync> {
        &self.store
    }

    pub async fn load(&self, session_id: &str) -> Result<Option<Session>, SessionRepositoryError> {
        if let Some(entry) = self.entries.get(session_id) {
            return Ok(Some(entry.value().clone()));
        }
        self.refresh(session_id).await
    }

    /// Bypass the cached copy and re-read the store.
    pub async fn refresh(
        &self,
        session_id: &str,
    ) -> Result<Option<Session>, SessionRepositoryError> {
        let loaded = self.store.get(session_id).await?;
        match &loaded {
            Some(session) => {
                debug!("Cached session {} at version {}", session_id, session.version);
                self.entries.insert(session_id.to_string(), session.clone());
            }
            None => {
                self.entries.remove(session_id);
            }
        }
        Ok(loaded)
    }

    pub async fn create(&self, session: &Session) -> Result<(), SessionRepositoryError> {
        self.store.create(session).await?;
        self.entries
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    /// Writes `session` if the store still holds its version, returning the
    /// stored copy with the bumped version.
    pub async fn save(&self, session: &Session) -> Result<Session, SessionRepositoryError> {
        match self.store.update(session).await {
            Ok(version) => {
                let mut saved = session.clone();
                saved.version = version;
                self.entries
                    .insert(saved.session_id.clone(), saved.clone());
                Ok(saved)
            }
            Err(e) => {
                self.entries.remove(&session.session_id);
                Err(e)
            }
        }
    }

    pub fn invalidate(&self, session_id: &str) {
        self.entries.remove(session_id);
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.contains_key(session_id)
    }
}
