use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};
use tracing::{debug, warn};

use crate::models::game_session::Session;
use crate::repositories::errors::session_repository_errors::SessionRepositoryError;

#[cfg(test)]
use mockall::automock;

/// Ephemeral store of live sessions plus the user → session index.
///
/// Every call is a single read or write of a whole record; no partial field
/// update is ever observable.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Stores a brand new session. Fails if the id is already taken.
    async fn create(&self, session: &Session) -> Result<(), SessionRepositoryError>;

    /// Unparseable records are logged and reported as absent.
    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionRepositoryError>;

    /// Replaces the stored session if its version still equals
    /// `session.version` and returns the bumped version.
    async fn update(&self, session: &Session) -> Result<u64, SessionRepositoryError>;

    async fn remove(&self, session_id: &str) -> Result<(), SessionRepositoryError>;

    async fn list_active_session_ids(&self) -> Result<Vec<String>, SessionRepositoryError>;

    /// Fails `AlreadyExists` when the user is already indexed.
    async fn set_active(&self, user_id: &str, session_id: &str)
        -> Result<(), SessionRepositoryError>;

    async fn get_active_session_id(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, SessionRepositoryError>;

    /// Drops the index entries of `user_ids` that still point at
    /// `session_id`. Entries pointing elsewhere are left alone.
    async fn clear_active(
        &self,
        session_id: &str,
        user_ids: &[String],
    ) -> Result<(), SessionRepositoryError>;
}

pub struct DynamoDbSessionRepository {
    pub client: Client,
    pub sessions_table: String,
    pub active_table: String,
}

impl DynamoDbSessionRepository {
    pub fn new(client: Client, sessions_table: &str, active_table: &str) -> Self {
        Self {
            client,
            sessions_table: sessions_table.to_string(),
            active_table: active_table.to_string(),
        }
    }

    fn session_key(session_id: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([(
            "session_id".to_string(),
            AttributeValue::S(session_id.to_string()),
        )])
    }
}

#[async_trait]
impl SessionRepository for DynamoDbSessionRepository {
    async fn create(&self, session: &Session) -> Result<(), SessionRepositoryError> {
        let item = to_item(session)
            .map_err(|e| SessionRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.sessions_table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(session_id)")
            .send()
            .await
            .map_err(|e| SessionRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionRepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.sessions_table)
            .set_key(Some(Self::session_key(session_id)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| SessionRepositoryError::DynamoDb(e.to_string()))?;

        let Some(item) = result.item else {
            return Ok(None);
        };

        let parsed: Result<Session, _> = from_item(item);
        match parsed {
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
        let expected = session.version;
        let mut next = session.clone();
        next.version = expected + 1;

        let item =
            to_item(&next).map_err(|e| SessionRepositoryError::Serialization(e.to_string()))?;

        let result = self
            .client
            .put_item()
            .table_name(&self.sessions_table)
            .set_item(Some(item))
            .condition_expression("attribute_exists(session_id) AND version = :expected")
            .expression_attribute_values(":expected", AttributeValue::N(expected.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(next.version),
            Err(e) => {
                let conflict = e
                    .as_service_error()
                    .map_or(false, |se| se.is_conditional_check_failed_exception());
                if conflict {
                    Err(SessionRepositoryError::VersionConflict(
                        session.session_id.clone(),
                    ))
                } else {
                    Err(SessionRepositoryError::DynamoDb(e.to_string()))
                }
            }
        }
    }

    async fn remove(&self, session_id: &str) -> Result<(), SessionRepositoryError> {
        self.client
            .delete_item()
            .table_name(&self.sessions_table)
            .set_key(Some(Self::session_key(session_id)))
            .send()
            .await
            .map_err(|e| SessionRepositoryError::DynamoDb(e.to_string()))?;

        debug!("Removed session {}", session_id);
        Ok(())
    }

    async fn list_active_session_ids(&self) -> Result<Vec<String>, SessionRepositoryError> {
        let mut session_ids = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.sessions_table)
                .projection_expression("session_id")
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| SessionRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                if let Some(AttributeValue::S(session_id)) = item.get("session_id") {
                    session_ids.push(session_id.clone());
                }
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(session_ids)
    }

    async fn set_active(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<(), SessionRepositoryError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.active_table)
            .item("user_id", AttributeValue::S(user_id.to_string()))
            .item("session_id", AttributeValue::S(session_id.to_string()))
            .condition_expression("attribute_not_exists(user_id)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let taken = e
                    .as_service_error()
                    .map_or(false, |se| se.is_conditional_check_failed_exception());
                if taken {
                    Err(SessionRepositoryError::AlreadyExists(user_id.to_string()))
                } else {
                    Err(SessionRepositoryError::DynamoDb(e.to_string()))
                }
            }
        }
    }

    async fn get_active_session_id(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, SessionRepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.active_table)
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| SessionRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = result.item {
            if let Some(AttributeValue::S(session_id)) = item.get("session_id") {
                return Ok(Some(session_id.clone()));
            }
        }

        Ok(None)
    }

    async fn clear_active(
        &self,
        session_id: &str,
        user_ids: &[String],
    ) -> Result<(), SessionRepositoryError> {
        for user_id in user_ids {
            let result = self
                .client
                .delete_item()
                .table_name(&self.active_table)
                .key("user_id", AttributeValue::S(user_id.clone()))
                .condition_expression("session_id = :session_id")
                .expression_attribute_values(
                    ":session_id",
                    AttributeValue::S(session_id.to_string()),
                )
                .send()
                .await;

            match result {
                Ok(_) => debug!("Cleared active session {} for user {}", session_id, user_id),
                Err(e) => {
                    let elsewhere = e
                        .as_service_error()
                        .map_or(false, |se| se.is_conditional_check_failed_exception());
                    if !elsewhere {
                        return Err(SessionRepositoryError::DynamoDb(e.to_string()));
                    }
                    debug!(
                        "User {} is not indexed against session {}",
                        user_id, session_id
                    );
                }
            }
        }

        Ok(())
    }
}
