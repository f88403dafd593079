use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::models::notification::Notification;
use crate::repositories::websocket_repository::WebSocketRepository;

/// Best-effort push channel. Delivery failures are logged here and never
/// reach the caller.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, notification: &Notification);
}

/// Pushes events to every connected recipient through API Gateway.
pub struct WebSocketNotificationSink {
    repository: Arc<dyn WebSocketRepository>,
}

impl WebSocketNotificationSink {
    pub fn new(repository: Arc<dyn WebSocketRepository>) -> Self {
        Self { repository }
    }

    async fn send_to(&self, player_id: &str, room: &str, message: &str) {
        let connection_id = match self.repository.get_connection_id(player_id).await {
            Ok(Some(connection_id)) => connection_id,
            Ok(None) => {
                info!(
                    "Player {} is not connected, skipping notification for session {}",
                    player_id, room
                );
                return;
            }
            Err(e) => {
                error!(
                    "Failed to look up connection for player {}: {}",
                    player_id, e
                );
                return;
            }
        };

        if let Err(e) = self.repository.send_message(&connection_id, message).await {
            error!(
                "Failed to notify player {} on connection {} for session {}: {}",
                player_id, connection_id, room, e
            );
        }
    }
}

#[async_trait]
impl NotificationSink for WebSocketNotificationSink {
    async fn publish(&self, notification: &Notification) {
        let message = match notification.payload() {
            Ok(message) => message,
            Err(e) => {
                error!(
                    "Failed to serialize notification for session {}: {}",
                    notification.room, e
                );
                return;
            }
        };

        for player_id in &notification.recipients {
            self.send_to(player_id, &notification.room, &message).await;
        }
    }
}

/// Writes events to the log. Used when no push endpoint is configured.
#[derive(Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn publish(&self, notification: &Notification) {
        match notification.payload() {
            Ok(message) => info!(
                "Session {} event for {:?}: {}",
                notification.room, notification.recipients, message
            ),
            Err(e) => warn!(
                "Unserializable event for session {}: {}",
                notification.room, e
            ),
        }
    }
}

/// Sink that takes `delay` to deliver each event, for exercising slow pushes.
#[cfg(test)]
pub struct SlowNotificationSink {
    delay: std::time::Duration,
    delivered: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl SlowNotificationSink {
    pub fn new(delay: std::time::Duration) -> Self {
        Self {
            delay,
            delivered: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl NotificationSink for SlowNotificationSink {
    async fn publish(&self, _notification: &Notification) {
        tokio::time::sleep(self.delay).await;
        self.delivered
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}
