use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::models::notification::{GameEvent, Notification};
use crate::services::errors::game_session_service_errors::GameSessionServiceError;
use crate::services::game_session_service::GameSessionService;
use crate::services::notification_service::NotificationSink;

#[derive(Default)]
struct WatcherSignal {
    wake: Notify,
    running: AtomicBool,
}

/// Shared between the service, which wakes the watcher whenever a session is
/// created, and the watcher task itself.
#[derive(Clone, Default)]
pub struct WatcherHandle {
    signal: Arc<WatcherSignal>,
}

impl WatcherHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A wake-up sent while the watcher is busy is kept for its next idle wait.
    pub fn wake(&self) {
        self.signal.wake.notify_one();
    }

    /// Whether the heartbeat is currently ticking.
    pub fn is_running(&self) -> bool {
        self.signal.running.load(Ordering::SeqCst)
    }

    fn set_running(&self, running: bool) {
        self.signal.running.store(running, Ordering::SeqCst);
    }

    async fn idle(&self) {
        self.signal.wake.notified().await;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub finalized: usize,
    pub failed: usize,
}

/// Periodic sweep that ends games whose clock ran out while nobody moved.
///
/// Ticks only while sessions exist. A sweep that lists no session puts the
/// watcher back to sleep until the next `WatcherHandle::wake`.
///
/// Expiry notifications run as their own tasks so a slow push never delays
/// the next session's check.
pub struct TimeoutWatcher {
    service: Arc<GameSessionService>,
    notifier: Arc<dyn NotificationSink>,
    handle: WatcherHandle,
    heartbeat: Duration,
    pushes: JoinSet<()>,
}

impl TimeoutWatcher {
    pub fn new(
        service: Arc<GameSessionService>,
        notifier: Arc<dyn NotificationSink>,
        handle: WatcherHandle,
    ) -> Self {
        let heartbeat = Duration::from_millis(service.config().watcher_heartbeat_ms.max(1));
        TimeoutWatcher {
            service,
            notifier,
            handle,
            heartbeat,
            pushes: JoinSet::new(),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    pub async fn run(mut self) {
        info!("Timeout watcher started, heartbeat {:?}", self.heartbeat);
        loop {
            self.handle.set_running(true);
            self.tick_until_empty().await;
            self.handle.set_running(false);
            self.flush_notifications().await;

            debug!("No active sessions, timeout watcher idle");
            self.handle.idle().await;
        }
    }

    async fn tick_until_empty(&mut self) {
        let mut ticker = interval(self.heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.reap_notifications();
            match self.sweep().await {
                Ok(report) if report.checked == 0 => return,
                Ok(report) => {
                    if report.finalized > 0 || report.failed > 0 {
                        info!(
                            "Sweep checked {} sessions: {} finalized, {} failed",
                            report.checked, report.finalized, report.failed
                        );
                    }
                }
                Err(e) => error!("Failed to list active sessions: {}", e),
            }
        }
    }

    /// Checks every active session once. A failing session is logged and
    /// counted, and never stops the rest of the sweep.
    pub async fn sweep(&mut self) -> Result<SweepReport, GameSessionServiceError> {
        let session_ids = self.service.active_session_ids().await?;
        let mut report = SweepReport::default();

        for session_id in session_ids {
            report.checked += 1;
            match self.service.expire_if_due(&session_id).await {
                Ok(Some(expired)) => {
                    report.finalized += 1;
                    info!(
                        "Session {} expired, winner {:?}",
                        session_id, expired.result.winner
                    );
                    let notification = Notification::new(
                        &expired.session_id,
                        expired.participants,
                        GameEvent::TimeExpired {
                            winner: expired.result.winner,
                            rating_change: expired.result.rating_change,
                        },
                    );
                    let notifier = self.notifier.clone();
                    self.pushes.spawn(async move {
                        notifier.publish(&notification).await;
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    error!("Timeout check failed for session {}: {}", session_id, e);
                }
            }
        }

        Ok(report)
    }

    /// Waits for every expiry notification still in flight.
    pub async fn flush_notifications(&mut self) {
        while let Some(joined) = self.pushes.join_next().await {
            Self::log_failed_push(joined);
        }
    }

    fn reap_notifications(&mut self) {
        while let Some(joined) = self.pushes.try_join_next() {
            Self::log_failed_push(joined);
        }
    }

    fn log_failed_push(joined: Result<(), JoinError>) {
        if let Err(e) = joined {
            error!("Expiry notification task failed: {}", e);
        }
    }
}
