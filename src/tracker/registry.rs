//! Session registry: the single source of truth for tracked users.
//!
//! The registry is the only component that structurally adds or removes
//! session entries. Structural sequences (`start`, `stop`, `shutdown_all`)
//! are serialized by an async lifecycle gate that background tasks never
//! take, so settling a task's cancellation under the gate cannot deadlock.
//! The entry map itself sits behind a brief synchronous lock that is never
//! held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::DeliveryChannel;
use crate::config::TrackerPolicy;
use crate::generator::FactGenerator;
use crate::models::{ChatId, Position, SessionSnapshot, SessionState, UserId};
use crate::tracker::delivery_loop::DeliveryLoop;
use crate::tracker::health_monitor::HealthMonitor;
use crate::{AppError, Result};

/// One registered session: shared state plus the task pair and their
/// cancellation tokens.
struct SessionEntry {
    state: Arc<SessionState>,
    delivery_cancel: CancellationToken,
    monitor_cancel: CancellationToken,
    delivery_task: JoinHandle<()>,
    monitor_task: JoinHandle<()>,
}

impl SessionEntry {
    /// Cancel both tasks and await their settlement. The expected
    /// cancellation outcome is swallowed; a task panic is logged.
    async fn shutdown(self) {
        self.delivery_cancel.cancel();
        self.monitor_cancel.cancel();

        for (name, task) in [
            ("delivery_loop", self.delivery_task),
            ("health_monitor", self.monitor_task),
        ] {
            if let Err(err) = task.await {
                if err.is_panic() {
                    warn!(
                        session_id = %self.state.session_id,
                        task = name,
                        %err,
                        "session task panicked before settling"
                    );
                }
            }
        }
    }
}

/// Exclusive-access map from user to active session, with lifecycle
/// operations that spawn and settle the per-session task pair.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<UserId, SessionEntry>>,
    /// Serializes structural sequences; never taken by background tasks.
    lifecycle: tokio::sync::Mutex<()>,
    generator: Arc<dyn FactGenerator>,
    channel: Arc<dyn DeliveryChannel>,
    policy: TrackerPolicy,
}

impl SessionRegistry {
    /// Create a registry over the given collaborators and policy.
    #[must_use]
    pub fn new(
        generator: Arc<dyn FactGenerator>,
        channel: Arc<dyn DeliveryChannel>,
        policy: TrackerPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            lifecycle: tokio::sync::Mutex::new(()),
            generator,
            channel,
            policy,
        })
    }

    /// Start tracking a user, replacing any existing session.
    ///
    /// An existing session for the user is fully settled (both tasks
    /// cancelled and awaited) before the new task pair is spawned, so no
    /// two deliveries are ever in flight for the same destination.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if background tasks cannot be spawned
    /// (the runtime is shutting down). No partial registration survives.
    pub async fn start(
        self: &Arc<Self>,
        user_id: UserId,
        chat_id: ChatId,
        position: Position,
        tracking_duration: Duration,
        delivery_interval: Duration,
    ) -> Result<()> {
        let _gate = self.lifecycle.lock().await;

        // Settle any previous session before spawning its replacement.
        if let Some(old) = self.take_entry(user_id) {
            debug!(%user_id, session_id = %old.state.session_id, "replacing existing session");
            old.shutdown().await;
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| AppError::Spawn(format!("no runtime for session tasks: {err}")))?;

        let state = Arc::new(SessionState::new(
            user_id,
            chat_id,
            position,
            tracking_duration,
            delivery_interval,
            self.policy.history_cap,
        ));

        let delivery_cancel = CancellationToken::new();
        let monitor_cancel = CancellationToken::new();

        let delivery_task = DeliveryLoop::new(
            Arc::clone(&state),
            Arc::clone(&self.generator),
            Arc::clone(&self.channel),
            self.policy.clone(),
            delivery_cancel.clone(),
            monitor_cancel.clone(),
            Arc::downgrade(self),
        )
        .spawn(&runtime);

        let monitor_task = HealthMonitor::new(
            Arc::clone(&state),
            Arc::clone(&self.channel),
            self.policy.clone(),
            monitor_cancel.clone(),
            delivery_cancel.clone(),
        )
        .spawn(&runtime);

        info!(
            %user_id,
            %chat_id,
            session_id = %state.session_id,
            tracking_secs = tracking_duration.as_secs(),
            interval_secs = delivery_interval.as_secs(),
            "session started"
        );

        self.lock_sessions().insert(
            user_id,
            SessionEntry {
                state,
                delivery_cancel,
                monitor_cancel,
                delivery_task,
                monitor_task,
            },
        );

        Ok(())
    }

    /// Record a position report for an active session.
    ///
    /// Silently drops the update when the user is not tracked; late
    /// reports after a stop are expected.
    pub fn update_position(&self, user_id: UserId, position: Position) {
        let sessions = self.lock_sessions();
        if let Some(entry) = sessions.get(&user_id) {
            entry.state.record_position(position);
            debug!(%user_id, %position, "position updated");
        }
    }

    /// Stop tracking a user and settle both session tasks.
    ///
    /// No-op when the user is not tracked. Sends no notification; the
    /// caller owns any explicit-stop confirmation.
    pub async fn stop(&self, user_id: UserId) {
        let _gate = self.lifecycle.lock().await;

        if let Some(entry) = self.take_entry(user_id) {
            let session_id = entry.state.session_id;
            entry.shutdown().await;
            info!(%user_id, %session_id, "session stopped");
        }
    }

    /// Whether a user currently has an active session.
    #[must_use]
    pub fn is_tracking(&self, user_id: UserId) -> bool {
        self.lock_sessions().contains_key(&user_id)
    }

    /// Number of active sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock_sessions().len()
    }

    /// Point-in-time view of a user's session, if any.
    #[must_use]
    pub fn snapshot(&self, user_id: UserId) -> Option<SessionSnapshot> {
        self.lock_sessions()
            .get(&user_id)
            .map(|entry| entry.state.snapshot())
    }

    /// Settle every active session. Used for graceful process shutdown.
    pub async fn shutdown_all(&self) {
        let _gate = self.lifecycle.lock().await;

        let entries: Vec<SessionEntry> = {
            let mut sessions = self.lock_sessions();
            sessions.drain().map(|(_, entry)| entry).collect()
        };

        let count = entries.len();
        for entry in entries {
            entry.shutdown().await;
        }
        if count > 0 {
            info!(count, "all sessions settled");
        }
    }

    /// Remove a session entry after its delivery loop terminated on its
    /// own, cancelling the sibling monitor.
    ///
    /// Guarded by pointer equality on the state so a finishing loop can
    /// never evict a replacement session started for the same user.
    /// Idempotent: the entry may already be gone when the explicit stop
    /// path settled it first.
    pub(crate) fn retire(&self, user_id: UserId, state: &Arc<SessionState>) {
        let mut sessions = self.lock_sessions();
        let matches = sessions
            .get(&user_id)
            .is_some_and(|entry| Arc::ptr_eq(&entry.state, state));
        if matches {
            if let Some(entry) = sessions.remove(&user_id) {
                entry.delivery_cancel.cancel();
                entry.monitor_cancel.cancel();
                debug!(%user_id, session_id = %state.session_id, "session retired");
            }
        }
    }

    fn take_entry(&self, user_id: UserId) -> Option<SessionEntry> {
        self.lock_sessions().remove(&user_id)
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
