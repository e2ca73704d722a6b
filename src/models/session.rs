//! Shared state for one user's active tracking session.
//!
//! A `SessionState` is owned by its registry entry and shared by `Arc`
//! with the session's two background tasks. Mutation follows a
//! single-writer-per-field convention: the update-position path owns the
//! track point, the delivery loop owns the fact counter and history.
//! Cross-task reads are best-effort snapshots; staleness is tolerated up
//! to the silence-detection threshold.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::position::{ChatId, Position, UserId};

/// Latest reported position and when it was reported.
#[derive(Debug, Clone, Copy)]
struct TrackPoint {
    position: Position,
    updated_at: Instant,
}

/// Mutable record for one active session.
#[derive(Debug)]
pub struct SessionState {
    /// Correlation identifier for logs; unique per session instance.
    pub session_id: Uuid,
    /// Tracked user; immutable for the session's lifetime.
    pub user_id: UserId,
    /// Delivery destination; immutable for the session's lifetime.
    pub chat_id: ChatId,
    /// Human-facing creation timestamp.
    pub started_at: DateTime<Utc>,
    /// Creation instant for expiry arithmetic.
    pub started: Instant,
    /// Requested session lifetime.
    pub tracking_duration: Duration,
    /// Requested cadence between fact deliveries.
    pub delivery_interval: Duration,
    track: Mutex<TrackPoint>,
    fact_count: AtomicU32,
    fact_history: Mutex<Vec<String>>,
    history_cap: usize,
}

impl SessionState {
    /// Create session state starting now at the given position.
    #[must_use]
    pub fn new(
        user_id: UserId,
        chat_id: ChatId,
        position: Position,
        tracking_duration: Duration,
        delivery_interval: Duration,
        history_cap: usize,
    ) -> Self {
        let now = Instant::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            chat_id,
            started_at: Utc::now(),
            started: now,
            tracking_duration,
            delivery_interval,
            track: Mutex::new(TrackPoint {
                position,
                updated_at: now,
            }),
            fact_count: AtomicU32::new(0),
            fact_history: Mutex::new(Vec::new()),
            history_cap,
        }
    }

    /// Absolute instant at which the session expires.
    #[must_use]
    pub fn expiry_deadline(&self) -> Instant {
        self.started + self.tracking_duration
    }

    /// Whether the session has reached its requested lifetime.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expiry_deadline()
    }

    /// Latest reported position.
    #[must_use]
    pub fn position(&self) -> Position {
        self.track.lock().unwrap_or_else(PoisonError::into_inner).position
    }

    /// Time since the most recent position update.
    #[must_use]
    pub fn last_update_age(&self) -> Duration {
        self.track
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .updated_at
            .elapsed()
    }

    /// Record a new position report. Single writer: the update path.
    pub fn record_position(&self, position: Position) {
        let mut track = self.track.lock().unwrap_or_else(PoisonError::into_inner);
        track.position = position;
        track.updated_at = Instant::now();
    }

    /// Take the next 1-based fact number. Called exactly once per delivery
    /// attempt, successful or failed, so user-visible numbering never gaps.
    #[must_use]
    pub fn next_fact_number(&self) -> u32 {
        self.fact_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Facts attempted so far.
    #[must_use]
    pub fn fact_count(&self) -> u32 {
        self.fact_count.load(Ordering::SeqCst)
    }

    /// Append a delivered fact to the history, trimming the oldest entries
    /// beyond the cap. Single writer: the delivery loop.
    pub fn push_history(&self, entry: String) {
        let mut history = self
            .fact_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        history.push(entry);
        if history.len() > self.history_cap {
            let excess = history.len() - self.history_cap;
            history.drain(..excess);
        }
    }

    /// Most recent history entries, oldest first, at most `window` long.
    #[must_use]
    pub fn exclusions(&self, window: usize) -> Vec<String> {
        let history = self
            .fact_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let skip = history.len().saturating_sub(window);
        history[skip..].to_vec()
    }

    /// Number of retained history entries.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.fact_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Point-in-time view for status queries.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            user_id: self.user_id,
            chat_id: self.chat_id,
            started_at: self.started_at,
            tracking_duration_seconds: self.tracking_duration.as_secs(),
            delivery_interval_seconds: self.delivery_interval.as_secs(),
            position: self.position(),
            fact_count: self.fact_count(),
            history_len: self.history_len(),
        }
    }
}

/// Serializable point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Correlation identifier of the session instance.
    pub session_id: Uuid,
    /// Tracked user.
    pub user_id: UserId,
    /// Delivery destination.
    pub chat_id: ChatId,
    /// Creation timestamp.
    pub started_at: DateTime<Utc>,
    /// Requested session lifetime.
    pub tracking_duration_seconds: u64,
    /// Requested delivery cadence.
    pub delivery_interval_seconds: u64,
    /// Latest reported position.
    pub position: Position,
    /// Facts attempted so far.
    pub fact_count: u32,
    /// Retained history entries.
    pub history_len: usize,
}
