//! Decoded location-signal routing.
//!
//! The transport that carries location messages is out of scope; this
//! layer consumes signals after decoding and drives the registry. A
//! signal with a live period starts (or restarts) tracking; a plain
//! location from a tracked user is the stop signal; edited-message
//! updates feed the active session's position.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::channel::{DeliveryChannel, SessionEvent};
use crate::models::{ChatId, Position, UserId};
use crate::tracker::SessionRegistry;
use crate::Result;

/// One decoded location message.
#[derive(Debug, Clone, Copy)]
pub struct LocationSignal {
    /// Reporting user.
    pub user_id: UserId,
    /// Destination for session messages.
    pub chat_id: ChatId,
    /// Reported coordinates.
    pub position: Position,
    /// Requested live-tracking duration; absent for one-shot locations.
    pub live_period: Option<Duration>,
}

/// Routes decoded signals into session lifecycle operations.
pub struct SignalRouter {
    registry: Arc<SessionRegistry>,
    channel: Arc<dyn DeliveryChannel>,
    default_interval: Duration,
}

impl SignalRouter {
    /// Create a router over the registry and delivery channel.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        channel: Arc<dyn DeliveryChannel>,
        default_interval: Duration,
    ) -> Self {
        Self {
            registry,
            channel,
            default_interval,
        }
    }

    /// Handle a fresh location message.
    ///
    /// `interval_minutes` is the user's cadence choice; the configured
    /// default applies when absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if session tasks cannot be spawned.
    pub async fn on_location(
        &self,
        signal: LocationSignal,
        interval_minutes: Option<u64>,
    ) -> Result<()> {
        if let Some(live_period) = signal.live_period {
            let interval = interval_minutes
                .map_or(self.default_interval, |m| Duration::from_secs(m * 60));
            self.registry
                .start(
                    signal.user_id,
                    signal.chat_id,
                    signal.position,
                    live_period,
                    interval,
                )
                .await?;
            return Ok(());
        }

        if self.registry.is_tracking(signal.user_id) {
            // A plain location while live tracking is the stop signal.
            info!(user_id = %signal.user_id, "stop signal received");
            self.registry.stop(signal.user_id).await;
            if let Err(err) = self
                .channel
                .notify(signal.chat_id, SessionEvent::Stopped)
                .await
            {
                warn!(%err, "stop confirmation failed");
            }
        } else {
            debug!(user_id = %signal.user_id, "one-shot location ignored");
        }

        Ok(())
    }

    /// Handle an edited-message position update.
    pub fn on_location_update(&self, user_id: UserId, position: Position) {
        self.registry.update_position(user_id, position);
    }
}
