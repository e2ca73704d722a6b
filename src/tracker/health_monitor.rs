//! Per-session liveness poll, sibling to the delivery loop.
//!
//! The monitor exists because the delivery cadence can be as long as an
//! hour: it polls on a fixed short period so a user who silently stops
//! sharing is detected within one poll period, not one delivery cycle.

use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::channel::{DeliveryChannel, SessionEvent};
use crate::config::TrackerPolicy;
use crate::models::SessionState;

/// Builder for a per-session health monitor.
///
/// Call [`spawn`](Self::spawn) to start the background task.
pub struct HealthMonitor {
    state: Arc<SessionState>,
    channel: Arc<dyn DeliveryChannel>,
    policy: TrackerPolicy,
    cancel: CancellationToken,
    sibling: CancellationToken,
}

impl HealthMonitor {
    /// Construct a monitor over shared session state (does not start it).
    ///
    /// `sibling` is the delivery loop's cancellation token, fired when
    /// silence is detected.
    #[must_use]
    pub fn new(
        state: Arc<SessionState>,
        channel: Arc<dyn DeliveryChannel>,
        policy: TrackerPolicy,
        cancel: CancellationToken,
        sibling: CancellationToken,
    ) -> Self {
        Self {
            state,
            channel,
            policy,
            cancel,
            sibling,
        }
    }

    /// Spawn the monitor task on the given runtime.
    #[must_use]
    pub fn spawn(self, runtime: &Handle) -> JoinHandle<()> {
        let span = info_span!(
            "health_monitor",
            user_id = %self.state.user_id,
            session_id = %self.state.session_id,
        );
        runtime.spawn(self.run().instrument(span))
    }

    async fn run(self) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("health monitor cancelled");
                    return;
                }
                () = tokio::time::sleep(self.policy.health_poll) => {}
            }

            if self.state.is_expired(Instant::now()) {
                // The delivery loop owns the expiry notification.
                debug!("session expired, monitor standing down");
                return;
            }

            let idle = self.state.last_update_age();
            if idle > self.policy.silence_threshold {
                info!(
                    idle_secs = idle.as_secs(),
                    "position updates went silent, ending session"
                );
                if let Err(err) = self
                    .channel
                    .notify(self.state.chat_id, SessionEvent::SilentStop)
                    .await
                {
                    warn!(%err, "silent-stop notification failed");
                }
                self.sibling.cancel();
                return;
            }
        }
    }
}
