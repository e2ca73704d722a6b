//! Paced fact delivery task, one per session.
//!
//! The loop delivers a generated fact once per requested interval,
//! compensating the sleep between cycles for however long generation and
//! delivery took, and self-terminates on session expiry or detected
//! silence. Every suspension point is cancellable; cancellation is the
//! normal termination signal, not an error.

use std::sync::{Arc, Weak};
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::channel::{DeliveryChannel, SessionEvent};
use crate::config::TrackerPolicy;
use crate::content;
use crate::generator::FactGenerator;
use crate::models::SessionState;
use crate::tracker::registry::SessionRegistry;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    /// Session lifetime elapsed; user was notified.
    Expired,
    /// Update stream went silent; user was notified.
    Silent,
    /// Cancelled externally (explicit stop or the health monitor).
    Cancelled,
}

/// Builder for a per-session delivery loop.
///
/// Call [`spawn`](Self::spawn) to start the background task.
pub struct DeliveryLoop {
    state: Arc<SessionState>,
    generator: Arc<dyn FactGenerator>,
    channel: Arc<dyn DeliveryChannel>,
    policy: TrackerPolicy,
    cancel: CancellationToken,
    sibling: CancellationToken,
    registry: Weak<SessionRegistry>,
}

impl DeliveryLoop {
    /// Construct a loop over shared session state (does not start it yet).
    ///
    /// `sibling` is the health monitor's cancellation token, fired during
    /// cleanup so both tasks always settle together. The registry is held
    /// weakly: a loop outliving its registry only skips entry removal.
    #[must_use]
    pub fn new(
        state: Arc<SessionState>,
        generator: Arc<dyn FactGenerator>,
        channel: Arc<dyn DeliveryChannel>,
        policy: TrackerPolicy,
        cancel: CancellationToken,
        sibling: CancellationToken,
        registry: Weak<SessionRegistry>,
    ) -> Self {
        Self {
            state,
            generator,
            channel,
            policy,
            cancel,
            sibling,
            registry,
        }
    }

    /// Spawn the delivery task on the given runtime.
    #[must_use]
    pub fn spawn(self, runtime: &Handle) -> JoinHandle<()> {
        let span = info_span!(
            "delivery_loop",
            user_id = %self.state.user_id,
            session_id = %self.state.session_id,
        );
        runtime.spawn(self.run().instrument(span))
    }

    async fn run(self) {
        let reason = self.drive().await;
        self.finish(reason);
    }

    /// Main loop; returns why it stopped. Terminal notifications for
    /// expiry and silence are sent here, before returning.
    async fn drive(&self) -> LoopEnd {
        // Offset the first wait by the expected generation latency so the
        // first delivery lands near the requested cadence rather than one
        // generation-time late.
        let initial_wait = self
            .state
            .delivery_interval
            .saturating_sub(self.policy.latency_estimate)
            .max(self.policy.min_initial_wait);

        tokio::select! {
            () = self.cancel.cancelled() => return LoopEnd::Cancelled,
            () = tokio::time::sleep(initial_wait) => {}
        }

        loop {
            if self.state.is_expired(Instant::now()) {
                self.notify(SessionEvent::Expired).await;
                return LoopEnd::Expired;
            }

            if self.state.last_update_age() > self.policy.silence_threshold {
                self.notify(SessionEvent::SilentStop).await;
                return LoopEnd::Silent;
            }

            let cycle_start = Instant::now();
            tokio::select! {
                () = self.cancel.cancelled() => return LoopEnd::Cancelled,
                () = self.deliver_cycle() => {}
            }

            // Latency compensation: subtract however long the cycle took
            // from the next sleep, with a floor so a fast cycle can never
            // collapse the cadence to near-zero.
            let pacing = self
                .state
                .delivery_interval
                .saturating_sub(cycle_start.elapsed())
                .max(self.policy.floor_sleep);

            tokio::select! {
                () = self.cancel.cancelled() => return LoopEnd::Cancelled,
                () = tokio::time::sleep(pacing) => {}
            }
        }
    }

    /// One delivery attempt. Generation failures and timeouts degrade to a
    /// numbered placeholder; channel failures are logged and swallowed.
    async fn deliver_cycle(&self) {
        let number = self.state.next_fact_number();
        let position = self.state.position();
        let exclusions = self.state.exclusions(self.policy.exclusion_window);

        let generated = tokio::time::timeout(
            self.policy.generation_timeout,
            self.generator.nearby_fact(position, exclusions),
        )
        .await;

        match generated {
            Ok(Ok(draft)) => {
                let parsed = content::parse_fact(&draft.text);
                self.state.push_history(content::history_entry(&parsed));

                let message = content::render_fact(number, &parsed);
                if let Err(err) = self
                    .channel
                    .send_fact(self.state.chat_id, message, draft.images)
                    .await
                {
                    warn!(fact = number, %err, "fact delivery failed");
                } else {
                    info!(fact = number, %position, "fact delivered");
                }

                if let Some(companion) = draft.companion {
                    if let Err(err) = self
                        .channel
                        .send_waypoint(self.state.chat_id, parsed.place.clone(), companion)
                        .await
                    {
                        warn!(fact = number, %err, "waypoint delivery failed");
                    }
                }
            }
            Ok(Err(err)) => {
                warn!(fact = number, %err, "fact generation failed");
                self.deliver_fallback(number).await;
            }
            Err(_) => {
                warn!(
                    fact = number,
                    timeout_secs = self.policy.generation_timeout.as_secs(),
                    "fact generation timed out"
                );
                self.deliver_fallback(number).await;
            }
        }
    }

    /// Send the numbered placeholder so numbering stays contiguous.
    async fn deliver_fallback(&self, number: u32) {
        let message = content::render_fallback(number);
        if let Err(err) = self
            .channel
            .send_fact(self.state.chat_id, message, Vec::new())
            .await
        {
            warn!(fact = number, %err, "placeholder delivery failed");
        }
    }

    /// Best-effort terminal notification.
    async fn notify(&self, event: SessionEvent) {
        if let Err(err) = self.channel.notify(self.state.chat_id, event).await {
            warn!(?event, %err, "terminal notification failed");
        }
    }

    /// Cleanup for every exit path: stop the sibling monitor and remove
    /// this session's registry entry. The explicit stop path has already
    /// removed the entry; removal is idempotent.
    fn finish(&self, reason: LoopEnd) {
        debug!(?reason, "delivery loop finished");
        self.sibling.cancel();
        if let Some(registry) = self.registry.upgrade() {
            registry.retire(self.state.user_id, &self.state);
        }
    }
}
