//! At-least-once delivery of release calls.
//!
//! A drain clears the registry unconditionally, so the release calls it
//! issues must not be lost when the process dies mid-drain. Commands are
//! queued durably in the registry document before delivery is attempted;
//! only an acknowledged delivery removes them. `flush_pending` runs at
//! session startup and retries what a previous session left behind.

use super::{CleanupRegistry, ReleaseCommand};
use crate::api::{ApiError, BookingApi};
use crate::types::{ClientId, SeatId, TripKey};
use futures::future::join_all;
use seathold_runtime::RetryPolicy;
use std::sync::Arc;

/// Best-effort deliverer of queued release commands
pub struct ReleaseOutbox {
    api: Arc<dyn BookingApi>,
    registry: Arc<CleanupRegistry>,
    retry: RetryPolicy,
}

impl ReleaseOutbox {
    /// Create an outbox delivering through the given backend
    #[must_use]
    pub fn new(api: Arc<dyn BookingApi>, registry: Arc<CleanupRegistry>) -> Self {
        Self {
            api,
            registry,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the redelivery policy (tests use a fast one)
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Queue a release and attempt delivery immediately
    ///
    /// The seats must already be gone from the held set; this only handles
    /// getting the backend told. Failures are logged, never surfaced.
    pub async fn submit(&self, trip: TripKey, seats: Vec<SeatId>, client_id: ClientId) {
        if seats.is_empty() {
            return;
        }

        match self.registry.enqueue_release(trip, seats, client_id).await {
            Ok(command) => {
                self.deliver_one(&command).await;
            },
            Err(error) => {
                tracing::warn!(%error, "Could not queue release; attempting nothing");
            },
        }
    }

    /// Attempt every command once, concurrently, regardless of individual
    /// failures
    pub async fn deliver(&self, commands: &[ReleaseCommand]) {
        join_all(commands.iter().map(|command| self.deliver_one(command))).await;
    }

    /// Redeliver whatever a previous session (or a failed drain) left
    /// queued, with backoff between rounds
    pub async fn flush_pending(&self) {
        let mut attempt = 0;

        loop {
            let pending = self.registry.pending_releases().await;
            if pending.is_empty() {
                return;
            }

            tracing::info!(
                queued = pending.len(),
                attempt,
                "Flushing undelivered release calls"
            );
            self.deliver(&pending).await;

            if self.registry.pending_releases().await.is_empty() {
                return;
            }

            if !self.retry.should_retry(attempt + 1) {
                let remaining = self.registry.pending_releases().await.len();
                tracing::warn!(
                    remaining,
                    "Release flush gave up; commands stay queued for the next session"
                );
                return;
            }

            tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }

    /// Deliver one command; returns whether it was acknowledged
    async fn deliver_one(&self, command: &ReleaseCommand) -> bool {
        let result = self
            .api
            .release_seats(&command.trip, &command.seats, command.client_id)
            .await;

        let delivered = match result {
            Ok(()) => true,
            // The server heard us; releasing a lock we cannot authorize for
            // will be resolved by its own expiry
            Err(error @ (ApiError::Unauthorized | ApiError::BadRequest(_))) => {
                tracing::warn!(trip = %command.trip, %error, "Release rejected, not retrying");
                true
            },
            Err(error) => {
                tracing::warn!(trip = %command.trip, %error, "Release delivery failed, kept queued");
                metrics::counter!("seathold.outbox.delivery_failures").increment(1);
                false
            },
        };

        if delivered {
            metrics::counter!("seathold.outbox.delivered").increment(1);
            if let Err(error) = self.registry.mark_delivered(command.id).await {
                tracing::warn!(%error, "Delivered release could not be acknowledged");
            }
        }

        delivered
    }
}
