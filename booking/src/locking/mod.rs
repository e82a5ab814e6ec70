//! Optimistic seat locking against the backend inventory.
//!
//! The coordinator owns the network half of a seat tap: the draft reducer
//! mutates its state optimistically and describes an acquire; the
//! coordinator performs it, records success in the cleanup registry, and
//! reports an outcome the reducer uses to confirm, roll back, or degrade
//! the selection.

use crate::api::{ApiError, BookingApi};
use crate::registry::{CleanupRegistry, ReleaseOutbox};
use crate::types::{ClientId, SeatId, SeatLock, TripKey};
use seathold_core::environment::Clock;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Why a lock attempt rolled back
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockFailure {
    /// Another shopper holds the seat
    SeatTaken,
    /// The call never got a usable answer (timeout, 5xx, rate limit)
    Network,
}

/// Result of one acquire attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockOutcome {
    /// The backend granted the hold; it is recorded in the registry
    Acquired,
    /// The attempt failed and the optimistic selection must roll back
    Rejected(LockFailure),
    /// Locking degraded (unauthenticated or malformed call): the selection
    /// stays, no hard reservation exists, the backend re-validates at
    /// booking time
    Skipped,
    /// An acquire for this seat is already in flight; nothing was sent
    AlreadyInFlight,
}

/// Acquires and releases individual seat locks
///
/// Guarded per `(trip, seat)`: a rapid double-tap never produces two
/// concurrent lock requests for the same seat from this client.
pub struct LockCoordinator {
    api: Arc<dyn BookingApi>,
    registry: Arc<CleanupRegistry>,
    outbox: Arc<ReleaseOutbox>,
    clock: Arc<dyn Clock>,
    client_id: ClientId,
    in_flight: Mutex<HashSet<(TripKey, SeatId)>>,
}

impl LockCoordinator {
    /// Create a coordinator for one client session
    #[must_use]
    pub fn new(
        api: Arc<dyn BookingApi>,
        registry: Arc<CleanupRegistry>,
        outbox: Arc<ReleaseOutbox>,
        clock: Arc<dyn Clock>,
        client_id: ClientId,
    ) -> Self {
        Self {
            api,
            registry,
            outbox,
            clock,
            client_id,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// The identity locks are taken under
    #[must_use]
    pub const fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Try to hold one seat
    ///
    /// Exactly one acquire per seat can be outstanding; a concurrent
    /// duplicate returns [`LockOutcome::AlreadyInFlight`] without touching
    /// the network.
    pub async fn acquire(&self, trip: &TripKey, seat: &SeatId) -> LockOutcome {
        if !self.mark_in_flight(trip, seat) {
            metrics::counter!("seathold.locks.deduplicated").increment(1);
            tracing::debug!(%trip, %seat, "Acquire already in flight, not re-sent");
            return LockOutcome::AlreadyInFlight;
        }

        let result = self
            .api
            .lock_seats(trip, std::slice::from_ref(seat), self.client_id)
            .await;

        self.clear_in_flight(trip, seat);

        match result {
            Ok(response) if response.ok => {
                metrics::counter!("seathold.locks.acquired").increment(1);
                tracing::debug!(%trip, %seat, "Seat lock acquired");

                let lock = SeatLock {
                    trip: trip.clone(),
                    seat: seat.clone(),
                    client_id: self.client_id,
                    acquired_at: self.clock.now(),
                };
                if let Err(error) = self.registry.add(lock).await {
                    tracing::warn!(%error, "Acquired lock could not be persisted to the registry");
                }

                LockOutcome::Acquired
            },
            Ok(_) => {
                metrics::counter!("seathold.locks.conflicts").increment(1);
                tracing::info!(%trip, %seat, "Seat just taken by another shopper");
                LockOutcome::Rejected(LockFailure::SeatTaken)
            },
            Err(error) if error.degrades_lock_to_skip() => {
                metrics::counter!("seathold.locks.skipped").increment(1);
                tracing::info!(%trip, %seat, %error, "Lock skipped, selection proceeds unlocked");
                LockOutcome::Skipped
            },
            Err(error) => {
                metrics::counter!("seathold.locks.failed").increment(1);
                tracing::warn!(%trip, %seat, %error, "Lock call failed, rolling selection back");
                LockOutcome::Rejected(LockFailure::Network)
            },
        }
    }

    /// Release held seats, best-effort
    ///
    /// The registry entry goes away immediately (local state is
    /// authoritative for the UI); the backend call is queued and delivered
    /// through the outbox. Releasing a seat that was never locked is a
    /// no-op on the backend and therefore safe to send.
    pub async fn release(&self, trip: &TripKey, seats: Vec<SeatId>) {
        if seats.is_empty() {
            return;
        }

        metrics::counter!("seathold.locks.released").increment(seats.len() as u64);

        if let Err(error) = self.registry.remove(trip, &seats).await {
            tracing::warn!(%error, "Registry removal failed during release");
        }

        self.outbox
            .submit(trip.clone(), seats, self.client_id)
            .await;
    }

    /// Insert the in-flight marker; false when already present
    #[allow(clippy::unwrap_used)] // Mutex poison is unrecoverable
    fn mark_in_flight(&self, trip: &TripKey, seat: &SeatId) -> bool {
        self.in_flight
            .lock()
            .unwrap()
            .insert((trip.clone(), seat.clone()))
    }

    #[allow(clippy::unwrap_used)] // Mutex poison is unrecoverable
    fn clear_in_flight(&self, trip: &TripKey, seat: &SeatId) {
        self.in_flight.lock().unwrap().remove(&(trip.clone(), seat.clone()));
    }
}
