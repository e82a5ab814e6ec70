//! Per-trip cached seat availability.
//!
//! A read-through TTL cache over the availability endpoint. It never raises
//! to a caller: a failed refresh serves the stale snapshot, a rate-limited
//! refresh additionally arms the global [`BackoffGate`] so polling across
//! *all* trips quiets down for the window. Concurrent callers for the same
//! trip share one outstanding network call.

use crate::api::{ApiError, AvailabilityPayload, BookingApi};
use crate::config::AvailabilityConfig;
use crate::types::{Gender, SeatId, TripKey};
use chrono::{DateTime, Utc};
use seathold_core::environment::Clock;
use seathold_runtime::backoff::BackoffGate;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// What the client knows about one trip's seat occupancy
///
/// Replaced wholesale on each successful fetch; retained unchanged when a
/// refresh fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvailabilitySnapshot {
    /// Seats still open on the trip
    pub available_count: u32,
    /// Window seats still open, when the layout distinguishes them
    pub window_count: Option<u32>,
    /// Seats booked or held by other shoppers
    pub booked_seats: BTreeSet<SeatId>,
    /// Gender attached to each booked seat
    pub seat_gender_map: HashMap<SeatId, Gender>,
    /// When this snapshot was fetched
    pub fetched_at: DateTime<Utc>,
}

impl AvailabilitySnapshot {
    fn from_payload(payload: AvailabilityPayload, fetched_at: DateTime<Utc>) -> Self {
        Self {
            available_count: payload.available_seats,
            window_count: payload.available_window_seats,
            booked_seats: payload.booked_seats.into_iter().collect(),
            seat_gender_map: payload.seat_gender_map,
            fetched_at,
        }
    }

    /// Whether a seat is already booked or held by someone else
    #[must_use]
    pub fn is_booked(&self, seat: &SeatId) -> bool {
        self.booked_seats.contains(seat)
    }
}

/// Cache slot for one trip
#[derive(Default)]
struct TripCache {
    snapshot: Option<AvailabilitySnapshot>,
    /// Present while a fetch is outstanding; late callers subscribe and read
    /// the refreshed cache when it completes
    in_flight: Option<watch::Receiver<()>>,
}

/// Per-trip cached availability with TTL and in-flight de-duplication
pub struct AvailabilitySnapshotStore {
    api: Arc<dyn BookingApi>,
    clock: Arc<dyn Clock>,
    gate: Arc<BackoffGate>,
    ttl: Duration,
    forced_ttl: Duration,
    backoff_window: Duration,
    inner: Mutex<HashMap<TripKey, TripCache>>,
}

impl AvailabilitySnapshotStore {
    /// Create a store over the given backend
    #[must_use]
    pub fn new(
        api: Arc<dyn BookingApi>,
        clock: Arc<dyn Clock>,
        gate: Arc<BackoffGate>,
        config: &AvailabilityConfig,
    ) -> Self {
        Self {
            api,
            clock,
            gate,
            ttl: config.ttl(),
            forced_ttl: config.forced_ttl(),
            backoff_window: config.backoff_window(),
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Current availability for a trip, refreshing when the cached snapshot
    /// aged out
    ///
    /// `force` shortens the TTL (the shopper's own lock/release must be
    /// reflected quickly) and bypasses the rate-limit gate. Returns `None`
    /// only before the first successful fetch; a failed refresh serves the
    /// stale snapshot instead.
    pub async fn get(&self, trip: &TripKey, force: bool) -> Option<AvailabilitySnapshot> {
        let ttl = if force { self.forced_ttl } else { self.ttl };

        let waiter = {
            let mut inner = self.inner.lock().await;
            let cache = inner.entry(trip.clone()).or_default();
            let now = self.clock.now();

            if let Some(snapshot) = &cache.snapshot {
                let age = now.signed_duration_since(snapshot.fetched_at);
                if age.to_std().is_ok_and(|age| age < ttl) {
                    metrics::counter!("seathold.availability.cache_hits").increment(1);
                    return Some(snapshot.clone());
                }
            }

            if !force && self.gate.is_armed(now) {
                metrics::counter!("seathold.availability.backoff_skips").increment(1);
                tracing::debug!(%trip, "Refresh suppressed by rate-limit backoff");
                return cache.snapshot.clone();
            }

            match &cache.in_flight {
                Some(receiver) => Some(receiver.clone()),
                None => {
                    let (tx, rx) = watch::channel(());
                    cache.in_flight = Some(rx);
                    // Hold the sender outside the lock; dropping it wakes
                    // subscribers even if the fetch panics
                    drop(inner);
                    self.refresh(trip, tx).await;
                    return self.cached(trip).await;
                },
            }
        };

        if let Some(mut receiver) = waiter {
            metrics::counter!("seathold.availability.coalesced").increment(1);
            // Ok: the fetch signalled completion. Err: the sender was
            // dropped. Either way the cache holds the freshest value.
            let _ = receiver.changed().await;
        }

        self.cached(trip).await
    }

    /// Drop snapshots for trips that left the polled set
    pub async fn retain_visible(&self, visible: &[TripKey]) {
        let mut inner = self.inner.lock().await;
        let before = inner.len();
        inner.retain(|trip, _| visible.contains(trip));
        let evicted = before - inner.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted snapshots for trips out of view");
        }
    }

    async fn cached(&self, trip: &TripKey) -> Option<AvailabilitySnapshot> {
        let inner = self.inner.lock().await;
        inner.get(trip).and_then(|cache| cache.snapshot.clone())
    }

    /// Perform one fetch and reconcile the cache slot
    async fn refresh(&self, trip: &TripKey, done: watch::Sender<()>) {
        let result = self.api.fetch_availability(trip).await;
        let now = self.clock.now();

        let mut inner = self.inner.lock().await;
        // The slot can be gone if retain_visible ran while we were fetching;
        // a stale result for an evicted trip is discarded
        let Some(cache) = inner.get_mut(trip) else {
            let _ = done.send(());
            return;
        };
        cache.in_flight = None;

        match result {
            Ok(payload) => {
                metrics::counter!("seathold.availability.refreshes").increment(1);
                cache.snapshot = Some(AvailabilitySnapshot::from_payload(payload, now));
            },
            Err(ApiError::RateLimited) => {
                metrics::counter!("seathold.availability.rate_limited").increment(1);
                tracing::warn!(%trip, "Availability rate limited, arming backoff window");
                self.gate.arm(now, self.backoff_window);
            },
            Err(error) => {
                metrics::counter!("seathold.availability.refresh_failures").increment(1);
                tracing::warn!(%trip, %error, "Availability refresh failed, keeping stale snapshot");
            },
        }

        let _ = done.send(());
    }
}
