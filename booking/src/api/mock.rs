//! Scriptable in-memory backend for tests.
//!
//! Call counters back the request-coalescing and no-duplicate-acquire
//! properties; outcome scripts drive conflict, degradation, and failure
//! paths without a live server.

use super::{ApiError, AvailabilityPayload, BookingApi, LockResponse, SearchQuery};
use crate::types::{ClientId, SeatId, TripKey, TripSummary};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Test double for the booking backend
///
/// Defaults to a healthy backend: availability answers an open trip, locks
/// are granted, releases succeed. Push scripted outcomes to exercise the
/// unhappy paths.
#[derive(Debug, Default)]
pub struct MockBookingApi {
    availability: Mutex<HashMap<TripKey, AvailabilityPayload>>,
    availability_script: Mutex<VecDeque<Result<AvailabilityPayload, ApiError>>>,
    lock_script: Mutex<VecDeque<Result<LockResponse, ApiError>>>,
    release_script: Mutex<VecDeque<Result<(), ApiError>>>,
    lock_delay: Mutex<Option<Duration>>,
    fetch_delay: Mutex<Option<Duration>>,

    fetch_calls: AtomicUsize,
    lock_calls: AtomicUsize,
    release_calls: AtomicUsize,

    lock_log: Mutex<Vec<(TripKey, Vec<SeatId>)>>,
    release_log: Mutex<Vec<(TripKey, Vec<SeatId>)>>,
}

impl MockBookingApi {
    /// Create a healthy mock backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the availability payload served for a trip
    pub fn set_availability(&self, trip: TripKey, payload: AvailabilityPayload) {
        self.lock_poisoned(&self.availability).insert(trip, payload);
    }

    /// Queue the next availability outcome (consumed once, any trip)
    pub fn push_availability_outcome(&self, outcome: Result<AvailabilityPayload, ApiError>) {
        self.lock_poisoned(&self.availability_script).push_back(outcome);
    }

    /// Queue the next lock outcome (consumed once)
    pub fn push_lock_outcome(&self, outcome: Result<LockResponse, ApiError>) {
        self.lock_poisoned(&self.lock_script).push_back(outcome);
    }

    /// Queue the next release outcome (consumed once)
    pub fn push_release_outcome(&self, outcome: Result<(), ApiError>) {
        self.lock_poisoned(&self.release_script).push_back(outcome);
    }

    /// Delay every lock call, to widen in-flight windows in races
    pub fn set_lock_delay(&self, delay: Duration) {
        *self.lock_poisoned(&self.lock_delay) = Some(delay);
    }

    /// Delay every availability fetch, to widen coalescing windows
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.lock_poisoned(&self.fetch_delay) = Some(delay);
    }

    /// Availability fetches observed
    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Lock calls observed
    pub fn lock_count(&self) -> usize {
        self.lock_calls.load(Ordering::SeqCst)
    }

    /// Release calls observed
    pub fn release_count(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    /// Every lock call with its trip and seats, in order
    pub fn lock_log(&self) -> Vec<(TripKey, Vec<SeatId>)> {
        self.lock_poisoned(&self.lock_log).clone()
    }

    /// Every release call with its trip and seats, in order
    pub fn release_log(&self) -> Vec<(TripKey, Vec<SeatId>)> {
        self.lock_poisoned(&self.release_log).clone()
    }

    /// All seats released so far, flattened
    pub fn released_seats(&self) -> Vec<SeatId> {
        self.lock_poisoned(&self.release_log)
            .iter()
            .flat_map(|(_, seats)| seats.clone())
            .collect()
    }

    #[allow(clippy::unwrap_used)] // Mutex poison is unrecoverable in a test double
    fn lock_poisoned<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap()
    }

    fn default_payload() -> AvailabilityPayload {
        AvailabilityPayload {
            available_seats: 40,
            available_window_seats: Some(12),
            booked_seats: Vec::new(),
            seat_gender_map: HashMap::new(),
        }
    }
}

#[async_trait]
impl BookingApi for MockBookingApi {
    async fn fetch_availability(&self, trip: &TripKey) -> Result<AvailabilityPayload, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.lock_poisoned(&self.fetch_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(outcome) = self.lock_poisoned(&self.availability_script).pop_front() {
            return outcome;
        }

        Ok(self
            .lock_poisoned(&self.availability)
            .get(trip)
            .cloned()
            .unwrap_or_else(Self::default_payload))
    }

    async fn lock_seats(
        &self,
        trip: &TripKey,
        seats: &[SeatId],
        _client_id: ClientId,
    ) -> Result<LockResponse, ApiError> {
        self.lock_calls.fetch_add(1, Ordering::SeqCst);
        self.lock_poisoned(&self.lock_log)
            .push((trip.clone(), seats.to_vec()));

        let delay = *self.lock_poisoned(&self.lock_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.lock_poisoned(&self.lock_script)
            .pop_front()
            .unwrap_or(Ok(LockResponse { ok: true }))
    }

    async fn release_seats(
        &self,
        trip: &TripKey,
        seats: &[SeatId],
        _client_id: ClientId,
    ) -> Result<(), ApiError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        self.lock_poisoned(&self.release_log)
            .push((trip.clone(), seats.to_vec()));

        self.lock_poisoned(&self.release_script)
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn search_trips(&self, _query: &SearchQuery) -> Result<Vec<TripSummary>, ApiError> {
        Ok(Vec::new())
    }
}
