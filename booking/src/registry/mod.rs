//! Durable bookkeeping of the soft locks this client currently owns.
//!
//! The registry exists for exactly one reason: to guarantee that every lock
//! is released on every exit path — trip switch, modify-search, navigation
//! away, logout, another tab clearing the auth token. It is the one piece of
//! state shared across the whole session; only the lock coordinator and the
//! session's lifecycle paths mutate it.
//!
//! Draining converts held locks into queued [`ReleaseCommand`]s and clears
//! the held set unconditionally — the UI is never left believing a seat is
//! still held. Delivery of the queued commands is the outbox's job
//! ([`outbox::ReleaseOutbox`]), which retries transport failures, giving
//! at-least-once release semantics even across a crashed drain.

use crate::types::{ClientId, SeatId, SeatLock, TripKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub mod outbox;
pub mod store;

pub use outbox::ReleaseOutbox;
pub use store::{InMemoryRegistryStore, JsonFileRegistryStore, RegistryStore};

/// Errors from registry persistence
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Backing storage could not be read or written
    #[error("Registry I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted document could not be serialized
    #[error("Registry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Grouped view of held locks: one row per `(trip, client)` pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Trip the locks belong to
    pub trip: TripKey,
    /// Held seats on that trip
    pub seats: BTreeSet<SeatId>,
    /// Identity the locks were taken under
    pub client_id: ClientId,
}

/// One queued release delivery
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCommand {
    /// Stable id for delivery acknowledgement
    pub id: Uuid,
    /// Trip to release on
    pub trip: TripKey,
    /// Seats the call covers
    pub seats: Vec<SeatId>,
    /// Identity the locks were taken under
    pub client_id: ClientId,
}

/// The persisted document: held locks plus undelivered releases
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDocument {
    /// Locks this client believes it holds
    pub held: Vec<SeatLock>,
    /// Release commands awaiting delivery
    pub outbox: Vec<ReleaseCommand>,
}

/// Durable record of all locks currently held by this client instance
///
/// Every mutation persists through the injected [`RegistryStore`]. A
/// persistence failure is logged and surfaced, but callers on the lock path
/// treat it as non-fatal — the in-memory record keeps the UI consistent and
/// the backend remains the final arbiter at booking time.
pub struct CleanupRegistry {
    store: Arc<dyn RegistryStore>,
    inner: tokio::sync::Mutex<RegistryDocument>,
}

impl CleanupRegistry {
    /// Load the registry from its store
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the store cannot be read.
    pub fn load(store: Arc<dyn RegistryStore>) -> Result<Self, RegistryError> {
        let document = store.load()?;
        if !document.held.is_empty() || !document.outbox.is_empty() {
            tracing::info!(
                held = document.held.len(),
                queued_releases = document.outbox.len(),
                "Registry restored from a previous session"
            );
        }

        Ok(Self {
            store,
            inner: tokio::sync::Mutex::new(document),
        })
    }

    /// Record a confirmed lock
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when persisting fails; the in-memory
    /// record is updated regardless.
    pub async fn add(&self, lock: SeatLock) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().await;
        let duplicate = inner
            .held
            .iter()
            .any(|held| held.trip == lock.trip && held.seat == lock.seat);
        if !duplicate {
            inner.held.push(lock);
        }
        metrics::gauge!("seathold.registry.held").set(to_f64(inner.held.len()));
        self.persist(&inner)
    }

    /// Forget held locks without queueing releases
    ///
    /// The optimistic half of a release: the local record clears
    /// immediately, before the backend call is even attempted.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when persisting fails.
    pub async fn remove(&self, trip: &TripKey, seats: &[SeatId]) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().await;
        inner
            .held
            .retain(|lock| !(lock.trip == *trip && seats.contains(&lock.seat)));
        metrics::gauge!("seathold.registry.held").set(to_f64(inner.held.len()));
        self.persist(&inner)
    }

    /// Seats currently recorded as held on one trip
    pub async fn seats_for(&self, trip: &TripKey) -> BTreeSet<SeatId> {
        let inner = self.inner.lock().await;
        inner
            .held
            .iter()
            .filter(|lock| lock.trip == *trip)
            .map(|lock| lock.seat.clone())
            .collect()
    }

    /// Grouped view of everything held
    pub async fn entries(&self) -> Vec<RegistryEntry> {
        let inner = self.inner.lock().await;
        Self::group(&inner.held)
    }

    /// Whether nothing is held and nothing awaits delivery
    pub async fn is_empty(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.held.is_empty() && inner.outbox.is_empty()
    }

    /// Drop one trip's locks without queueing releases
    ///
    /// Used at checkout handoff: the locks are deliberately left held on
    /// the backend, and no later drain may touch them.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when persisting fails.
    pub async fn detach_trip(&self, trip: &TripKey) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().await;
        let before = inner.held.len();
        inner.held.retain(|lock| lock.trip != *trip);
        tracing::debug!(
            %trip,
            detached = before - inner.held.len(),
            "Locks handed to checkout, exempt from cleanup"
        );
        self.persist(&inner)
    }

    /// Queue a release for seats already removed from the held set
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when persisting fails.
    pub async fn enqueue_release(
        &self,
        trip: TripKey,
        seats: Vec<SeatId>,
        client_id: ClientId,
    ) -> Result<ReleaseCommand, RegistryError> {
        let command = ReleaseCommand {
            id: Uuid::new_v4(),
            trip,
            seats,
            client_id,
        };

        let mut inner = self.inner.lock().await;
        inner.outbox.push(command.clone());
        self.persist(&inner)?;
        Ok(command)
    }

    /// Drain one trip: held locks become queued releases, the held set for
    /// that trip clears unconditionally
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when persisting fails; the in-memory
    /// state still drains.
    pub async fn drain_trip(&self, trip: &TripKey) -> Result<Vec<ReleaseCommand>, RegistryError> {
        let mut inner = self.inner.lock().await;
        let (draining, keep): (Vec<_>, Vec<_>) =
            inner.held.drain(..).partition(|lock| lock.trip == *trip);
        inner.held = keep;

        let commands = Self::commands_for(&draining);
        inner.outbox.extend(commands.iter().cloned());
        metrics::gauge!("seathold.registry.held").set(to_f64(inner.held.len()));
        self.persist(&inner)?;
        Ok(commands)
    }

    /// Drain everything: one release command per `(trip, client)` group
    ///
    /// The held set clears unconditionally — local state is never left in
    /// a "presumed locked" condition after a drain.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when persisting fails; the in-memory
    /// state still drains.
    pub async fn drain_all(&self) -> Result<Vec<ReleaseCommand>, RegistryError> {
        let mut inner = self.inner.lock().await;
        let draining = std::mem::take(&mut inner.held);

        let commands = Self::commands_for(&draining);
        inner.outbox.extend(commands.iter().cloned());
        metrics::gauge!("seathold.registry.held").set(0.0);
        metrics::counter!("seathold.registry.drains").increment(1);
        self.persist(&inner)?;
        Ok(commands)
    }

    /// Release commands still awaiting delivery
    pub async fn pending_releases(&self) -> Vec<ReleaseCommand> {
        self.inner.lock().await.outbox.clone()
    }

    /// Acknowledge a delivered release
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when persisting fails.
    pub async fn mark_delivered(&self, id: Uuid) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().await;
        inner.outbox.retain(|command| command.id != id);
        self.persist(&inner)
    }

    fn group(held: &[SeatLock]) -> Vec<RegistryEntry> {
        let mut entries: Vec<RegistryEntry> = Vec::new();
        for lock in held {
            match entries
                .iter_mut()
                .find(|entry| entry.trip == lock.trip && entry.client_id == lock.client_id)
            {
                Some(entry) => {
                    entry.seats.insert(lock.seat.clone());
                },
                None => entries.push(RegistryEntry {
                    trip: lock.trip.clone(),
                    seats: BTreeSet::from([lock.seat.clone()]),
                    client_id: lock.client_id,
                }),
            }
        }
        entries
    }

    fn commands_for(draining: &[SeatLock]) -> Vec<ReleaseCommand> {
        Self::group(draining)
            .into_iter()
            .map(|entry| ReleaseCommand {
                id: Uuid::new_v4(),
                trip: entry.trip,
                seats: entry.seats.into_iter().collect(),
                client_id: entry.client_id,
            })
            .collect()
    }

    fn persist(&self, document: &RegistryDocument) -> Result<(), RegistryError> {
        self.store.save(document).inspect_err(|error| {
            tracing::warn!(%error, "Registry persistence failed; in-memory record stays current");
        })
    }
}

// Registry sizes are tiny; precision loss is not a concern for a gauge
#[allow(clippy::cast_precision_loss)]
fn to_f64(value: usize) -> f64 {
    value as f64
}
