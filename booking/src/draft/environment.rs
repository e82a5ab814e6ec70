//! Injected dependencies for the draft reducer.

use crate::availability::AvailabilitySnapshotStore;
use crate::locking::LockCoordinator;
use crate::types::ClientId;
use seathold_core::environment::Clock;
use std::sync::Arc;

/// Dependencies a draft's effects need
///
/// The reducer itself never touches these; the effect futures it returns
/// capture clones of the inner handles.
#[derive(Clone)]
pub struct DraftEnvironment {
    coordinator: Arc<LockCoordinator>,
    availability: Arc<AvailabilitySnapshotStore>,
    clock: Arc<dyn Clock>,
    max_seats: usize,
}

impl DraftEnvironment {
    /// Assemble the environment for one draft store
    #[must_use]
    pub fn new(
        coordinator: Arc<LockCoordinator>,
        availability: Arc<AvailabilitySnapshotStore>,
        clock: Arc<dyn Clock>,
        max_seats: usize,
    ) -> Self {
        Self {
            coordinator,
            availability,
            clock,
            max_seats,
        }
    }

    /// The lock coordinator shared by the session
    #[must_use]
    pub fn coordinator(&self) -> Arc<LockCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// The availability store shared by the session
    #[must_use]
    pub fn availability(&self) -> Arc<AvailabilitySnapshotStore> {
        Arc::clone(&self.availability)
    }

    /// Clock for timestamps
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Identity the session's locks are taken under
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.coordinator.client_id()
    }

    /// Per-shopper seat limit
    #[must_use]
    pub const fn max_seats(&self) -> usize {
        self.max_seats
    }
}
