//! Store wiring for the booking draft.

use super::{DraftAction, DraftEnvironment, DraftReducer, DraftState};
use crate::types::{TripKey, TripSummary};
use seathold_runtime::Store;

/// The runtime store driving one trip's draft
pub type DraftStore = Store<DraftState, DraftAction, DraftEnvironment, DraftReducer>;

/// Build the store for a freshly expanded trip
#[must_use]
pub fn new_draft_store(trip: TripKey, summary: TripSummary, env: DraftEnvironment) -> DraftStore {
    Store::new(DraftState::new(trip, summary), DraftReducer::new(), env)
}
