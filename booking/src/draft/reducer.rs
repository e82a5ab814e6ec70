//! Reducer for the booking draft.

use super::{DraftAction, DraftEnvironment, DraftNotice, DraftPhase, DraftState};
use crate::locking::{LockFailure, LockOutcome};
use crate::types::{CheckoutHandoff, Gender, SeatId};
use seathold_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};

/// Pure decision logic for one trip's draft
///
/// State mutations happen here, synchronously, before any described network
/// call runs — that ordering is the optimistic-update guarantee. Lock and
/// release calls come back as [`DraftAction::LockResolved`] /
/// [`DraftAction::AvailabilityApplied`] feedback, which can only confirm or
/// correct what the shopper already sees.
#[derive(Clone)]
pub struct DraftReducer;

impl DraftReducer {
    /// Create a draft reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for DraftReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for DraftReducer {
    type State = DraftState;
    type Action = DraftAction;
    type Environment = DraftEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        // A terminal draft ignores everything except notice housekeeping;
        // this is what makes stale feedback and re-entered teardown harmless
        if state.phase.is_terminal() && !matches!(action, DraftAction::NoticesAcknowledged) {
            return SmallVec::new();
        }

        match action {
            DraftAction::SeatTapped { seat } => {
                if state.pending_locks.contains(&seat) {
                    // An acquire for this seat is already outstanding
                    return SmallVec::new();
                }

                if state.is_selected(&seat) {
                    deselect(state, env, &seat)
                } else {
                    select(state, env, seat)
                }
            },

            DraftAction::SeatGenderChosen { seat, gender } => {
                if state.is_selected(&seat) {
                    state.seat_genders.insert(seat, gender);
                }
                SmallVec::new()
            },

            DraftAction::BoardingPointChosen { point } => {
                if state.summary.boarding_points.contains(&point) {
                    state.boarding_point = Some(point);
                    state.recompute();
                }
                SmallVec::new()
            },

            DraftAction::DroppingPointChosen { point } => {
                if state.summary.dropping_points.contains(&point) {
                    state.dropping_point = Some(point);
                    state.recompute();
                }
                SmallVec::new()
            },

            DraftAction::AvailabilityApplied {
                booked_seats,
                seat_gender_map,
            } => {
                state.booked_seats = booked_seats;
                state.booked_genders = seat_gender_map;
                SmallVec::new()
            },

            DraftAction::LockResolved { seat, outcome } => {
                if !state.pending_locks.remove(&seat) {
                    // The seat is no longer awaiting this answer
                    return SmallVec::new();
                }
                resolve_lock(state, env, seat, outcome)
            },

            DraftAction::ProceedToCheckout => {
                proceed(state, env);
                SmallVec::new()
            },

            DraftAction::Collapse => collapse(state, env),

            DraftAction::NoticesAcknowledged => {
                state.notices.clear();
                SmallVec::new()
            },
        }
    }
}

/// Optimistically select a seat and describe the acquire call
fn select(
    state: &mut DraftState,
    env: &DraftEnvironment,
    seat: SeatId,
) -> SmallVec<[Effect<DraftAction>; 4]> {
    if state.selected_seats.len() >= env.max_seats() {
        state.notices.push(DraftNotice::CapacityReached { seat });
        return SmallVec::new();
    }

    if state.booked_seats.contains(&seat) {
        // The layer below renders it unavailable; nothing to do
        return SmallVec::new();
    }

    let gender = state
        .booked_genders
        .get(&seat)
        .copied()
        .unwrap_or(Gender::Male);
    state.selected_seats.push(seat.clone());
    state.seat_genders.insert(seat.clone(), gender);
    state.pending_locks.insert(seat.clone());
    state.recompute();

    let coordinator = env.coordinator();
    let trip = state.trip.clone();
    smallvec![Effect::Future(Box::pin(async move {
        let outcome = coordinator.acquire(&trip, &seat).await;
        Some(DraftAction::LockResolved { seat, outcome })
    }))]
}

/// Deselect a seat: optimistic removal, then release and a forced refresh
fn deselect(
    state: &mut DraftState,
    env: &DraftEnvironment,
    seat: &SeatId,
) -> SmallVec<[Effect<DraftAction>; 4]> {
    state.forget_seat(seat);
    state.recompute();

    // Safe for skipped seats too: release is idempotent backend-side
    let coordinator = env.coordinator();
    let availability = env.availability();
    let trip = state.trip.clone();
    let refresh_trip = trip.clone();
    let seat = seat.clone();

    smallvec![Effect::chain(vec![
        Effect::Future(Box::pin(async move {
            coordinator.release(&trip, vec![seat]).await;
            None
        })),
        Effect::Future(Box::pin(async move {
            refresh(&availability, &refresh_trip).await
        })),
    ])]
}

/// Fold a resolved acquire back into the draft
fn resolve_lock(
    state: &mut DraftState,
    env: &DraftEnvironment,
    seat: SeatId,
    outcome: LockOutcome,
) -> SmallVec<[Effect<DraftAction>; 4]> {
    match outcome {
        LockOutcome::Acquired => {
            // Confirmed: reflect the shopper's own hold quickly
            let availability = env.availability();
            let trip = state.trip.clone();
            smallvec![Effect::Future(Box::pin(async move {
                refresh(&availability, &trip).await
            }))]
        },
        LockOutcome::Skipped => {
            state.skipped_locks.insert(seat);
            SmallVec::new()
        },
        LockOutcome::Rejected(reason) => {
            state.forget_seat(&seat);
            state.notices.push(match reason {
                LockFailure::SeatTaken => DraftNotice::SeatJustTaken { seat },
                LockFailure::Network => DraftNotice::LockFailed { seat },
            });
            state.recompute();

            let availability = env.availability();
            let trip = state.trip.clone();
            smallvec![Effect::Future(Box::pin(async move {
                refresh(&availability, &trip).await
            }))]
        },
        // This reducer never double-sends; a duplicate answer is stale
        LockOutcome::AlreadyInFlight => SmallVec::new(),
    }
}

/// Freeze the draft into a checkout handoff
fn proceed(state: &mut DraftState, env: &DraftEnvironment) {
    // PriceComputed already encodes the validation: at least one seat, both
    // points set, and a positive total
    if state.phase != DraftPhase::PriceComputed {
        return;
    }
    let (Some(boarding), Some(dropping), Some(pricing)) = (
        state.boarding_point.clone(),
        state.dropping_point.clone(),
        state.pricing,
    ) else {
        return;
    };

    let seat_genders = state
        .selected_seats
        .iter()
        .map(|seat| {
            let gender = state
                .seat_genders
                .get(seat)
                .copied()
                .unwrap_or(Gender::Male);
            (seat.clone(), gender)
        })
        .collect();

    state.handoff = Some(CheckoutHandoff {
        trip: state.trip.clone(),
        seats: state.selected_seats.clone(),
        seat_genders,
        boarding_point: boarding,
        dropping_point: dropping,
        pricing,
        client_id: env.client_id(),
    });
    state.phase = DraftPhase::Submitted;
}

/// Abandon the draft and release everything it holds
fn collapse(
    state: &mut DraftState,
    env: &DraftEnvironment,
) -> SmallVec<[Effect<DraftAction>; 4]> {
    state.phase = DraftPhase::Abandoned;

    let seats = state.selected_seats.clone();
    if seats.is_empty() {
        return SmallVec::new();
    }

    let coordinator = env.coordinator();
    let trip = state.trip.clone();
    smallvec![Effect::Future(Box::pin(async move {
        coordinator.release(&trip, seats).await;
        None
    }))]
}

/// Forced availability refresh, fed back as occupancy state
async fn refresh(
    availability: &crate::availability::AvailabilitySnapshotStore,
    trip: &crate::types::TripKey,
) -> Option<DraftAction> {
    let snapshot = availability.get(trip, true).await?;
    Some(DraftAction::AvailabilityApplied {
        booked_seats: snapshot.booked_seats,
        seat_gender_map: snapshot.seat_gender_map,
    })
}
