//! Unit tests for the draft reducer: optimistic selection, rollback,
//! degradation, pricing, and the terminal phases.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use super::*;
use crate::api::mock::MockBookingApi;
use crate::api::BookingApi;
use crate::availability::AvailabilitySnapshotStore;
use crate::config::AvailabilityConfig;
use crate::locking::{LockCoordinator, LockFailure, LockOutcome};
use crate::registry::{CleanupRegistry, InMemoryRegistryStore, ReleaseOutbox};
use crate::types::{
    BusId, ClientId, ConvenienceFee, FareRule, Gender, Money, SeatId, StopPoint, TripKey,
    TripSummary,
};
use proptest::prelude::*;
use seathold_core::{effect::Effect, reducer::Reducer};
use seathold_runtime::backoff::BackoffGate;
use seathold_testing::{assertions, test_clock, ReducerTest};
use std::collections::BTreeSet;
use std::sync::Arc;

fn trip() -> TripKey {
    let date = chrono::NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
    TripKey::new(BusId::new("bus-1"), date, "08:30")
}

fn summary() -> TripSummary {
    TripSummary {
        bus_id: BusId::new("bus-1"),
        departure_time: "08:30".to_string(),
        price: Money::from_major(500),
        convenience_fee: ConvenienceFee::FlatPerSeat(Money::from_major(25)),
        fares: vec![FareRule {
            boarding: StopPoint::new("Central"),
            dropping: StopPoint::new("Airport"),
            price: Money::from_major(650),
        }],
        boarding_points: vec![StopPoint::new("Central"), StopPoint::new("Mall")],
        dropping_points: vec![StopPoint::new("Airport"), StopPoint::new("Harbor")],
        seat_layout: (1..=40).map(|n| SeatId::new(n.to_string())).collect(),
    }
}

fn test_env() -> DraftEnvironment {
    let api = Arc::new(MockBookingApi::new());
    let registry =
        Arc::new(CleanupRegistry::load(Arc::new(InMemoryRegistryStore::new())).unwrap());
    let outbox = Arc::new(ReleaseOutbox::new(
        Arc::clone(&api) as Arc<dyn BookingApi>,
        Arc::clone(&registry),
    ));
    let clock = Arc::new(test_clock());
    let coordinator = Arc::new(LockCoordinator::new(
        Arc::clone(&api) as Arc<dyn BookingApi>,
        registry,
        outbox,
        clock.clone(),
        ClientId::new(),
    ));
    let availability = Arc::new(AvailabilitySnapshotStore::new(
        api as Arc<dyn BookingApi>,
        clock,
        Arc::new(BackoffGate::new()),
        &AvailabilityConfig {
            ttl: 8,
            forced_ttl: 2,
            backoff_window: 15,
        },
    ));
    DraftEnvironment::new(coordinator, availability, Arc::new(test_clock()), 4)
}

fn seat(label: &str) -> SeatId {
    SeatId::new(label)
}

fn tap(label: &str) -> DraftAction {
    DraftAction::SeatTapped { seat: seat(label) }
}

fn resolved(label: &str, outcome: LockOutcome) -> DraftAction {
    DraftAction::LockResolved {
        seat: seat(label),
        outcome,
    }
}

fn fresh_state() -> DraftState {
    DraftState::new(trip(), summary())
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn first_tap_selects_optimistically_and_describes_the_lock_call() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_action(tap("12"))
        .then_state(|state| {
            assert_eq!(state.selected_seats(), [seat("12")]);
            assert_eq!(state.gender_for(&seat("12")), Some(Gender::Male));
            // Points defaulted at expansion, price is positive: the first
            // seat lands the draft straight in PriceComputed
            assert_eq!(state.phase(), DraftPhase::PriceComputed);
        })
        .then_effects(|effects| {
            assertions::assert_has_future_effect(effects);
        })
        .run();
}

#[test]
fn fifth_tap_is_rejected_without_a_network_call() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([tap("1"), tap("2"), tap("3"), tap("4"), tap("5")])
        .then_state(|state| {
            assert_eq!(state.selected_seats().len(), 4);
            assert_eq!(
                state.notices(),
                [DraftNotice::CapacityReached { seat: seat("5") }]
            );
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn tap_on_a_pending_seat_sends_nothing() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([tap("12"), tap("12")])
        .then_state(|state| {
            assert_eq!(state.selected_seats().len(), 1);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn tap_on_a_booked_seat_is_ignored() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            DraftAction::AvailabilityApplied {
                booked_seats: BTreeSet::from([seat("7")]),
                seat_gender_map: std::collections::HashMap::new(),
            },
            tap("7"),
        ])
        .then_state(|state| {
            assert!(state.selected_seats().is_empty());
            assert!(state.notices().is_empty());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn default_gender_comes_from_the_snapshot_gender_map() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            DraftAction::AvailabilityApplied {
                booked_seats: BTreeSet::new(),
                seat_gender_map: std::collections::HashMap::from([(seat("9"), Gender::Female)]),
            },
            tap("9"),
        ])
        .then_state(|state| {
            assert_eq!(state.gender_for(&seat("9")), Some(Gender::Female));
        })
        .run();
}

#[test]
fn gender_can_be_toggled_on_a_selected_seat() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            tap("3"),
            DraftAction::SeatGenderChosen {
                seat: seat("3"),
                gender: Gender::Female,
            },
        ])
        .then_state(|state| {
            assert_eq!(state.gender_for(&seat("3")), Some(Gender::Female));
        })
        .run();
}

proptest! {
    // The seat cap holds after any tap sequence; this is the client-side
    // half of the no-overselling contract
    #[test]
    fn seat_cap_holds_for_any_tap_sequence(
        taps in proptest::collection::vec(0_usize..12, 0..48)
    ) {
        let reducer = DraftReducer::new();
        let env = test_env();
        let mut state = fresh_state();

        for tap in taps {
            let action = DraftAction::SeatTapped {
                seat: SeatId::new(tap.to_string()),
            };
            let _ = reducer.reduce(&mut state, action, &env);
            prop_assert!(state.selected_seats().len() <= 4);
        }
    }
}

// ============================================================================
// Lock feedback
// ============================================================================

#[test]
fn conflict_rolls_back_and_raises_seat_just_taken() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            tap("12"),
            resolved("12", LockOutcome::Rejected(LockFailure::SeatTaken)),
        ])
        .then_state(|state| {
            assert!(state.selected_seats().is_empty());
            assert_eq!(
                state.notices(),
                [DraftNotice::SeatJustTaken { seat: seat("12") }]
            );
        })
        .run();
}

#[test]
fn network_failure_rolls_back_with_a_distinct_notice() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            tap("12"),
            resolved("12", LockOutcome::Rejected(LockFailure::Network)),
        ])
        .then_state(|state| {
            assert!(state.selected_seats().is_empty());
            assert_eq!(state.notices(), [DraftNotice::LockFailed { seat: seat("12") }]);
        })
        .run();
}

#[test]
fn skipped_lock_keeps_the_selection_unlocked() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([tap("12"), resolved("12", LockOutcome::Skipped)])
        .then_state(|state| {
            assert_eq!(state.selected_seats(), [seat("12")]);
            assert!(state.skipped_locks().contains(&seat("12")));
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn acquired_lock_confirms_and_forces_a_refresh() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([tap("12"), resolved("12", LockOutcome::Acquired)])
        .then_state(|state| {
            assert_eq!(state.selected_seats(), [seat("12")]);
            assert!(state.skipped_locks().is_empty());
        })
        .then_effects(assertions::assert_has_future_effect)
        .run();
}

#[test]
fn stale_lock_feedback_is_ignored() {
    // No tap happened for this seat, so nothing is pending
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_action(resolved("31", LockOutcome::Acquired))
        .then_state(|state| {
            assert!(state.selected_seats().is_empty());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

// ============================================================================
// Deselection
// ============================================================================

#[test]
fn deselect_releases_then_refreshes_in_order() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            tap("4"),
            tap("5"),
            resolved("4", LockOutcome::Acquired),
            resolved("5", LockOutcome::Acquired),
            tap("4"),
        ])
        .then_state(|state| {
            assert_eq!(state.selected_seats(), [seat("5")]);
        })
        .then_effects(|effects| {
            assert!(
                matches!(effects, [Effect::Sequential(_)]),
                "release must complete before the forced refresh starts"
            );
        })
        .run();
}

#[test]
fn deselecting_the_last_seat_abandons_the_draft() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([tap("4"), resolved("4", LockOutcome::Acquired), tap("4")])
        .then_state(|state| {
            assert!(state.selected_seats().is_empty());
            assert_eq!(state.phase(), DraftPhase::Abandoned);
        })
        .run();
}

// ============================================================================
// Points & pricing
// ============================================================================

#[test]
fn fare_rule_prices_the_default_pair() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([tap("1"), tap("2")])
        .then_state(|state| {
            let pricing = state.pricing().expect("price computed");
            // Central → Airport has a pair fare of 650
            assert_eq!(pricing.price_per_seat, Money::from_major(650));
            assert_eq!(pricing.base_price, Money::from_major(1300));
            assert_eq!(pricing.convenience_fee, Money::from_major(50));
            assert_eq!(pricing.total_price, Money::from_major(1350));
        })
        .run();
}

#[test]
fn unmatched_pair_falls_back_to_the_base_price() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            tap("1"),
            DraftAction::DroppingPointChosen {
                point: StopPoint::new("Harbor"),
            },
        ])
        .then_state(|state| {
            let pricing = state.pricing().expect("price computed");
            assert_eq!(pricing.price_per_seat, Money::from_major(500));
            assert_eq!(pricing.total_price, Money::from_major(525));
        })
        .run();
}

#[test]
fn percentage_fee_is_computed_in_basis_points() {
    let mut percentage_summary = summary();
    percentage_summary.convenience_fee = ConvenienceFee::PercentOfBase(250); // 2.5%
    percentage_summary.fares.clear();

    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(DraftState::new(trip(), percentage_summary))
        .when_actions([tap("1"), tap("2")])
        .then_state(|state| {
            let pricing = state.pricing().expect("price computed");
            assert_eq!(pricing.base_price, Money::from_major(1000));
            assert_eq!(pricing.convenience_fee, Money::from_major(25));
            assert_eq!(pricing.total_price, Money::from_major(1025));
        })
        .run();
}

#[test]
fn unknown_points_are_rejected() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            tap("1"),
            DraftAction::BoardingPointChosen {
                point: StopPoint::new("Nowhere"),
            },
        ])
        .then_state(|state| {
            assert_eq!(state.boarding_point(), Some(&StopPoint::new("Central")));
        })
        .run();
}

// ============================================================================
// Terminal phases
// ============================================================================

#[test]
fn proceed_freezes_the_handoff_and_submits() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            tap("3"),
            tap("4"),
            resolved("3", LockOutcome::Acquired),
            resolved("4", LockOutcome::Acquired),
            DraftAction::ProceedToCheckout,
        ])
        .then_state(|state| {
            assert_eq!(state.phase(), DraftPhase::Submitted);
            let handoff = state.handoff().expect("handoff frozen");
            assert_eq!(handoff.seats, [seat("3"), seat("4")]);
            assert_eq!(handoff.boarding_point, StopPoint::new("Central"));
            assert_eq!(handoff.pricing.total_price, Money::from_major(1350));
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn proceed_on_an_empty_draft_is_ignored() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_action(DraftAction::ProceedToCheckout)
        .then_state(|state| {
            assert_eq!(state.phase(), DraftPhase::Empty);
            assert!(state.handoff().is_none());
        })
        .run();
}

#[test]
fn submitted_draft_ignores_further_taps() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            tap("3"),
            resolved("3", LockOutcome::Acquired),
            DraftAction::ProceedToCheckout,
            tap("8"),
        ])
        .then_state(|state| {
            assert_eq!(state.selected_seats(), [seat("3")]);
            assert_eq!(state.phase(), DraftPhase::Submitted);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn collapse_abandons_and_releases_everything() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            tap("1"),
            tap("2"),
            resolved("1", LockOutcome::Acquired),
            resolved("2", LockOutcome::Acquired),
            DraftAction::Collapse,
        ])
        .then_state(|state| {
            assert_eq!(state.phase(), DraftPhase::Abandoned);
        })
        .then_effects(assertions::assert_has_future_effect)
        .run();
}

#[test]
fn collapse_of_an_empty_draft_releases_nothing() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_action(DraftAction::Collapse)
        .then_state(|state| {
            assert_eq!(state.phase(), DraftPhase::Abandoned);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn late_feedback_after_collapse_is_ignored() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            tap("1"),
            DraftAction::Collapse,
            resolved("1", LockOutcome::Acquired),
        ])
        .then_state(|state| {
            assert_eq!(state.phase(), DraftPhase::Abandoned);
            assert!(state.skipped_locks().is_empty());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn notices_are_drained_on_acknowledgement() {
    ReducerTest::new(DraftReducer::new())
        .with_env(test_env())
        .given_state(fresh_state())
        .when_actions([
            tap("12"),
            resolved("12", LockOutcome::Rejected(LockFailure::SeatTaken)),
            DraftAction::NoticesAcknowledged,
        ])
        .then_state(|state| {
            assert!(state.notices().is_empty());
        })
        .run();
}
