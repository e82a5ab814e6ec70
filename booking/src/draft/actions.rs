//! Actions driving the booking draft.

use crate::locking::LockOutcome;
use crate::types::{Gender, SeatId, StopPoint};
use std::collections::{BTreeSet, HashMap};

/// Everything that can happen to a draft
///
/// Shopper commands come from the rendering layer; the remaining variants
/// are feedback produced by resolved effects (a lock call answering, a
/// forced availability refresh landing) fed back through the store.
#[derive(Clone, Debug)]
pub enum DraftAction {
    /// The shopper tapped a seat: select it, or deselect it if held
    SeatTapped {
        /// The tapped seat
        seat: SeatId,
    },

    /// The shopper changed the gender attached to a selected seat
    SeatGenderChosen {
        /// The selected seat
        seat: SeatId,
        /// The chosen gender
        gender: Gender,
    },

    /// The shopper picked a boarding point
    BoardingPointChosen {
        /// Must be one of the trip's listed boarding points
        point: StopPoint,
    },

    /// The shopper picked a dropping point
    DroppingPointChosen {
        /// Must be one of the trip's listed dropping points
        point: StopPoint,
    },

    /// The shopper wants to continue to checkout
    ///
    /// Valid only with at least one seat, both points, and a positive
    /// total; freezes the draft into a handoff and ends the flow in
    /// `Submitted`.
    ProceedToCheckout,

    /// The trip was collapsed (or the shopper is switching trips)
    ///
    /// Ends the flow in `Abandoned` and releases every held seat.
    Collapse,

    /// A fresh availability snapshot for this trip landed
    AvailabilityApplied {
        /// Seats booked or held by other shoppers
        booked_seats: BTreeSet<SeatId>,
        /// Gender attached to each booked seat
        seat_gender_map: HashMap<SeatId, Gender>,
    },

    /// The acquire call for a seat resolved
    LockResolved {
        /// The seat the call covered
        seat: SeatId,
        /// What the coordinator reported
        outcome: LockOutcome,
    },

    /// The rendering layer displayed the accumulated notices
    NoticesAcknowledged,
}
