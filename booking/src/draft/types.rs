//! State types for the booking draft.

use crate::types::{
    CheckoutHandoff, Gender, Money, PriceBreakdown, SeatId, StopPoint, TripKey, TripSummary,
};
use std::collections::{BTreeSet, HashMap};

/// Where the draft is in the selection flow
///
/// `Submitted` and `Abandoned` are terminal: a terminal draft ignores every
/// further action, which is what makes stale lock feedback and re-entered
/// teardown paths harmless.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DraftPhase {
    /// No seat selected yet
    Empty,
    /// Seats selected, boarding or dropping point still missing
    Selecting,
    /// Both points set but no payable price yet
    PointsChosen,
    /// Seats, points, and a positive total — ready to proceed
    PriceComputed,
    /// Frozen and handed to checkout; locks stay held, cleanup-exempt
    Submitted,
    /// Collapsed or emptied out; locks released
    Abandoned,
}

impl DraftPhase {
    /// Whether the draft accepts no further actions
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted | Self::Abandoned)
    }
}

/// Non-blocking notice for the rendering layer
///
/// Accumulated on the state and drained by the host with
/// [`DraftAction::NoticesAcknowledged`](super::DraftAction::NoticesAcknowledged).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DraftNotice {
    /// The lock call lost the race: another shopper holds the seat
    SeatJustTaken {
        /// The contested seat
        seat: SeatId,
    },
    /// The lock call got no usable answer; the selection rolled back
    LockFailed {
        /// The affected seat
        seat: SeatId,
    },
    /// The tap would exceed the per-shopper seat limit
    CapacityReached {
        /// The rejected seat
        seat: SeatId,
    },
}

/// State of one trip's booking draft
#[derive(Clone, Debug)]
pub struct DraftState {
    pub(crate) trip: TripKey,
    pub(crate) summary: TripSummary,
    /// Selection order is rendering order
    pub(crate) selected_seats: Vec<SeatId>,
    pub(crate) seat_genders: HashMap<SeatId, Gender>,
    /// Seats whose acquire call has not resolved yet
    pub(crate) pending_locks: BTreeSet<SeatId>,
    /// Seats selected without a hard reservation (lock degraded)
    pub(crate) skipped_locks: BTreeSet<SeatId>,
    /// Occupancy from the latest availability snapshot
    pub(crate) booked_seats: BTreeSet<SeatId>,
    pub(crate) booked_genders: HashMap<SeatId, Gender>,
    pub(crate) boarding_point: Option<StopPoint>,
    pub(crate) dropping_point: Option<StopPoint>,
    pub(crate) pricing: Option<PriceBreakdown>,
    pub(crate) phase: DraftPhase,
    pub(crate) notices: Vec<DraftNotice>,
    pub(crate) handoff: Option<CheckoutHandoff>,
}

impl DraftState {
    /// Create the draft for a freshly expanded trip
    ///
    /// Boarding and dropping points default to each list's first entry, so a
    /// first seat tap usually lands the draft straight in `PriceComputed`.
    #[must_use]
    pub fn new(trip: TripKey, summary: TripSummary) -> Self {
        let boarding_point = summary.boarding_points.first().cloned();
        let dropping_point = summary.dropping_points.first().cloned();

        Self {
            trip,
            summary,
            selected_seats: Vec::new(),
            seat_genders: HashMap::new(),
            pending_locks: BTreeSet::new(),
            skipped_locks: BTreeSet::new(),
            booked_seats: BTreeSet::new(),
            booked_genders: HashMap::new(),
            boarding_point,
            dropping_point,
            pricing: None,
            phase: DraftPhase::Empty,
            notices: Vec::new(),
            handoff: None,
        }
    }

    /// The trip this draft belongs to
    #[must_use]
    pub const fn trip(&self) -> &TripKey {
        &self.trip
    }

    /// Seats in selection order
    #[must_use]
    pub fn selected_seats(&self) -> &[SeatId] {
        &self.selected_seats
    }

    /// Gender chosen (or defaulted) for a selected seat
    #[must_use]
    pub fn gender_for(&self, seat: &SeatId) -> Option<Gender> {
        self.seat_genders.get(seat).copied()
    }

    /// Seats selected without a confirmed backend hold
    #[must_use]
    pub const fn skipped_locks(&self) -> &BTreeSet<SeatId> {
        &self.skipped_locks
    }

    /// Whether a seat is booked or held by another shopper
    #[must_use]
    pub fn is_booked(&self, seat: &SeatId) -> bool {
        self.booked_seats.contains(seat)
    }

    /// The chosen boarding point
    #[must_use]
    pub const fn boarding_point(&self) -> Option<&StopPoint> {
        self.boarding_point.as_ref()
    }

    /// The chosen dropping point
    #[must_use]
    pub const fn dropping_point(&self) -> Option<&StopPoint> {
        self.dropping_point.as_ref()
    }

    /// Pricing for the current selection, once computable
    #[must_use]
    pub const fn pricing(&self) -> Option<&PriceBreakdown> {
        self.pricing.as_ref()
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> DraftPhase {
        self.phase
    }

    /// Undrained notices, oldest first
    #[must_use]
    pub fn notices(&self) -> &[DraftNotice] {
        &self.notices
    }

    /// The frozen handoff, present once the draft is `Submitted`
    #[must_use]
    pub const fn handoff(&self) -> Option<&CheckoutHandoff> {
        self.handoff.as_ref()
    }

    /// Whether a tap on this seat would select (rather than deselect) it
    #[must_use]
    pub fn is_selected(&self, seat: &SeatId) -> bool {
        self.selected_seats.contains(seat)
    }

    /// Recompute pricing and the non-terminal phase after a mutation
    ///
    /// A draft that has left `Empty` and lost all its seats becomes
    /// `Abandoned`; its remaining locks are the caller's to release.
    pub(crate) fn recompute(&mut self) {
        if self.phase.is_terminal() {
            return;
        }

        if self.selected_seats.is_empty() {
            self.pricing = None;
            if self.phase != DraftPhase::Empty {
                self.phase = DraftPhase::Abandoned;
            }
            return;
        }

        let (Some(boarding), Some(dropping)) = (&self.boarding_point, &self.dropping_point) else {
            self.pricing = None;
            self.phase = DraftPhase::Selecting;
            return;
        };

        let price_per_seat = self.summary.price_for(boarding, dropping);
        // Capacity is capped at 4 seats; u32 cannot overflow
        #[allow(clippy::cast_possible_truncation)]
        let seat_count = self.selected_seats.len() as u32;
        let base_price = price_per_seat.saturating_mul(seat_count);
        let convenience_fee = self.summary.convenience_fee.compute(base_price, seat_count);
        let total_price = base_price.saturating_add(convenience_fee);

        self.pricing = Some(PriceBreakdown {
            price_per_seat,
            base_price,
            convenience_fee,
            total_price,
        });

        self.phase = if total_price > Money::ZERO {
            DraftPhase::PriceComputed
        } else {
            DraftPhase::PointsChosen
        };
    }

    /// Remove a seat and everything recorded about it
    pub(crate) fn forget_seat(&mut self, seat: &SeatId) {
        self.selected_seats.retain(|selected| selected != seat);
        self.seat_genders.remove(seat);
        self.pending_locks.remove(seat);
        self.skipped_locks.remove(seat);
    }
}
