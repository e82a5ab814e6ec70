//! The single-owner booking session.
//!
//! One `BookingSession` exists per page lifecycle. It owns the availability
//! store, the lock coordinator, the cleanup registry, the release outbox,
//! and — crucially — the *one* active draft store. "Only one draft is live
//! at a time" is a constructed invariant here, not a convention callers must
//! remember: expanding trip B collapses and drains trip A inside the session
//! before the new draft exists.
//!
//! Every exit path funnels through a drain: collapsing or switching trips,
//! modify-search, teardown, logout, and another tab clearing the auth token.
//! The only exemption is a draft that reached `Submitted` — its locks were
//! handed to checkout and its registry rows detached at handoff.

use crate::api::BookingApi;
use crate::availability::AvailabilitySnapshotStore;
use crate::config::BookingConfig;
use crate::draft::{new_draft_store, DraftAction, DraftEnvironment, DraftPhase, DraftState, DraftStore};
use crate::locking::LockCoordinator;
use crate::polling::{PollingScheduler, ViewState};
use crate::registry::{CleanupRegistry, RegistryError, RegistryStore, ReleaseOutbox};
use crate::types::{CheckoutHandoff, ClientId, SeatId, TripKey, TripSummary};
use chrono::NaiveDate;
use seathold_core::environment::Clock;
use seathold_runtime::backoff::BackoffGate;
use seathold_runtime::{EffectHandle, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

/// Errors surfaced by session operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// No trip is currently expanded
    #[error("No trip is currently expanded")]
    NoActiveDraft,

    /// The draft has not reached a valid checkout state
    #[error("The draft is not ready for checkout")]
    NotReadyForCheckout,

    /// The draft store rejected the action
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Registry persistence failed
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The one live draft and the trip it belongs to
struct ActiveDraft {
    trip: TripKey,
    store: DraftStore,
}

/// Single-owner coordinator for the whole seat-selection flow
pub struct BookingSession {
    availability: Arc<AvailabilitySnapshotStore>,
    coordinator: Arc<LockCoordinator>,
    registry: Arc<CleanupRegistry>,
    outbox: Arc<ReleaseOutbox>,
    clock: Arc<dyn Clock>,
    config: BookingConfig,
    active: Mutex<Option<ActiveDraft>>,
    view_tx: watch::Sender<ViewState>,
    visibility: Arc<AtomicBool>,
    scheduler: Mutex<Option<PollingScheduler>>,
}

impl BookingSession {
    /// Assemble a session over the given backend and registry persistence
    ///
    /// Restores any registry state a previous process left behind; call
    /// [`start`](Self::start) to flush its undelivered releases and begin
    /// polling.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the persisted registry cannot be read.
    pub fn new(
        api: Arc<dyn BookingApi>,
        registry_store: Arc<dyn RegistryStore>,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
    ) -> Result<Self, RegistryError> {
        let client_id = ClientId::new();
        let registry = Arc::new(CleanupRegistry::load(registry_store)?);
        let outbox = Arc::new(ReleaseOutbox::new(
            Arc::clone(&api),
            Arc::clone(&registry),
        ));
        let coordinator = Arc::new(LockCoordinator::new(
            Arc::clone(&api),
            Arc::clone(&registry),
            Arc::clone(&outbox),
            Arc::clone(&clock),
            client_id,
        ));
        let availability = Arc::new(AvailabilitySnapshotStore::new(
            api,
            Arc::clone(&clock),
            Arc::new(BackoffGate::new()),
            &config.availability,
        ));
        let (view_tx, _) = watch::channel(ViewState::default());

        Ok(Self {
            availability,
            coordinator,
            registry,
            outbox,
            clock,
            config,
            active: Mutex::new(None),
            view_tx,
            visibility: Arc::new(AtomicBool::new(true)),
            scheduler: Mutex::new(None),
        })
    }

    /// Begin background work: queue cleanup of whatever a previous process
    /// left behind, flush undelivered releases, and start the availability
    /// polling loop
    pub async fn start(&self) {
        // Restored held locks belong to a dead flow (the client identity is
        // new); convert them to queued releases for the flush below
        match self.registry.drain_all().await {
            Ok(commands) if !commands.is_empty() => {
                tracing::info!(
                    groups = commands.len(),
                    "Releasing locks restored from a previous session"
                );
            },
            Ok(_) => {},
            Err(error) => {
                tracing::warn!(%error, "Startup drain could not be persisted");
            },
        }

        {
            let outbox = Arc::clone(&self.outbox);
            tokio::spawn(async move {
                outbox.flush_pending().await;
            });
        }

        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_none() {
            *scheduler = Some(PollingScheduler::spawn(
                Arc::clone(&self.availability),
                self.view_tx.subscribe(),
                Arc::clone(&self.visibility),
                &self.config.polling,
            ));
        }
    }

    /// The identity this session's locks are taken under
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.coordinator.client_id()
    }

    /// The shared availability store, for the rendering layer
    #[must_use]
    pub fn availability(&self) -> Arc<AvailabilitySnapshotStore> {
        Arc::clone(&self.availability)
    }

    /// The cleanup registry (exposed for inspection; only the session and
    /// the coordinator mutate it)
    #[must_use]
    pub fn registry(&self) -> Arc<CleanupRegistry> {
        Arc::clone(&self.registry)
    }

    /// Mirror the page's visibility; a hidden page stops polling
    pub fn set_visibility(&self, visible: bool) {
        self.visibility.store(visible, Ordering::Release);
    }

    /// Publish the trips currently scrolled into view
    pub fn update_visible_trips(&self, trips: Vec<TripKey>) {
        self.view_tx.send_modify(|view| view.visible = trips);
    }

    /// The trip whose seat map is currently open
    pub async fn expanded_trip(&self) -> Option<TripKey> {
        self.active.lock().await.as_ref().map(|draft| draft.trip.clone())
    }

    /// Open a trip's seat map, collapsing (and draining) any previous one
    ///
    /// Expanding the already-expanded trip is a no-op. The new draft starts
    /// with both points defaulted and the latest occupancy applied.
    pub async fn expand_trip(&self, summary: TripSummary, date: NaiveDate) {
        let trip = summary.trip_key(date);
        let mut active = self.active.lock().await;

        if active.as_ref().is_some_and(|draft| draft.trip == trip) {
            return;
        }

        self.collapse_locked(&mut active).await;

        tracing::info!(%trip, "Expanding trip");
        let env = DraftEnvironment::new(
            Arc::clone(&self.coordinator),
            Arc::clone(&self.availability),
            Arc::clone(&self.clock),
            self.config.selection.max_seats,
        );
        let store = new_draft_store(trip.clone(), summary, env);

        // Prime occupancy so already-booked seats render correctly on the
        // very first frame
        if let Some(snapshot) = self.availability.get(&trip, true).await {
            let _ = store
                .send(DraftAction::AvailabilityApplied {
                    booked_seats: snapshot.booked_seats,
                    seat_gender_map: snapshot.seat_gender_map,
                })
                .await;
        }

        self.view_tx
            .send_modify(|view| view.expanded = Some(trip.clone()));
        *active = Some(ActiveDraft { trip, store });
    }

    /// Collapse the expanded trip, releasing its locks
    pub async fn collapse_current(&self) {
        let mut active = self.active.lock().await;
        self.collapse_locked(&mut active).await;
    }

    /// Drive an action into the active draft
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoActiveDraft`] when no trip is expanded, or
    /// the store's error when it is shutting down.
    pub async fn send_to_draft(&self, action: DraftAction) -> Result<EffectHandle, SessionError> {
        let active = self.active.lock().await;
        let draft = active.as_ref().ok_or(SessionError::NoActiveDraft)?;
        Ok(draft.store.send(action).await?)
    }

    /// Tap a seat on the expanded trip
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoActiveDraft`] when no trip is expanded.
    pub async fn tap_seat(&self, seat: SeatId) -> Result<EffectHandle, SessionError> {
        self.send_to_draft(DraftAction::SeatTapped { seat }).await
    }

    /// Read the active draft's state through a closure
    pub async fn draft_state<F, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&DraftState) -> T,
    {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(draft) => Some(draft.store.state(f).await),
            None => None,
        }
    }

    /// Freeze the draft and hand it to checkout
    ///
    /// On success the draft is `Submitted`, its registry rows are detached,
    /// and **no** later drain will release its seats — the checkout flow
    /// expects them held.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoActiveDraft`] with no expanded trip,
    /// [`SessionError::NotReadyForCheckout`] when validation failed.
    pub async fn proceed_to_checkout(&self) -> Result<CheckoutHandoff, SessionError> {
        let active = self.active.lock().await;
        let draft = active.as_ref().ok_or(SessionError::NoActiveDraft)?;

        let mut handle = draft.store.send(DraftAction::ProceedToCheckout).await?;
        handle.wait().await;

        let handoff = draft
            .store
            .state(|state| state.handoff().cloned())
            .await
            .ok_or(SessionError::NotReadyForCheckout)?;

        self.registry.detach_trip(&draft.trip).await?;
        tracing::info!(trip = %draft.trip, seats = handoff.seats.len(), "Draft handed to checkout");
        Ok(handoff)
    }

    /// The shopper changed the search: release everything, then navigate
    pub async fn modify_search(&self) {
        self.drain_session("modify_search").await;
    }

    /// Application-level logout: no lock survives it
    pub async fn logout(&self) {
        self.drain_session("logout").await;
    }

    /// Another tab cleared the auth token
    pub async fn on_auth_token_cleared(&self) {
        self.drain_session("auth_token_cleared").await;
    }

    /// Navigation away from the results view
    ///
    /// Stops polling and drains every lock not handed to checkout.
    pub async fn teardown(&self) {
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.shutdown().await;
        }
        self.drain_session("teardown").await;
    }

    /// Collapse the active draft (unless `Submitted`) and sweep the registry
    async fn drain_session(&self, cause: &str) {
        {
            let mut active = self.active.lock().await;
            self.collapse_locked(&mut active).await;
        }

        match self.registry.drain_all().await {
            Ok(commands) if !commands.is_empty() => {
                tracing::info!(cause, groups = commands.len(), "Draining held locks");
                self.outbox.deliver(&commands).await;
            },
            Ok(_) => {},
            Err(error) => {
                // The in-memory registry still drained; delivery of what was
                // queued before the failure proceeds on the next flush
                tracing::warn!(cause, %error, "Drain could not be persisted");
            },
        }
    }

    /// Collapse and drop the active draft under the session lock
    ///
    /// A `Submitted` draft is dropped without releasing anything: its locks
    /// belong to checkout now.
    async fn collapse_locked(&self, active: &mut Option<ActiveDraft>) {
        let Some(draft) = active.take() else {
            return;
        };

        let submitted = draft
            .store
            .state(|state| state.phase() == DraftPhase::Submitted)
            .await;

        if !submitted {
            if let Ok(mut handle) = draft.store.send(DraftAction::Collapse).await {
                // The release effects (registry removal + backend call) must
                // finish before a new draft may exist
                handle.wait().await;
            }

            // An acquire that resolved after the collapse snapshot can have
            // re-added a row; sweep the trip so nothing leaks
            match self.registry.drain_trip(&draft.trip).await {
                Ok(commands) if !commands.is_empty() => {
                    self.outbox.deliver(&commands).await;
                },
                Ok(_) => {},
                Err(error) => {
                    tracing::warn!(trip = %draft.trip, %error, "Residual trip drain failed to persist");
                },
            }
        }

        self.view_tx.send_modify(|view| view.expanded = None);
    }
}
