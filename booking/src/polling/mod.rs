//! Bounded periodic refresh of visible trips' availability.
//!
//! One cooperative task on a fixed interval. `MissedTickBehavior::Delay`
//! gives the re-entrancy guarantee for free: a tick never starts while the
//! previous one is still fetching. The working set is bounded — the expanded
//! trip plus a capped slice of the visible ones — so request fan-out stays
//! constant no matter how long the result list grows through incremental
//! loading.

use crate::availability::AvailabilitySnapshotStore;
use crate::config::PollingConfig;
use crate::types::TripKey;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What the results page currently shows
///
/// Published by the session through a watch channel; the scheduler reads the
/// latest value at each tick.
#[derive(Clone, Debug, Default)]
pub struct ViewState {
    /// The trip whose seat map is open, if any
    pub expanded: Option<TripKey>,
    /// Visible trips in listing order
    pub visible: Vec<TripKey>,
}

impl ViewState {
    /// The trips one tick refreshes: the expanded trip first, then up to
    /// `cap` visible ones (excluding the expanded trip itself)
    #[must_use]
    pub fn working_set(&self, cap: usize) -> Vec<TripKey> {
        let mut set: Vec<TripKey> = Vec::with_capacity(cap + 1);
        if let Some(expanded) = &self.expanded {
            set.push(expanded.clone());
        }
        set.extend(
            self.visible
                .iter()
                .filter(|trip| Some(*trip) != self.expanded.as_ref())
                .take(cap)
                .cloned(),
        );
        set
    }

    /// Everything worth keeping a snapshot for
    fn retained(&self) -> Vec<TripKey> {
        let mut retained = self.visible.clone();
        if let Some(expanded) = &self.expanded {
            if !retained.contains(expanded) {
                retained.push(expanded.clone());
            }
        }
        retained
    }
}

/// Periodic availability refresher for the results view
pub struct PollingScheduler {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl PollingScheduler {
    /// Spawn the polling loop
    ///
    /// `visibility` mirrors the page's visibility: while `false`, ticks are
    /// skipped entirely (a backgrounded tab must not poll).
    #[must_use]
    pub fn spawn(
        availability: Arc<AvailabilitySnapshotStore>,
        view_state: watch::Receiver<ViewState>,
        visibility: Arc<AtomicBool>,
        config: &PollingConfig,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = config.interval();
        let cap = config.visible_cap;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of tokio's interval fires immediately; consume
            // it so polling starts one interval after spawn
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Polling scheduler stopping");
                            return;
                        }
                    },
                    _ = ticker.tick() => {
                        if !visibility.load(Ordering::Acquire) {
                            metrics::counter!("seathold.polling.skipped_hidden").increment(1);
                            continue;
                        }

                        let view = view_state.borrow().clone();
                        Self::tick(&availability, &view, cap).await;
                    },
                }
            }
        });

        Self {
            handle,
            shutdown: shutdown_tx,
        }
    }

    /// One refresh pass over the bounded working set
    async fn tick(availability: &AvailabilitySnapshotStore, view: &ViewState, cap: usize) {
        let working_set = view.working_set(cap);
        if working_set.is_empty() {
            return;
        }

        metrics::counter!("seathold.polling.ticks").increment(1);
        let start = std::time::Instant::now();

        // Sequential within the single task: the tick itself is the
        // concurrency bound
        for trip in &working_set {
            availability.get(trip, false).await;
        }

        availability.retain_visible(&view.retained()).await;
        metrics::histogram!("seathold.polling.tick_duration_seconds")
            .record(start.elapsed().as_secs_f64());
    }

    /// Stop the loop and wait for the task to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
