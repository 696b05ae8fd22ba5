//! Single-flight tracking: at most one provider walk per cache key.
//!
//! A [`Flight`] exists only while a walk for its key runs. Every caller that
//! wants the key's result holds a [`FlightWaiter`]; the walk itself publishes
//! the outcome through a `watch` channel owned by its [`FlightLead`].
//!
//! ```text
//! caller A ──┐                          ┌─> A gets outcome
//! caller B ──┼─> Flight(key, gen 7) ────┼─> B gets outcome
//! caller C ──┘       │                  └─> C gets outcome
//!                    └─ spawned walk ─> publish ─> remove from map
//! ```
//!
//! Joins and removals for a key happen under that key's map entry lock, so a
//! caller either joins the running generation or starts the next one.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::context::{CancelReason, FetchContext};
use crate::errors::FetchError;
use crate::trace::Trace;

pub(crate) type Outcome<Resp> = Result<Resp, FetchError>;

/// One in-flight walk for one key.
pub(crate) struct Flight<Resp> {
    generation: u64,
    waiters: AtomicUsize,
    cancel: CancellationToken,
    trace: Arc<Trace>,
    outcome: watch::Receiver<Option<Outcome<Resp>>>,
}

impl<Resp> Flight<Resp> {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn trace(&self) -> &Arc<Trace> {
        &self.trace
    }

    /// Context for the shared walk. Cancelled only when every waiter left.
    pub(crate) fn context(&self) -> FetchContext {
        FetchContext::with_token(self.cancel.clone())
    }

    fn is_published(&self) -> bool {
        self.outcome.borrow().is_some()
    }
}

/// All flights of one manager.
pub(crate) struct FlightGroup<Resp> {
    flights: DashMap<String, Arc<Flight<Resp>>>,
    generation: AtomicU64,
}

/// Result of [`FlightGroup::join`].
pub(crate) enum Joined<Resp: Clone> {
    /// The caller created the flight and must start the walk.
    Lead(FlightLead<Resp>, FlightWaiter<Resp>),
    /// A walk for the key is already running.
    Wait(FlightWaiter<Resp>),
}

impl<Resp: Clone> FlightGroup<Resp> {
    pub(crate) fn new() -> Self {
        Self {
            flights: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Generation counter used when no cache hands out generations.
    pub(crate) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of keys with a walk in progress.
    pub(crate) fn len(&self) -> usize {
        self.flights.len()
    }

    /// Join the key's running flight, or create one.
    pub(crate) fn join<F>(self: &Arc<Self>, key: &str, origin: &str, generation: F) -> Joined<Resp>
    where
        F: FnOnce() -> u64,
    {
        match self.flights.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                let flight = Arc::clone(occupied.get());
                flight.waiters.fetch_add(1, Ordering::AcqRel);
                debug!(
                    "Joining in-flight fetch for '{}' (generation {})",
                    key, flight.generation
                );
                Joined::Wait(FlightWaiter::new(Arc::clone(self), key, flight))
            }
            Entry::Vacant(vacant) => {
                let (lead, flight) = FlightLead::new(Arc::clone(self), key, origin, generation());
                vacant.insert(Arc::clone(&flight));
                Joined::Lead(lead, FlightWaiter::new(Arc::clone(self), key, flight))
            }
        }
    }

    /// Create a flight for the key unless one is already running. The new
    /// flight carries a permanent waiter so it is never cancelled.
    pub(crate) fn try_lead<F>(
        self: &Arc<Self>,
        key: &str,
        origin: &str,
        generation: F,
    ) -> Option<FlightLead<Resp>>
    where
        F: FnOnce() -> u64,
    {
        match self.flights.entry(key.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let (lead, flight) = FlightLead::new(Arc::clone(self), key, origin, generation());
                vacant.insert(flight);
                Some(lead)
            }
        }
    }

    fn remove(&self, key: &str, flight: &Arc<Flight<Resp>>) -> bool {
        self.flights
            .remove_if(key, |_, current| Arc::ptr_eq(current, flight))
            .is_some()
    }

    fn leave(&self, key: &str, flight: &Arc<Flight<Resp>>) {
        // Decrement under the entry lock so no caller can join a flight
        // that is about to be cancelled.
        if let Entry::Occupied(occupied) = self.flights.entry(key.to_string()) {
            if Arc::ptr_eq(occupied.get(), flight) {
                let last = flight.waiters.fetch_sub(1, Ordering::AcqRel) == 1;
                if last && !flight.is_published() {
                    occupied.remove();
                    debug!(
                        "Last waiter left '{}' (generation {}), cancelling walk",
                        key, flight.generation
                    );
                    flight.cancel.cancel();
                }
                return;
            }
        }

        let last = flight.waiters.fetch_sub(1, Ordering::AcqRel) == 1;
        if last && !flight.is_published() {
            flight.cancel.cancel();
        }
    }
}

/// Held by the task running the walk. Publishes the outcome and removes the
/// flight from the group; dropping it unpublished abandons the flight.
pub(crate) struct FlightLead<Resp: Clone> {
    group: Arc<FlightGroup<Resp>>,
    key: String,
    flight: Arc<Flight<Resp>>,
    publisher: watch::Sender<Option<Outcome<Resp>>>,
}

impl<Resp: Clone> FlightLead<Resp> {
    fn new(
        group: Arc<FlightGroup<Resp>>,
        key: &str,
        origin: &str,
        generation: u64,
    ) -> (Self, Arc<Flight<Resp>>) {
        let (publisher, outcome) = watch::channel(None);
        let flight = Arc::new(Flight {
            generation,
            waiters: AtomicUsize::new(1),
            cancel: CancellationToken::new(),
            trace: Arc::new(Trace::new(origin)),
            outcome,
        });
        let lead = Self {
            group,
            key: key.to_string(),
            flight: Arc::clone(&flight),
            publisher,
        };
        (lead, flight)
    }

    pub(crate) fn flight(&self) -> &Arc<Flight<Resp>> {
        &self.flight
    }

    /// Release the key, then broadcast the outcome to every waiter.
    ///
    /// The cache is written before this, so a caller that arrives after the
    /// release sees the new entry instead of starting another walk.
    pub(crate) fn publish(self, outcome: Outcome<Resp>) {
        self.group.remove(&self.key, &self.flight);
        self.publisher.send_replace(Some(outcome));
    }
}

impl<Resp: Clone> Drop for FlightLead<Resp> {
    fn drop(&mut self) {
        if self.group.remove(&self.key, &self.flight) && !self.flight.is_published() {
            debug!(
                "Fetch for '{}' (generation {}) ended without an outcome",
                self.key, self.flight.generation
            );
        }
    }
}

/// One caller's interest in a flight.
pub(crate) struct FlightWaiter<Resp: Clone> {
    group: Arc<FlightGroup<Resp>>,
    key: String,
    flight: Arc<Flight<Resp>>,
}

impl<Resp: Clone> FlightWaiter<Resp> {
    fn new(group: Arc<FlightGroup<Resp>>, key: &str, flight: Arc<Flight<Resp>>) -> Self {
        Self {
            group,
            key: key.to_string(),
            flight,
        }
    }

    pub(crate) fn trace(&self) -> &Arc<Trace> {
        &self.flight.trace
    }

    /// Wait for the outcome, or until `ctx` is done.
    ///
    /// Returns `None` when the flight was abandoned without an outcome.
    pub(crate) async fn wait(
        &self,
        ctx: &FetchContext,
    ) -> Result<Option<Outcome<Resp>>, CancelReason> {
        let mut outcome = self.flight.outcome.clone();
        tokio::select! {
            biased;
            published = async {
                outcome
                    .wait_for(Option::is_some)
                    .await
                    .ok()
                    .and_then(|published| (*published).clone())
            } => Ok(published),
            reason = ctx.done() => Err(reason),
        }
    }
}

impl<Resp: Clone> Drop for FlightWaiter<Resp> {
    fn drop(&mut self) {
        self.group.leave(&self.key, &self.flight);
    }
}
