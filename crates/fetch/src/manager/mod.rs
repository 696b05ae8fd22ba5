//! Fetch orchestration.
//!
//! The [`Manager`] answers a typed request by, in order:
//! 1. Serving it from the two-tier cache when the entry is fresh or stale
//!    (a stale hit also schedules a background refresh)
//! 2. Joining the key's in-flight walk, or starting one
//! 3. Walking the eligible providers by descending priority until one
//!    succeeds, merging every provider trace into one
//! 4. Recording exactly one metrics outcome per walk or cache hit

mod builder;
mod flight;

pub use builder::ManagerBuilder;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use tracing::Instrument;

use crate::cache::{CacheLookup, CacheStore};
use crate::context::FetchContext;
use crate::errors::{FetchError, ProviderFailures};
use crate::metrics::{MetricsCollector, Stats, CACHE_PROVIDER, NO_PROVIDER};
use crate::provider::FetchRequest;
use crate::registry::ProviderRegistry;
use crate::trace::Trace;

use flight::{FlightGroup, FlightLead, Joined, Outcome};

/// Coordinates cache, single-flight and provider fallback for one request
/// type.
///
/// Cheap to clone; clones share the cache, the in-flight table and the
/// metrics collector.
pub struct Manager<Req, Resp> {
    inner: Arc<Inner<Req, Resp>>,
}

struct Inner<Req, Resp> {
    registry: ProviderRegistry<Req, Resp>,
    cache: Option<CacheStore<Resp>>,
    metrics: Arc<dyn MetricsCollector>,
    flights: Arc<FlightGroup<Resp>>,
}

impl<Req, Resp> Manager<Req, Resp>
where
    Req: FetchRequest,
    Resp: Clone + Send + Sync + 'static,
{
    pub fn builder() -> ManagerBuilder<Req, Resp> {
        ManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        registry: ProviderRegistry<Req, Resp>,
        cache: Option<CacheStore<Resp>>,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                cache,
                metrics,
                flights: Arc::new(FlightGroup::new()),
            }),
        }
    }

    /// Fetch the response for `request`.
    pub async fn fetch(&self, ctx: &FetchContext, request: Req) -> Result<Resp, FetchError> {
        self.fetch_with_trace(ctx, request).await.0
    }

    /// Fetch the response for `request`, together with the trace of every
    /// network attempt made for it.
    ///
    /// Cache hits return an empty, finished trace. Callers that joined an
    /// in-flight walk get a copy of that walk's trace. A cancelled caller
    /// gets the attempts recorded up to the moment it gave up.
    pub async fn fetch_with_trace(
        &self,
        ctx: &FetchContext,
        request: Req,
    ) -> (Result<Resp, FetchError>, Trace) {
        let started = Instant::now();
        let key = request.cache_key();

        if let Some(cache) = &self.inner.cache {
            match cache.get(&key) {
                CacheLookup::Fresh(value) => {
                    debug!("cache-hit '{}'", key);
                    self.inner
                        .metrics
                        .record_fetch(CACHE_PROVIDER, true, started.elapsed(), true);
                    return (Ok(value), Trace::empty(format!("cache:{}", key)));
                }
                CacheLookup::Stale(value) => {
                    debug!("stale-hit '{}', scheduling refresh", key);
                    self.inner
                        .metrics
                        .record_fetch(CACHE_PROVIDER, true, started.elapsed(), true);
                    let trace = Trace::empty(format!("cache:{}", key));
                    self.spawn_refresh(key, request);
                    return (Ok(value), trace);
                }
                CacheLookup::Missing => {}
            }
        }

        if let Some(reason) = ctx.is_done() {
            debug!("Fetch for '{}' not started: {}", key, reason);
            return (Err(reason.into()), Trace::empty(format!("fetch:{}", key)));
        }

        let origin = format!("fetch:{}", key);
        let waiter = match self
            .inner
            .flights
            .join(&key, &origin, || self.inner.next_generation())
        {
            Joined::Lead(lead, waiter) => {
                self.spawn_walk(lead, key.clone(), request);
                waiter
            }
            Joined::Wait(waiter) => waiter,
        };

        let result = match waiter.wait(ctx).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                warn!("In-flight fetch for '{}' was abandoned", key);
                Err(FetchError::Abandoned { key })
            }
            Err(reason) => {
                debug!("Caller stopped waiting for '{}': {}", key, reason);
                Err(reason.into())
            }
        };

        let trace = waiter.trace().snapshot();
        trace.finish();
        (result, trace)
    }

    /// Metrics snapshot.
    pub fn stats(&self) -> Stats {
        self.inner.metrics.stats()
    }

    /// Drop the cached response for `key`. Returns whether one was cached.
    pub fn evict(&self, key: &str) -> bool {
        self.inner
            .cache
            .as_ref()
            .is_some_and(|cache| cache.evict(key))
    }

    /// Current cache state for `key`, without touching any provider.
    pub fn cached(&self, key: &str) -> CacheLookup<Resp> {
        match &self.inner.cache {
            Some(cache) => cache.get(key),
            None => CacheLookup::Missing,
        }
    }

    /// Provider names in walk order.
    pub fn providers(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    /// Number of keys with a provider walk in progress.
    pub fn in_flight(&self) -> usize {
        self.inner.flights.len()
    }

    fn spawn_walk(&self, lead: FlightLead<Resp>, key: String, request: Req) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let flight = Arc::clone(lead.flight());
            let ctx = flight.context();
            let outcome = inner
                .run(&ctx, &key, &request, flight.trace(), flight.generation())
                .await;
            lead.publish(outcome);
        });
    }

    /// Refresh a stale entry without anyone waiting on the result. Skipped
    /// when a walk for the key is already running.
    fn spawn_refresh(&self, key: String, request: Req) {
        let origin = format!("refresh:{}", key);
        let Some(lead) = self
            .inner
            .flights
            .try_lead(&key, &origin, || self.inner.next_generation())
        else {
            debug!("Refresh for '{}' already in flight", key);
            return;
        };

        let span = tracing::info_span!(
            "fetch_refresh",
            key = %key,
            fetch_id = %lead.flight().trace().fetch_id()
        );
        let inner = Arc::clone(&self.inner);
        tokio::spawn(
            async move {
                let flight = Arc::clone(lead.flight());
                let ctx = flight.context();
                let outcome = inner
                    .run(&ctx, &key, &request, flight.trace(), flight.generation())
                    .await;
                if let Err(error) = &outcome {
                    debug!("Background refresh for '{}' failed: {}", key, error);
                }
                lead.publish(outcome);
            }
            .instrument(span),
        );
    }
}

impl<Req, Resp> Inner<Req, Resp>
where
    Req: FetchRequest,
    Resp: Clone + Send + Sync + 'static,
{
    fn next_generation(&self) -> u64 {
        match &self.cache {
            Some(cache) => cache.next_generation(),
            None => self.flights.next_generation(),
        }
    }

    /// Walk the providers, freeze the trace and record the outcome.
    async fn run(
        &self,
        ctx: &FetchContext,
        key: &str,
        request: &Req,
        trace: &Trace,
        generation: u64,
    ) -> Outcome<Resp> {
        let (outcome, provider) = self.walk(ctx, key, request, trace, generation).await;
        let duration = trace.finish();
        self.metrics
            .record_fetch(&provider, outcome.is_ok(), duration, false);
        outcome
    }

    /// Try each eligible provider in order. Returns the outcome and the
    /// provider it is attributed to.
    async fn walk(
        &self,
        ctx: &FetchContext,
        key: &str,
        request: &Req,
        trace: &Trace,
        generation: u64,
    ) -> (Outcome<Resp>, String) {
        let hint = request.hint();
        let eligible = self.registry.eligible(&hint, trace);
        if eligible.is_empty() {
            warn!("No eligible provider for '{}': {}", key, trace.summary());
            return (
                Err(FetchError::NoEligibleProvider {
                    key: key.to_string(),
                }),
                NO_PROVIDER.to_string(),
            );
        }

        let mut failures = ProviderFailures::new();
        let mut last = NO_PROVIDER;

        for provider in eligible {
            if let Some(reason) = ctx.is_done() {
                debug!(
                    "Fetch for '{}' canceled before provider '{}': {}",
                    key,
                    provider.name(),
                    reason
                );
                return (Err(reason.into()), last.to_string());
            }

            last = provider.name();
            let (result, provider_trace) = provider.provider().fetch(ctx, request).await;
            if let Some(provider_trace) = provider_trace {
                trace.merge(provider.name(), &provider_trace);
            }

            match result {
                Ok(response) => {
                    if let Some(cache) = &self.cache {
                        cache.store(key, response.clone(), generation);
                    }
                    if !failures.is_empty() {
                        info!(
                            "'{}' answered by '{}' after {} failed provider(s)",
                            key,
                            provider.name(),
                            failures.len()
                        );
                    }
                    return (Ok(response), provider.name().to_string());
                }
                Err(error) => {
                    if error.invalidates_cache() {
                        if let Some(cache) = &self.cache {
                            if cache.evict(key) {
                                info!("Evicted '{}': {}", key, error);
                            }
                        }
                    }
                    debug!(
                        "Provider '{}' failed for '{}': {}, trying next",
                        provider.name(),
                        key,
                        error
                    );
                    failures.push(provider.name(), error);
                }
            }
        }

        warn!("All providers failed for '{}': {}", key, trace.summary());
        (
            Err(FetchError::AllProvidersFailed(failures)),
            last.to_string(),
        )
    }
}

impl<Req, Resp> Clone for Manager<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Req, Resp: Clone> fmt::Debug for Manager<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("providers", &self.inner.registry)
            .field("cache", &self.inner.cache.is_some())
            .field("in_flight", &self.inner.flights.len())
            .finish()
    }
}
