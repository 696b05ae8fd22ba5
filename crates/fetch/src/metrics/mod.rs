//! Runtime metrics for the fetch manager.
//!
//! The manager records one outcome per logical fetch through a
//! [`MetricsCollector`] injected at construction. Two collectors ship with the
//! crate:
//!
//! - [`NoopCollector`] - metrics disabled, records nothing
//! - [`InMemoryCollector`] - process-local counters, for standalone use
//!
//! Any other backend implements the trait and is passed to
//! [`ManagerBuilder::metrics`](crate::ManagerBuilder::metrics).

mod memory;

pub use memory::InMemoryCollector;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

/// Provider label used for outcomes served from the cache.
pub const CACHE_PROVIDER: &str = "cache";

/// Provider label used when no provider was eligible.
pub const NO_PROVIDER: &str = "none";

/// Sink for fetch outcomes. Must tolerate unbounded concurrent calls.
pub trait MetricsCollector: Send + Sync {
    /// Record one logical fetch outcome.
    fn record_fetch(&self, provider: &str, success: bool, duration: Duration, cache_hit: bool);

    /// Point-in-time copy of the counters.
    fn stats(&self) -> Stats;
}

/// Metrics disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCollector;

impl MetricsCollector for NoopCollector {
    #[inline]
    fn record_fetch(&self, _provider: &str, _success: bool, _duration: Duration, _cache_hit: bool) {
    }

    fn stats(&self) -> Stats {
        Stats::default()
    }
}

/// Counters for a single provider label.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub fetches: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub cumulative_duration: Duration,
}

impl ProviderStats {
    pub fn average_latency(&self) -> Duration {
        average(self.cumulative_duration, self.fetches)
    }
}

/// Snapshot of the collector's counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_fetches: u64,
    pub cache_hits: u64,
    pub success_fetches: u64,
    pub failed_fetches: u64,
    pub average_latency: Duration,
    pub per_provider: BTreeMap<String, ProviderStats>,
}

impl Stats {
    pub fn provider(&self, name: &str) -> Option<&ProviderStats> {
        self.per_provider.get(name)
    }

    /// Share of fetches served from the cache, in `[0, 1]`.
    pub fn cache_hit_ratio(&self) -> f64 {
        if self.total_fetches == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_fetches as f64
        }
    }
}

pub(crate) fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
