//! In-memory metrics collector.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::warn;

use super::{average, MetricsCollector, ProviderStats, Stats};

#[derive(Debug, Default)]
struct Counters {
    total_fetches: u64,
    cache_hits: u64,
    success_fetches: u64,
    failed_fetches: u64,
    total_latency: Duration,
    per_provider: BTreeMap<String, ProviderStats>,
}

/// Process-local collector.
///
/// Totals and the per-provider breakdown live under one mutex held only for
/// the increment or the copy, so a snapshot never shows a total without its
/// matching provider entry.
#[derive(Debug, Default)]
pub struct InMemoryCollector {
    counters: Mutex<Counters>,
}

impl InMemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the counters, recovering from poison.
    fn lock_counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|poisoned| {
            warn!("Metrics mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Zero every counter.
    pub fn reset(&self) {
        *self.lock_counters() = Counters::default();
    }
}

impl MetricsCollector for InMemoryCollector {
    fn record_fetch(&self, provider: &str, success: bool, duration: Duration, cache_hit: bool) {
        let mut counters = self.lock_counters();

        counters.total_fetches += 1;
        counters.total_latency += duration;
        if success {
            counters.success_fetches += 1;
        } else {
            counters.failed_fetches += 1;
        }
        if cache_hit {
            counters.cache_hits += 1;
        }

        let entry = counters
            .per_provider
            .entry(provider.to_string())
            .or_default();
        entry.fetches += 1;
        entry.cumulative_duration += duration;
        if success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        if cache_hit {
            entry.cache_hits += 1;
        }
    }

    fn stats(&self) -> Stats {
        let counters = self.lock_counters();
        Stats {
            total_fetches: counters.total_fetches,
            cache_hits: counters.cache_hits,
            success_fetches: counters.success_fetches,
            failed_fetches: counters.failed_fetches,
            average_latency: average(counters.total_latency, counters.total_fetches),
            per_provider: counters.per_provider.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counts_successes_failures_and_hits() {
        let collector = InMemoryCollector::new();
        collector.record_fetch("YAHOO", true, Duration::from_millis(30), false);
        collector.record_fetch("YAHOO", false, Duration::from_millis(10), false);
        collector.record_fetch("cache", true, Duration::from_millis(2), true);

        let stats = collector.stats();
        assert_eq!(stats.total_fetches, 3);
        assert_eq!(stats.success_fetches, 2);
        assert_eq!(stats.failed_fetches, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.average_latency, Duration::from_millis(14));

        let yahoo = stats.provider("YAHOO").unwrap();
        assert_eq!(yahoo.fetches, 2);
        assert_eq!(yahoo.successes, 1);
        assert_eq!(yahoo.failures, 1);
        assert_eq!(yahoo.cumulative_duration, Duration::from_millis(40));
        assert_eq!(yahoo.average_latency(), Duration::from_millis(20));
    }

    #[test]
    fn test_concurrent_writers_are_never_lost() {
        let collector = Arc::new(InMemoryCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let collector = Arc::clone(&collector);
                std::thread::spawn(move || {
                    let name = format!("P{}", i % 3);
                    for n in 0..500 {
                        collector.record_fetch(&name, n % 5 != 0, Duration::from_micros(10), false);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = collector.stats();
        assert_eq!(stats.total_fetches, 4000);
        assert_eq!(stats.success_fetches + stats.failed_fetches, 4000);
        let provider_total: u64 = stats.per_provider.values().map(|p| p.fetches).sum();
        assert_eq!(provider_total, stats.total_fetches);
    }

    #[test]
    fn test_reset() {
        let collector = InMemoryCollector::new();
        collector.record_fetch("YAHOO", true, Duration::from_millis(1), false);
        collector.reset();
        assert_eq!(collector.stats(), Stats::default());
    }
}
