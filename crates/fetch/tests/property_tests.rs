//! Property-based tests for the cache store, metrics collector and
//! aggregated failures.
//!
//! These tests verify that universal properties hold across all valid inputs,
//! using the `proptest` crate for random test case generation.

use std::time::Duration;

use marketgate_fetch::{
    CacheLookup, CacheStore, CacheTtl, InMemoryCollector, MetricsCollector, ProviderError,
    ProviderFailures,
};
use proptest::prelude::*;

// =============================================================================
// Generators
// =============================================================================

/// Generates a (fresh, hard) TTL pair in milliseconds, in any order.
fn arb_ttl_pair() -> impl Strategy<Value = (u64, u64)> {
    (0u64..10_000_000, 0u64..10_000_000)
}

/// Generates one recorded fetch outcome: (provider index, success, cache hit,
/// duration in microseconds).
fn arb_outcome() -> impl Strategy<Value = (usize, bool, bool, u64)> {
    (0usize..4, any::<bool>(), any::<bool>(), 0u64..50_000)
}

/// Generates a provider error with a non-empty message.
fn arb_provider_error() -> impl Strategy<Value = ProviderError> {
    prop_oneof![
        "[a-z]{3,12}".prop_map(ProviderError::NotFound),
        Just(ProviderError::RateLimited),
        (1u32..5).prop_map(|attempts| ProviderError::Timeout { attempts }),
        "[a-z ]{3,20}".prop_map(|message| ProviderError::upstream(message)),
        "[a-z ]{3,20}".prop_map(|message| ProviderError::decode(message)),
    ]
}

const PROVIDERS: [&str; 4] = ["YAHOO", "ALPHA_VANTAGE", "STOOQ", "cache"];

// =============================================================================
// Cache TTL and entry invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Hard TTL is never shorter than fresh TTL after construction.
    #[test]
    fn prop_hard_ttl_never_below_fresh((fresh, hard) in arb_ttl_pair()) {
        let ttl = CacheTtl::new(Duration::from_millis(fresh), Duration::from_millis(hard));
        prop_assert!(ttl.hard() >= ttl.fresh());
        prop_assert_eq!(ttl.fresh(), Duration::from_millis(fresh));
        prop_assert_eq!(ttl.hard(), Duration::from_millis(fresh.max(hard)));
    }

    /// Every stored entry satisfies stored_at <= fresh_until <= usable_until.
    #[test]
    fn prop_entry_deadlines_are_ordered((fresh, hard) in arb_ttl_pair()) {
        let cache: CacheStore<u32> = CacheStore::new(CacheTtl::new(
            Duration::from_secs(1),
            Duration::from_secs(2),
        ));
        cache.put("k", 1, Duration::from_millis(fresh), Duration::from_millis(hard));

        let info = cache.entry_info("k").unwrap();
        prop_assert!(info.stored_at <= info.fresh_until);
        prop_assert!(info.fresh_until <= info.usable_until);
        prop_assert_eq!(cache.len(), 1);
    }

    /// A long fresh TTL reads back Fresh; a zero fresh TTL with a long hard
    /// TTL reads back Stale; a zero hard TTL reads back Missing and evicts.
    #[test]
    fn prop_lookup_state_follows_deadlines(value in any::<u32>(), long_ms in 60_000u64..10_000_000) {
        let cache: CacheStore<u32> = CacheStore::new(CacheTtl::new(
            Duration::from_secs(1),
            Duration::from_secs(2),
        ));
        let long = Duration::from_millis(long_ms);

        cache.put("fresh", value, long, long);
        cache.put("stale", value, Duration::ZERO, long);
        cache.put("gone", value, Duration::ZERO, Duration::ZERO);

        prop_assert_eq!(cache.get("fresh"), CacheLookup::Fresh(value));
        prop_assert_eq!(cache.get("stale"), CacheLookup::Stale(value));
        prop_assert_eq!(cache.get("gone"), CacheLookup::Missing);
        prop_assert!(cache.entry_info("gone").is_none());
    }

    /// Whatever order generation-tagged writes land in, the newest wins.
    #[test]
    fn prop_newest_generation_wins(order in Just((1u64..=20).collect::<Vec<_>>()).prop_shuffle()) {
        let cache: CacheStore<u64> = CacheStore::new(CacheTtl::new(
            Duration::from_secs(60),
            Duration::from_secs(120),
        ));
        for generation in &order {
            cache.store("k", *generation, *generation);
        }
        prop_assert_eq!(cache.get("k").into_value(), Some(20));
    }
}

// =============================================================================
// Metrics consistency
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Totals equal the number of recorded outcomes, and the per-provider
    /// breakdown sums to the same totals.
    #[test]
    fn prop_metrics_breakdown_sums_to_totals(outcomes in prop::collection::vec(arb_outcome(), 0..200)) {
        let collector = InMemoryCollector::new();
        for (provider, success, cache_hit, micros) in &outcomes {
            collector.record_fetch(
                PROVIDERS[*provider],
                *success,
                Duration::from_micros(*micros),
                *cache_hit,
            );
        }

        let stats = collector.stats();
        let expected_successes = outcomes.iter().filter(|o| o.1).count() as u64;
        let expected_hits = outcomes.iter().filter(|o| o.2).count() as u64;

        prop_assert_eq!(stats.total_fetches, outcomes.len() as u64);
        prop_assert_eq!(stats.success_fetches, expected_successes);
        prop_assert_eq!(stats.failed_fetches, outcomes.len() as u64 - expected_successes);
        prop_assert_eq!(stats.cache_hits, expected_hits);

        let fetches: u64 = stats.per_provider.values().map(|p| p.fetches).sum();
        let successes: u64 = stats.per_provider.values().map(|p| p.successes).sum();
        let failures: u64 = stats.per_provider.values().map(|p| p.failures).sum();
        let hits: u64 = stats.per_provider.values().map(|p| p.cache_hits).sum();
        prop_assert_eq!(fetches, stats.total_fetches);
        prop_assert_eq!(successes, stats.success_fetches);
        prop_assert_eq!(failures, stats.failed_fetches);
        prop_assert_eq!(hits, stats.cache_hits);
    }
}

// =============================================================================
// Aggregated failures
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The rendered aggregate names every provider and every error, in walk
    /// order.
    #[test]
    fn prop_aggregate_keeps_every_error(errors in prop::collection::vec(arb_provider_error(), 1..6)) {
        let mut failures = ProviderFailures::new();
        for (idx, error) in errors.iter().enumerate() {
            failures.push(format!("P{}", idx), error.clone());
        }

        let rendered = failures.to_string();
        let mut cursor = 0;
        for (idx, error) in errors.iter().enumerate() {
            let part = format!("P{} - {}", idx, error);
            let found = rendered[cursor..].find(&part);
            prop_assert!(found.is_some(), "missing '{}' in '{}'", part, rendered);
            cursor += found.unwrap_or(0) + part.len();
        }
        prop_assert_eq!(failures.len(), errors.len());
    }
}
