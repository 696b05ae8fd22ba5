//! Manager configuration.
//!
//! Recognized options: cache enablement with its two TTLs, and the metrics
//! backend. Providers are registered in code through
//! [`ManagerBuilder`](crate::ManagerBuilder).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::cache::CacheTtl;
use crate::metrics::{InMemoryCollector, MetricsCollector, NoopCollector};

pub const DEFAULT_FRESH_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_HARD_TTL: Duration = Duration::from_secs(60 * 60);

/// Fresh and hard TTL for the response cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    ttl: CacheTtl,
}

impl CacheConfig {
    /// `hard_ttl` shorter than `fresh_ttl` is clamped to `fresh_ttl`.
    pub fn new(fresh_ttl: Duration, hard_ttl: Duration) -> Self {
        Self {
            ttl: CacheTtl::new(fresh_ttl, hard_ttl),
        }
    }

    pub fn fresh_ttl(&self) -> Duration {
        self.ttl.fresh()
    }

    pub fn hard_ttl(&self) -> Duration {
        self.ttl.hard()
    }

    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRESH_TTL, DEFAULT_HARD_TTL)
    }
}

/// Where fetch metrics go.
#[derive(Clone, Default)]
pub enum MetricsBackend {
    /// Metrics are dropped.
    Disabled,
    /// Process-local counters, readable through `Manager::stats`.
    #[default]
    InMemory,
    /// A collector supplied by the host application.
    External(Arc<dyn MetricsCollector>),
}

impl MetricsBackend {
    pub fn into_collector(self) -> Arc<dyn MetricsCollector> {
        match self {
            Self::Disabled => Arc::new(NoopCollector),
            Self::InMemory => Arc::new(InMemoryCollector::new()),
            Self::External(collector) => collector,
        }
    }
}

impl fmt::Debug for MetricsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Disabled"),
            Self::InMemory => write!(f, "InMemory"),
            Self::External(_) => write!(f, "External(..)"),
        }
    }
}

/// Construction-time options for a [`Manager`](crate::Manager).
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// `None` disables caching.
    pub cache: Option<CacheConfig>,
    pub metrics: MetricsBackend,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cache: Some(CacheConfig::default()),
            metrics: MetricsBackend::InMemory,
        }
    }
}

impl ManagerConfig {
    /// Load configuration from `MARKETGATE_*` environment variables.
    ///
    /// - `MARKETGATE_CACHE_ENABLED`: `true`/`false`, default `true`
    /// - `MARKETGATE_CACHE_FRESH_TTL_MS`: default 60000
    /// - `MARKETGATE_CACHE_HARD_TTL_MS`: default 3600000
    /// - `MARKETGATE_METRICS`: `none` or `memory`, default `memory`
    ///
    /// Missing or unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let cache_enabled = lookup("MARKETGATE_CACHE_ENABLED")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(true);
        let fresh_ms: u64 = lookup("MARKETGATE_CACHE_FRESH_TTL_MS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_FRESH_TTL.as_millis() as u64);
        let hard_ms: u64 = lookup("MARKETGATE_CACHE_HARD_TTL_MS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_HARD_TTL.as_millis() as u64);
        let metrics = match lookup("MARKETGATE_METRICS")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("none") | Some("off") => MetricsBackend::Disabled,
            Some("memory") | None => MetricsBackend::InMemory,
            Some(other) => {
                warn!(
                    "Unknown MARKETGATE_METRICS value '{}', using in-memory metrics",
                    other
                );
                MetricsBackend::InMemory
            }
        };

        Self {
            cache: cache_enabled.then(|| {
                CacheConfig::new(Duration::from_millis(fresh_ms), Duration::from_millis(hard_ms))
            }),
            metrics,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ManagerConfig::from_lookup(lookup(&[]));
        let cache = config.cache.unwrap();
        assert_eq!(cache.fresh_ttl(), Duration::from_secs(60));
        assert_eq!(cache.hard_ttl(), Duration::from_secs(3600));
        assert!(matches!(config.metrics, MetricsBackend::InMemory));
    }

    #[test]
    fn test_reads_overrides() {
        let config = ManagerConfig::from_lookup(lookup(&[
            ("MARKETGATE_CACHE_FRESH_TTL_MS", "1500"),
            ("MARKETGATE_CACHE_HARD_TTL_MS", "90000"),
            ("MARKETGATE_METRICS", "none"),
        ]));
        let cache = config.cache.unwrap();
        assert_eq!(cache.fresh_ttl(), Duration::from_millis(1500));
        assert_eq!(cache.hard_ttl(), Duration::from_millis(90000));
        assert!(matches!(config.metrics, MetricsBackend::Disabled));
    }

    #[test]
    fn test_cache_can_be_disabled() {
        let config = ManagerConfig::from_lookup(lookup(&[("MARKETGATE_CACHE_ENABLED", "false")]));
        assert!(config.cache.is_none());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ManagerConfig::from_lookup(lookup(&[
            ("MARKETGATE_CACHE_ENABLED", "maybe"),
            ("MARKETGATE_CACHE_FRESH_TTL_MS", "soon"),
            ("MARKETGATE_METRICS", "prometheus"),
        ]));
        assert_eq!(config.cache.unwrap().fresh_ttl(), DEFAULT_FRESH_TTL);
        assert!(matches!(config.metrics, MetricsBackend::InMemory));
    }

    #[test]
    fn test_hard_ttl_clamped() {
        let config = CacheConfig::new(Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(config.hard_ttl(), Duration::from_secs(30));
    }
}
