//! Construction of a [`Manager`].

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use super::Manager;
use crate::cache::CacheStore;
use crate::config::{CacheConfig, ManagerConfig, MetricsBackend};
use crate::metrics::MetricsCollector;
use crate::provider::{FetchRequest, Provider};
use crate::registry::{ProviderRegistry, RegisteredProvider};

/// Builder for [`Manager`].
///
/// Starts with no providers, no cache and in-memory metrics.
///
/// ```ignore
/// let manager = Manager::builder()
///     .provider(YahooBars::new(client.clone()), 10)
///     .provider(StooqBars::new(client), 5)
///     .cache(Duration::from_secs(60), Duration::from_secs(3600))
///     .build();
/// ```
pub struct ManagerBuilder<Req, Resp> {
    providers: Vec<RegisteredProvider<Req, Resp>>,
    cache: Option<CacheConfig>,
    metrics: MetricsBackend,
}

impl<Req, Resp> ManagerBuilder<Req, Resp>
where
    Req: FetchRequest,
    Resp: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            cache: None,
            metrics: MetricsBackend::InMemory,
        }
    }

    /// Builder with the cache and metrics options of `config`.
    pub fn from_config(config: ManagerConfig) -> Self {
        Self {
            providers: Vec::new(),
            cache: config.cache,
            metrics: config.metrics,
        }
    }

    /// Register a provider. Higher priority is tried first; equal priorities
    /// are tried in registration order.
    pub fn provider<P>(self, provider: P, priority: i32) -> Self
    where
        P: Provider<Req, Resp> + 'static,
    {
        self.shared_provider(Arc::new(provider), priority)
    }

    /// Register a provider that is also held elsewhere.
    pub fn shared_provider(mut self, provider: Arc<dyn Provider<Req, Resp>>, priority: i32) -> Self {
        self.providers
            .push(RegisteredProvider::new(provider, priority));
        self
    }

    /// Enable the cache. `hard_ttl` shorter than `fresh_ttl` is clamped.
    pub fn cache(mut self, fresh_ttl: Duration, hard_ttl: Duration) -> Self {
        self.cache = Some(CacheConfig::new(fresh_ttl, hard_ttl));
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache = Some(config);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Send metrics to an external collector.
    pub fn metrics(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = MetricsBackend::External(collector);
        self
    }

    pub fn metrics_backend(mut self, backend: MetricsBackend) -> Self {
        self.metrics = backend;
        self
    }

    /// Disable metrics.
    pub fn no_metrics(mut self) -> Self {
        self.metrics = MetricsBackend::Disabled;
        self
    }

    pub fn build(self) -> Manager<Req, Resp> {
        if self.providers.is_empty() {
            warn!("Building a fetch manager with no providers, every fetch will fail");
        }
        debug!(
            "Building fetch manager: {} provider(s), cache {:?}, metrics {:?}",
            self.providers.len(),
            self.cache,
            self.metrics
        );

        Manager::from_parts(
            ProviderRegistry::new(self.providers),
            self.cache.map(|config| CacheStore::new(config.ttl())),
            self.metrics.into_collector(),
        )
    }
}

impl<Req, Resp> Default for ManagerBuilder<Req, Resp>
where
    Req: FetchRequest,
    Resp: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
