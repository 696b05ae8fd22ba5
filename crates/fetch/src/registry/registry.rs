//! Provider registry for ordering and filtering providers.
//!
//! The registry is built once and never mutated, so the fetch path reads it
//! without any locking:
//! - Providers are ordered by descending priority, ties by registration order
//! - Eligibility is checked against the request's market/symbol hint
//! - Every skipped provider is recorded in the walk's trace

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use super::SkipReason;
use crate::provider::{Provider, RequestHint};
use crate::trace::Trace;

/// A provider with the priority it was registered under.
pub struct RegisteredProvider<Req, Resp> {
    name: String,
    priority: i32,
    provider: Arc<dyn Provider<Req, Resp>>,
}

impl<Req, Resp> RegisteredProvider<Req, Resp> {
    pub fn new(provider: Arc<dyn Provider<Req, Resp>>, priority: i32) -> Self {
        Self {
            name: provider.name().to_string(),
            priority,
            provider,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Higher is tried first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn provider(&self) -> &Arc<dyn Provider<Req, Resp>> {
        &self.provider
    }

    /// Check the provider's coverage and `can_handle` against `hint`.
    pub fn check(&self, hint: &RequestHint<'_>) -> Result<(), SkipReason> {
        if !self.provider.supported_markets().supports(hint.market) {
            return Err(SkipReason::MarketNotSupported {
                market: hint.market.map(str::to_string),
            });
        }
        if !self.provider.can_handle(hint) {
            return Err(SkipReason::RequestRejected);
        }
        Ok(())
    }
}

impl<Req, Resp> Clone for RegisteredProvider<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            priority: self.priority,
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<Req, Resp> fmt::Debug for RegisteredProvider<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Immutable, priority-ordered set of providers for one request type.
pub struct ProviderRegistry<Req, Resp> {
    providers: Arc<[RegisteredProvider<Req, Resp>]>,
}

impl<Req, Resp> ProviderRegistry<Req, Resp> {
    /// Build the registry from providers in registration order.
    ///
    /// A provider whose name was already registered is dropped with a
    /// warning: names label metrics and traces and must be unique.
    pub fn new(registrations: Vec<RegisteredProvider<Req, Resp>>) -> Self {
        let mut providers: Vec<RegisteredProvider<Req, Resp>> =
            Vec::with_capacity(registrations.len());
        for registration in registrations {
            if providers.iter().any(|p| p.name == registration.name) {
                warn!(
                    "Provider '{}' registered twice, keeping the first registration",
                    registration.name
                );
                continue;
            }
            providers.push(registration);
        }

        // Stable sort: equal priorities keep registration order.
        providers.sort_by(|a, b| b.priority.cmp(&a.priority));

        debug!(
            "Provider order: {}",
            providers
                .iter()
                .map(|p| format!("{}({})", p.name, p.priority))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            providers: providers.into(),
        }
    }

    /// Providers that pass the eligibility checks for `hint`, in walk order.
    ///
    /// Each rejected provider is recorded in `trace` with its skip reason.
    pub fn eligible(
        &self,
        hint: &RequestHint<'_>,
        trace: &Trace,
    ) -> Vec<&RegisteredProvider<Req, Resp>> {
        let mut eligible = Vec::with_capacity(self.providers.len());
        for provider in self.providers.iter() {
            match provider.check(hint) {
                Ok(()) => eligible.push(provider),
                Err(reason) => {
                    debug!("Skipping provider '{}': {}", provider.name, reason);
                    trace.record_skip(provider.name.clone(), reason);
                }
            }
        }
        eligible
    }

    /// Registered providers in walk order.
    pub fn providers(&self) -> &[RegisteredProvider<Req, Resp>] {
        &self.providers
    }

    /// Provider names in walk order.
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl<Req, Resp> Clone for ProviderRegistry<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            providers: Arc::clone(&self.providers),
        }
    }
}

impl<Req, Resp> fmt::Debug for ProviderRegistry<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.providers.iter()).finish()
    }
}
