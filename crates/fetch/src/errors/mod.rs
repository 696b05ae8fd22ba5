//! Error types for provider calls and fetch orchestration.
//!
//! This module provides:
//! - [`ProviderError`]: what a single provider reports when it cannot answer
//! - [`ProviderFailures`]: every provider error collected during one walk
//! - [`FetchError`]: what the [`Manager`](crate::Manager) hands back to callers

mod failures;

pub use failures::{ProviderFailure, ProviderFailures};

use thiserror::Error;

use crate::context::CancelReason;

/// Errors raised by a provider while answering a request.
///
/// Provider errors are never surfaced on their own unless they belong to the
/// last eligible provider; the manager collects them into
/// [`ProviderFailures`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The upstream source does not know the requested artifact.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The upstream rejected the call because of its quota (HTTP 429).
    #[error("Rate limited")]
    RateLimited,

    /// The upstream did not answer in time.
    #[error("Timeout after {attempts} attempt(s)")]
    Timeout {
        /// Number of network attempts made before giving up.
        attempts: u32,
    },

    /// The upstream answered with an error.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Error message reported by the upstream or the transport.
        message: String,
    },

    /// The upstream answered but the payload could not be mapped.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the mapping failure.
        message: String,
    },

    /// The provider knows the value cached for this request is bad.
    ///
    /// The manager evicts the cache entry before trying the next provider.
    #[error("Cached value invalidated: {message}")]
    Invalidated {
        /// Why the cached value can no longer be trusted.
        message: String,
    },

    /// The provider stopped because its context was cancelled.
    #[error("Canceled")]
    Canceled,
}

impl ProviderError {
    /// Convenience constructor for [`ProviderError::Upstream`].
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`ProviderError::Decode`].
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether the cache entry for the request must be evicted.
    pub fn invalidates_cache(&self) -> bool {
        matches!(self, Self::Invalidated { .. })
    }
}

/// Errors returned by [`Manager::fetch`](crate::Manager::fetch).
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// No registered provider passed the eligibility checks.
    /// Raised before any network activity.
    #[error("No eligible provider for '{key}'")]
    NoEligibleProvider {
        /// Cache key of the rejected request.
        key: String,
    },

    /// Every eligible provider was tried and every one failed.
    #[error(transparent)]
    AllProvidersFailed(ProviderFailures),

    /// The caller stopped waiting, or the shared walk was cancelled between
    /// providers.
    #[error("Fetch canceled: {reason}")]
    Canceled {
        /// Whether the context was cancelled or its deadline elapsed.
        reason: CancelReason,
    },

    /// The in-flight fetch for this key ended without publishing a result.
    #[error("In-flight fetch for '{key}' was abandoned")]
    Abandoned {
        /// Cache key of the abandoned fetch.
        key: String,
    },
}

impl FetchError {
    /// True when the error means "the caller gave up", not "upstream is broken".
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }

    /// Per-provider failures, when the error is [`FetchError::AllProvidersFailed`].
    pub fn provider_failures(&self) -> Option<&ProviderFailures> {
        match self {
            Self::AllProvidersFailed(failures) => Some(failures),
            _ => None,
        }
    }
}

impl From<CancelReason> for FetchError {
    fn from(reason: CancelReason) -> Self {
        Self::Canceled { reason }
    }
}
