//! Provider and request trait definitions.
//!
//! This module defines the [`Provider`] trait that every data source adapter
//! implements, and the [`FetchRequest`] trait the manager needs from a
//! request type.

use async_trait::async_trait;

use crate::context::FetchContext;
use crate::errors::ProviderError;
use crate::trace::Trace;

use super::markets::Markets;

/// Routing hint carried by a request, used only for provider filtering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestHint<'a> {
    /// Target market identifier (e.g. a MIC such as "XNAS").
    pub market: Option<&'a str>,
    /// Symbol in whatever format the caller uses.
    pub symbol: Option<&'a str>,
}

impl<'a> RequestHint<'a> {
    /// A hint with no market and no symbol.
    pub const fn none() -> Self {
        Self {
            market: None,
            symbol: None,
        }
    }

    pub const fn market(market: &'a str) -> Self {
        Self {
            market: Some(market),
            symbol: None,
        }
    }

    pub const fn with_symbol(mut self, symbol: &'a str) -> Self {
        self.symbol = Some(symbol);
        self
    }
}

/// A request the manager can cache and route.
///
/// The manager never inspects request fields beyond these two methods.
pub trait FetchRequest: Send + Sync + 'static {
    /// Deterministic cache key. Requests with equal keys share one cache
    /// entry and one in-flight fetch.
    fn cache_key(&self) -> String;

    /// Market/symbol hint for provider filtering.
    fn hint(&self) -> RequestHint<'_> {
        RequestHint::none()
    }
}

/// Trait for data providers.
///
/// Implement this trait to add support for a new upstream source. The
/// provider makes its own network calls (through whatever client it owns)
/// and reports them in its own [`Trace`]; the manager merges that trace as
/// an opaque sequence.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use marketgate_fetch::{FetchContext, Markets, Provider, ProviderError, Trace};
///
/// struct StooqBars;
///
/// #[async_trait]
/// impl Provider<BarsRequest, Vec<Bar>> for StooqBars {
///     fn name(&self) -> &str {
///         "STOOQ"
///     }
///
///     fn supported_markets(&self) -> Markets {
///         Markets::only(&["XNYS", "XNAS"])
///     }
///
///     async fn fetch(
///         &self,
///         ctx: &FetchContext,
///         request: &BarsRequest,
///     ) -> (Result<Vec<Bar>, ProviderError>, Option<Trace>) {
///         // ... call the upstream, record attempts, map the payload
///     }
/// }
/// ```
#[async_trait]
pub trait Provider<Req, Resp>: Send + Sync {
    /// Unique, stable identifier.
    ///
    /// Should be a constant string like "YAHOO", "ALPHA_VANTAGE", etc.
    /// Used for metrics labels and trace tagging.
    fn name(&self) -> &str;

    /// Coarse eligibility filter on the request's market hint.
    fn supported_markets(&self) -> Markets {
        Markets::any()
    }

    /// Fine-grained eligibility check, e.g. symbol format matching.
    fn can_handle(&self, _hint: &RequestHint<'_>) -> bool {
        true
    }

    /// Answer `request`.
    ///
    /// A trace may be returned alongside an error so failed attempts stay
    /// observable. `None` means the provider recorded nothing. The manager
    /// labels every returned attempt with [`name`](Self::name).
    async fn fetch(
        &self,
        ctx: &FetchContext,
        request: &Req,
    ) -> (Result<Resp, ProviderError>, Option<Trace>);
}
