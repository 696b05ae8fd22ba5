//! Skip reason tracking for provider selection diagnostics.

use std::fmt;

use serde::Serialize;

/// Why a provider was left out of a walk without being called.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Provider's market coverage doesn't include the request's market.
    /// `market` is `None` when the request carried no market hint and the
    /// provider does not accept unhinted requests.
    MarketNotSupported { market: Option<String> },

    /// Provider's `can_handle` check rejected the request.
    RequestRejected,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarketNotSupported { market: Some(market) } => {
                write!(f, "market {} not supported", market)
            }
            Self::MarketNotSupported { market: None } => write!(f, "market unknown"),
            Self::RequestRejected => write!(f, "request rejected"),
        }
    }
}
