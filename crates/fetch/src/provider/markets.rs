//! Provider market coverage restrictions.

/// Markets a provider can answer for.
///
/// Uses static slices so `supported_markets()` never allocates. Linear
/// search is fine for the short market lists providers declare.
///
/// Default = "supports every market, including requests with no market hint".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Markets {
    /// If Some, only these markets are supported.
    allow: Option<&'static [&'static str]>,

    /// If Some, these markets are explicitly rejected.
    deny: Option<&'static [&'static str]>,

    /// Whether to accept requests that carry no market hint.
    allow_unknown: bool,
}

impl Default for Markets {
    fn default() -> Self {
        Self::any()
    }
}

#[inline]
fn slice_contains(list: &[&'static str], value: &str) -> bool {
    list.iter().any(|&x| x == value)
}

impl Markets {
    /// Every market, best-effort for unhinted requests.
    pub const fn any() -> Self {
        Self {
            allow: None,
            deny: None,
            allow_unknown: true,
        }
    }

    /// Only the listed markets, strict mode (rejects unhinted requests).
    pub const fn only(markets: &'static [&'static str]) -> Self {
        Self {
            allow: Some(markets),
            deny: None,
            allow_unknown: false,
        }
    }

    /// Every market except the listed ones.
    pub const fn except(markets: &'static [&'static str]) -> Self {
        Self {
            allow: None,
            deny: Some(markets),
            allow_unknown: true,
        }
    }

    /// Same coverage, overriding whether unhinted requests are accepted.
    pub const fn allow_unknown(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    /// Check if this coverage includes `market`.
    pub fn supports(&self, market: Option<&str>) -> bool {
        // Check deny list first
        if let (Some(deny), Some(m)) = (self.deny, market) {
            if slice_contains(deny, m) {
                return false;
            }
        }

        match (self.allow, market) {
            (Some(allow), Some(m)) => slice_contains(allow, m),
            (None, Some(_)) => true,
            (_, None) => self.allow_unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_accepts_everything() {
        let markets = Markets::any();
        assert!(markets.supports(Some("XNAS")));
        assert!(markets.supports(None));
        assert_eq!(Markets::default(), markets);
    }

    #[test]
    fn test_only_is_strict_by_default() {
        let markets = Markets::only(&["XNYS", "XNAS"]);
        assert!(markets.supports(Some("XNAS")));
        assert!(!markets.supports(Some("XTSE")));
        assert!(!markets.supports(None));
        assert!(markets.allow_unknown(true).supports(None));
    }

    #[test]
    fn test_except_rejects_denied_markets() {
        let markets = Markets::except(&["XLON"]);
        assert!(!markets.supports(Some("XLON")));
        assert!(markets.supports(Some("XNAS")));
        assert!(markets.supports(None));
        assert!(!markets.allow_unknown(false).supports(None));
    }
}
