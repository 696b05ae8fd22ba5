//! Aggregated provider failures for one provider walk.

use std::fmt;

use super::ProviderError;

/// One provider's failure, tagged with the provider name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

/// Every provider failure of a walk, in the order providers were tried.
///
/// Errors are joined, never overwritten: the `Display` output names each
/// provider and why it failed, and each error stays individually inspectable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFailures {
    failures: Vec<ProviderFailure>,
}

impl ProviderFailures {
    pub fn new() -> Self {
        Self {
            failures: Vec::new(),
        }
    }

    pub fn push(&mut self, provider: impl Into<String>, error: ProviderError) {
        self.failures.push(ProviderFailure {
            provider: provider.into(),
            error,
        });
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderFailure> {
        self.failures.iter()
    }

    /// Error reported by `provider`, if it was tried and failed.
    pub fn get(&self, provider: &str) -> Option<&ProviderError> {
        self.failures
            .iter()
            .find(|f| f.provider == provider)
            .map(|f| &f.error)
    }

    /// Provider names in walk order.
    pub fn providers(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.provider.as_str()).collect()
    }

    /// The last failure recorded, which is the one `source()` exposes.
    pub fn last(&self) -> Option<&ProviderFailure> {
        self.failures.last()
    }
}

impl fmt::Display for ProviderFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "All providers failed")?;
        for (idx, failure) in self.failures.iter().enumerate() {
            let sep = if idx == 0 { ": " } else { "; " };
            write!(f, "{}{} - {}", sep, failure.provider, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProviderFailures {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .last()
            .map(|f| &f.error as &(dyn std::error::Error + 'static))
    }
}

impl<'a> IntoIterator for &'a ProviderFailures {
    type Item = &'a ProviderFailure;
    type IntoIter = std::slice::Iter<'a, ProviderFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.iter()
    }
}
