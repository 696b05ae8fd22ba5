//! One underlying network attempt.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What an attempt was sent to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttemptTarget {
    pub method: String,
    pub url: String,
}

impl AttemptTarget {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }
}

impl fmt::Display for AttemptTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// How an attempt ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The upstream answered (any status).
    Response { status: u16, bytes: usize },
    /// The transport failed before a response arrived.
    Error { message: String },
}

/// Immutable record of one network attempt made by a provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// Provider that made the attempt. Set by the manager when it merges the
    /// provider's trace.
    pub provider: String,
    pub target: AttemptTarget,
    pub outcome: AttemptOutcome,
    pub duration: Duration,
    /// 0 for the first try, incremented by the network client on each retry.
    pub retry_index: u32,
    pub started_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn new(target: AttemptTarget, outcome: AttemptOutcome, duration: Duration) -> Self {
        let started_at = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| Utc::now().checked_sub_signed(d))
            .unwrap_or_else(Utc::now);
        Self {
            provider: String::new(),
            target,
            outcome,
            duration,
            retry_index: 0,
            started_at,
        }
    }

    pub fn response(target: AttemptTarget, status: u16, bytes: usize, duration: Duration) -> Self {
        Self::new(target, AttemptOutcome::Response { status, bytes }, duration)
    }

    pub fn error(target: AttemptTarget, message: impl Into<String>, duration: Duration) -> Self {
        Self::new(
            target,
            AttemptOutcome::Error {
                message: message.into(),
            },
            duration,
        )
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_retry_index(mut self, retry_index: u32) -> Self {
        self.retry_index = retry_index;
        self
    }

    /// A 2xx response.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Response { status, .. } if (200..300).contains(&status))
    }
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Response { status, .. } => write!(
                f,
                "{} #{} {} -> {} in {:?}",
                self.provider, self.retry_index, self.target, status, self.duration
            ),
            AttemptOutcome::Error { message } => write!(
                f,
                "{} #{} {} -> error: {} in {:?}",
                self.provider, self.retry_index, self.target, message, self.duration
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_2xx() {
        let target = AttemptTarget::get("https://example.test/bars");
        let ok = AttemptRecord::response(target.clone(), 200, 512, Duration::from_millis(12));
        let throttled = AttemptRecord::response(target.clone(), 429, 0, Duration::from_millis(3));
        let failed = AttemptRecord::error(target, "connection reset", Duration::from_millis(1));

        assert!(ok.is_success());
        assert!(!throttled.is_success());
        assert!(!failed.is_success());
    }

    #[test]
    fn test_display_mentions_retry_index_and_status() {
        let record = AttemptRecord::response(
            AttemptTarget::get("https://example.test/q"),
            503,
            0,
            Duration::from_millis(5),
        )
        .with_provider("YAHOO")
        .with_retry_index(2);

        let rendered = record.to_string();
        assert!(rendered.starts_with("YAHOO #2 GET https://example.test/q -> 503"));
    }

    #[test]
    fn test_serializes_outcome_with_kind_tag() {
        let record = AttemptRecord::error(
            AttemptTarget::get("https://example.test/q"),
            "timeout",
            Duration::from_millis(5),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["outcome"]["kind"], "error");
        assert_eq!(json["outcome"]["message"], "timeout");
        assert_eq!(json["retry_index"], 0);
    }
}
