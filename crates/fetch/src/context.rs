//! Caller-supplied cancellation and deadline.
//!
//! A [`FetchContext`] governs how long one caller is willing to wait. It is
//! passed to providers so they can stop their own network calls, but it never
//! cancels work shared with other callers of the same key.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context is done.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CancelReason {
    /// The token was cancelled explicitly.
    Canceled,
    /// The deadline elapsed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canceled => write!(f, "canceled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Cancellation token plus optional deadline for one fetch.
#[derive(Clone, Debug, Default)]
pub struct FetchContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl FetchContext {
    /// A context that is only done when [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context bound to an existing token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_in(timeout)
    }

    /// Same token, with a deadline `timeout` from now.
    ///
    /// An earlier existing deadline is kept. A timeout too large to
    /// represent leaves the deadline unchanged.
    pub fn deadline_in(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.deadline_at(deadline),
            None => self,
        }
    }

    /// Same token, with the given deadline (earliest wins).
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// A context cancelled whenever this one is, with its own extra token.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// `Some(reason)` if the context is already done.
    pub fn is_done(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline elapses.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => CancelReason::Canceled,
                    _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CancelReason::Canceled
            }
        }
    }
}
