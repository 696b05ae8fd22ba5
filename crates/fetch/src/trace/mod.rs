//! Structured record of every network attempt behind one logical fetch.
//!
//! A [`Trace`] is append-only while a fetch runs and frozen once
//! [`finish`](Trace::finish) is called. It is shared by reference between the
//! provider walk and the callers waiting on it, so all mutation goes through
//! an internal lock and callers only ever receive frozen snapshots.
//!
//! ```text
//! Trace (fetch:bars:AAPL)
//!   ├─ attempt YAHOO #0  GET ...  -> 503
//!   ├─ attempt YAHOO #1  GET ...  -> 503
//!   ├─ attempt ALPHA #0  GET ...  -> 200
//!   └─ skipped STOOQ (market not supported)
//! ```

mod attempt;

pub use attempt::{AttemptOutcome, AttemptRecord, AttemptTarget};

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::registry::SkipReason;

/// A provider left out of the walk by the eligibility checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedProvider {
    pub provider: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
struct TraceState {
    attempts: Vec<AttemptRecord>,
    skipped: Vec<SkippedProvider>,
    /// Sum of merged child trace durations.
    merged: Duration,
    /// Frozen total, set by the first `finish()`.
    finished: Option<Duration>,
}

/// Ordered, append-only log of attempts for one logical fetch.
#[derive(Debug)]
pub struct Trace {
    fetch_id: Uuid,
    origin: String,
    started_at: DateTime<Utc>,
    started: Instant,
    state: Mutex<TraceState>,
}

impl Trace {
    /// Start an empty trace tagged with an origin label.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            fetch_id: Uuid::now_v7(),
            origin: origin.into(),
            started_at: Utc::now(),
            started: Instant::now(),
            state: Mutex::new(TraceState::default()),
        }
    }

    /// An already finished trace with no attempts, returned for cache hits.
    pub fn empty(origin: impl Into<String>) -> Self {
        let trace = Self::new(origin);
        trace.lock_state().finished = Some(Duration::ZERO);
        trace
    }

    fn lock_state(&self) -> MutexGuard<'_, TraceState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Trace mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn fetch_id(&self) -> Uuid {
        self.fetch_id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Append one attempt. Ignored once the trace is finished.
    pub fn add_attempt(&self, record: AttemptRecord) {
        let mut state = self.lock_state();
        if state.finished.is_some() {
            debug!(
                "Trace {} already finished, dropping attempt {}",
                self.fetch_id, record
            );
            return;
        }
        state.attempts.push(record);
    }

    /// Note a provider the walk did not try. Ignored once finished.
    pub fn record_skip(&self, provider: impl Into<String>, reason: SkipReason) {
        let mut state = self.lock_state();
        if state.finished.is_some() {
            return;
        }
        state.skipped.push(SkippedProvider {
            provider: provider.into(),
            reason,
        });
    }

    /// Append a provider's own trace after this one's attempts.
    ///
    /// Every merged attempt is tagged with `provider`, replacing any label the
    /// provider set itself. The child's duration is added to the time this
    /// trace must cover.
    pub fn merge(&self, provider: &str, child: &Trace) {
        let (attempts, duration) = {
            let child_state = child.lock_state();
            let duration = child_state
                .finished
                .unwrap_or_else(|| child.started.elapsed().max(child_state.merged));
            (child_state.attempts.clone(), duration)
        };

        let mut state = self.lock_state();
        if state.finished.is_some() {
            debug!(
                "Trace {} already finished, dropping merge from '{}'",
                self.fetch_id, provider
            );
            return;
        }
        state.attempts.extend(attempts.into_iter().map(|mut record| {
            record.provider = provider.to_string();
            record
        }));
        state.merged += duration;
    }

    /// Freeze the total duration. Idempotent: later calls return the value
    /// frozen by the first one.
    pub fn finish(&self) -> Duration {
        let mut state = self.lock_state();
        if let Some(total) = state.finished {
            return total;
        }
        let total = self.started.elapsed().max(state.merged);
        state.finished = Some(total);
        total
    }

    pub fn is_finished(&self) -> bool {
        self.lock_state().finished.is_some()
    }

    pub fn total_attempts(&self) -> usize {
        self.lock_state().attempts.len()
    }

    /// Frozen total once finished, time elapsed so far otherwise.
    pub fn total_duration(&self) -> Duration {
        let state = self.lock_state();
        state
            .finished
            .unwrap_or_else(|| self.started.elapsed().max(state.merged))
    }

    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.lock_state().attempts.clone()
    }

    pub fn skipped(&self) -> Vec<SkippedProvider> {
        self.lock_state().skipped.clone()
    }

    /// Attempts that did not end in a 2xx response.
    pub fn failed_attempts(&self) -> usize {
        self.lock_state()
            .attempts
            .iter()
            .filter(|a| !a.is_success())
            .count()
    }

    /// Distinct providers in the order they first appear in the attempts.
    pub fn providers(&self) -> Vec<String> {
        let state = self.lock_state();
        let mut providers: Vec<String> = Vec::new();
        for attempt in &state.attempts {
            if !providers.iter().any(|p| p == &attempt.provider) {
                providers.push(attempt.provider.clone());
            }
        }
        providers
    }

    /// Independent copy sharing the same fetch id.
    pub fn snapshot(&self) -> Trace {
        let state = self.lock_state();
        Trace {
            fetch_id: self.fetch_id,
            origin: self.origin.clone(),
            started_at: self.started_at,
            started: self.started,
            state: Mutex::new(TraceState {
                attempts: state.attempts.clone(),
                skipped: state.skipped.clone(),
                merged: state.merged,
                finished: state.finished,
            }),
        }
    }

    /// Serializable view of the trace.
    pub fn report(&self) -> TraceReport {
        let state = self.lock_state();
        TraceReport {
            fetch_id: self.fetch_id,
            origin: self.origin.clone(),
            started_at: self.started_at,
            total_time: state
                .finished
                .unwrap_or_else(|| self.started.elapsed().max(state.merged)),
            finished: state.finished.is_some(),
            attempts: state.attempts.clone(),
            skipped: state.skipped.clone(),
        }
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        let state = self.lock_state();
        let attempts = state.attempts.iter().map(|a| match &a.outcome {
            AttemptOutcome::Response { status, .. } if a.is_success() => {
                format!("{}: OK ({})", a.provider, status)
            }
            AttemptOutcome::Response { status, .. } => {
                format!("{}: HTTP {}", a.provider, status)
            }
            AttemptOutcome::Error { message } => format!("{}: ERROR ({})", a.provider, message),
        });
        let skipped = state
            .skipped
            .iter()
            .map(|s| format!("{}: SKIPPED ({})", s.provider, s.reason));

        let parts: Vec<String> = attempts.chain(skipped).collect();
        if parts.is_empty() {
            format!("{}: no attempts", self.origin)
        } else {
            parts.join(" -> ")
        }
    }
}

impl Clone for Trace {
    fn clone(&self) -> Self {
        self.snapshot()
    }
}

/// Frozen, serializable form of a [`Trace`].
#[derive(Clone, Debug, Serialize)]
pub struct TraceReport {
    pub fetch_id: Uuid,
    pub origin: String,
    pub started_at: DateTime<Utc>,
    pub total_time: Duration,
    pub finished: bool,
    pub attempts: Vec<AttemptRecord>,
    pub skipped: Vec<SkippedProvider>,
}
