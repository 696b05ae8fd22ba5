//! Marketgate Fetch Crate
//!
//! This crate puts volatile, rate-limited third-party market data APIs
//! behind one stable, typed fetch interface.
//!
//! # Overview
//!
//! The fetch crate provides:
//! - A two-tier cache (fresh / stale / missing) with background refresh
//! - Single-flight deduplication: one upstream walk per key at a time
//! - Priority-ordered provider fallback with aggregated failures
//! - A structured trace of every network attempt behind a fetch
//! - Process-wide fetch metrics
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |     Caller       |  fetch(ctx, request)
//! +------------------+
//!          |
//!          v
//! +------------------+     fresh / stale
//! |   CacheStore     | ------------------> value (stale: refresh spawned)
//! +------------------+
//!          | missing
//!          v
//! +------------------+
//! |   FlightGroup    |  join the key's walk or lead a new one
//! +------------------+
//!          |
//!          v
//! +------------------+
//! | ProviderRegistry |  descending priority, eligibility filtering
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |    Provider      |  (adapters, outside this crate)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  Trace + Stats   |  merged attempts, one metrics outcome
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Manager`] - Fetch coordinator for one request/response type
//! - [`ManagerBuilder`] - Provider registration, cache and metrics options
//! - [`Provider`] - Contract implemented by every upstream adapter
//! - [`FetchRequest`] - Cache key and routing hint of a request
//! - [`FetchContext`] - Caller cancellation and deadline
//! - [`Trace`] - Attempts recorded for one logical fetch
//! - [`Stats`] - Metrics snapshot

pub mod cache;
pub mod config;
pub mod context;
pub mod errors;
pub mod manager;
pub mod metrics;
pub mod provider;
pub mod registry;
pub mod trace;

pub use cache::{CacheLookup, CacheStore, CacheTtl};
pub use config::{CacheConfig, ManagerConfig, MetricsBackend};
pub use context::{CancelReason, FetchContext};
pub use errors::{FetchError, ProviderError, ProviderFailure, ProviderFailures};
pub use manager::{Manager, ManagerBuilder};
pub use metrics::{InMemoryCollector, MetricsCollector, NoopCollector, ProviderStats, Stats};
pub use provider::{FetchRequest, Markets, Provider, RequestHint};
pub use registry::{ProviderRegistry, RegisteredProvider, SkipReason};
pub use trace::{
    AttemptOutcome, AttemptRecord, AttemptTarget, SkippedProvider, Trace, TraceReport,
};
