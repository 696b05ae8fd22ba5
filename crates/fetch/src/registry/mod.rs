//! Provider registry module.
//!
//! This module provides:
//! - Provider registration and priority ordering
//! - Eligibility filtering against the request's routing hint
//! - Skip reasons recorded for every provider left out of a walk

mod registry;
mod skip_reason;

pub use registry::{ProviderRegistry, RegisteredProvider};
pub use skip_reason::SkipReason;
