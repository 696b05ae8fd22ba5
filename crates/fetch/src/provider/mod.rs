//! Provider abstractions.
//!
//! This module contains:
//! - The [`Provider`] trait that every upstream adapter implements
//! - The [`FetchRequest`] trait and [`RequestHint`] routing hint
//! - [`Markets`] coverage used for coarse eligibility filtering
//!
//! Concrete adapters live outside this crate. They receive the caller's
//! [`FetchContext`](crate::FetchContext) so they can stop their own network
//! calls, and they never touch the cache or metrics.

mod markets;
mod traits;

pub use markets::Markets;
pub use traits::{FetchRequest, Provider, RequestHint};
