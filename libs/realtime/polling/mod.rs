//! # Polling fallback
//!
//! Used when the push transport is unavailable. A [`PollingEngine`] calls a
//! [`PollSource`](crate::PollSource) on an [`AdaptiveInterval`] and emits
//! non-empty batches as events.

pub mod engine;
pub mod http;
pub mod interval;

pub use engine::{PollEvent, PollMetrics, PollingEngine};
pub use http::HttpPollSource;
pub use interval::AdaptiveInterval;
