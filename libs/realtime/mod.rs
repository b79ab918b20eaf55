//! # Realtime
//!
//! Realtime notification delivery with a persistent WebSocket transport and
//! an adaptive HTTP polling fallback.
//!
//! ## Features
//!
//! - **Push first**: one WebSocket connection with heartbeats and bounded reconnection
//! - **Graceful degradation**: switches to polling when push is unavailable or drops
//! - **Adaptive polling**: interval shrinks under traffic and grows when idle
//! - **Isolated fan-out**: a panicking subscriber never blocks the others
//! - **Transport agnostic consumers**: subscribers never see which transport is active
//!
//! ## Example
//!
//! ```rust,ignore
//! use realtime::{DeliveryOrchestrator, HttpPollSource, StaticEndpoint, TransportConfig};
//!
//! let config = TransportConfig::builder()
//!     .resolver(StaticEndpoint::new("wss://api.example.com/notifications/ws"))
//!     .poll_source(HttpPollSource::new("https://api.example.com/notifications/poll")?)
//!     .build()?;
//!
//! let orchestrator = DeliveryOrchestrator::new(config);
//! let subscription = orchestrator.subscribe_fn(|message| println!("{}", message));
//! orchestrator.initialize().await;
//! ```

pub mod traits;
pub mod core;
pub mod polling;
pub mod delivery;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    builder, config, connection, connection_state, heartbeat, liveness,
    builder::{states, TransportConfigBuilder},
    config::{
        FallbackPolicy, PollSettings, PushSettings, ReconnectBackoff, TransportConfig,
        DEFAULT_HEARTBEAT_PAYLOAD,
    },
    connection::{ConnectionEvent, ConnectionManager, Metrics},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    liveness::LivenessTracker,
};

// Re-export polling
pub use polling::{AdaptiveInterval, HttpPollSource, PollEvent, PollMetrics, PollingEngine};

// Re-export delivery
pub use delivery::{
    ConnectionMode, DeliveryOrchestrator, DeliveryState, Diagnostics, DispatchReport,
    HandlerRegistry, Subscriber, Unsubscribe,
};

/// Type alias for Result with DeliveryError
pub type Result<T> = std::result::Result<T, traits::DeliveryError>;
