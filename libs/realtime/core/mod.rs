//! # Push transport
//!
//! One persistent WebSocket connection per [`ConnectionManager`]:
//!
//! - **Type-state builder**: resolver and poll source are required at compile time
//! - **Atomic state**: connection state and counters readable without locks
//! - **Heartbeat task**: keepalive frames on a fixed interval, stopped on every close
//! - **Liveness**: optional dead-socket detection when nothing is received
//! - **Bounded reconnection**: fixed or exponential delay, limited attempts

pub mod builder;
pub mod config;
pub mod connection;
pub mod connection_state;
pub mod heartbeat;
pub mod liveness;

// Re-export main types
pub use builder::{states, TransportConfigBuilder};
pub use config::{FallbackPolicy, PollSettings, PushSettings, ReconnectBackoff, TransportConfig};
pub use connection::{ConnectionEvent, ConnectionManager, Metrics};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use liveness::LivenessTracker;
