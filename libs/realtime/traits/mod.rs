//! # Realtime Traits
//!
//! Core traits and types shared by both transports and the orchestrator:
//!
//! - **DeliveryError**: Tagged failure taxonomy
//! - **ReconnectionStrategy**: Control push reconnection behavior
//! - **EndpointResolver**: Resolve the push transport URL
//! - **PollSource**: Fetch one batch of pending notifications
//! - **NotificationMessage / Frame**: Opaque payload and push wire frames

pub mod error;
pub mod frame;
pub mod poll_source;
pub mod reconnect;
pub mod resolver;

// Re-export commonly used types
pub use error::{DeliveryError, Result};
pub use frame::{Frame, NotificationMessage, NOTIFICATION_FRAME};
pub use poll_source::PollSource;
pub use reconnect::{ExponentialBackoff, FixedDelay, ReconnectionStrategy};
pub use resolver::{EndpointResolver, FnResolver, StaticEndpoint};
