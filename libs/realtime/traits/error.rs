use std::time::Duration;
use thiserror::Error;

/// Main error type for realtime delivery
///
/// Every failure in the delivery layer is reported as one of these variants,
/// either as the `Err` of an operation or inside a transport event. Callers
/// match on the variant instead of inspecting messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The push endpoint could not be resolved
    #[error("Endpoint resolution failed: {0}")]
    Resolution(String),

    /// Opening the push connection failed (handshake, TCP, TLS)
    #[error("Connection failed: {0}")]
    Connection(String),

    /// An operation did not complete within its configured timeout
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// An established connection was lost
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// A polling request failed (network or non-success status)
    #[error("Poll request failed: {0}")]
    Poll(String),

    /// A frame or poll response could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Reconnection budget exhausted
    #[error("Reconnection failed after {attempts} attempts: {reason}")]
    ReconnectionFailed { attempts: usize, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DeliveryError {
    /// Whether this failure means the push transport cannot be used right now.
    ///
    /// Resolution, connection and timeout failures all trigger the same
    /// immediate fallback to polling.
    pub fn is_push_unavailable(&self) -> bool {
        matches!(
            self,
            DeliveryError::Resolution(_) | DeliveryError::Connection(_) | DeliveryError::Timeout(_)
        )
    }
}

/// Result type for realtime operations
pub type Result<T> = std::result::Result<T, DeliveryError>;
