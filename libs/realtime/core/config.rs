use crate::reconnect::{ExponentialBackoff, FixedDelay, ReconnectionStrategy};
use crate::traits::*;
use std::sync::Arc;
use std::time::Duration;

/// Keepalive frame sent on every heartbeat tick unless overridden
pub const DEFAULT_HEARTBEAT_PAYLOAD: &str = r#"{"type":"ping"}"#;

/// How the delay between push reconnection attempts evolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectBackoff {
    /// Always `reconnect_interval`
    Fixed,
    /// `reconnect_interval * 2^attempt`, capped at `max_delay`
    Exponential { max_delay: Duration },
}

/// Who decides that push is gone for good
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Fall back to polling on the first disconnect of an open connection.
    /// The connection manager's own retries never get to run.
    #[default]
    Immediate,
    /// Let the connection manager run its reconnection budget and fall back
    /// only once it reports the budget exhausted.
    AfterReconnectExhausted,
}

/// Push transport settings
#[derive(Debug, Clone)]
pub struct PushSettings {
    pub heartbeat_interval: Duration,
    pub heartbeat_payload: String,
    /// Close the socket when nothing was received for this long (None = trust close events)
    pub heartbeat_timeout: Option<Duration>,
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: usize,
    pub reconnect_backoff: ReconnectBackoff,
    /// Bound on resolve + open handshake (None = wait indefinitely)
    pub connect_timeout: Option<Duration>,
    /// How long a closing session gets to send its close frame
    pub close_grace: Duration,
    /// Upper bound on a single outbound write
    pub send_timeout: Duration,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_payload: DEFAULT_HEARTBEAT_PAYLOAD.to_string(),
            heartbeat_timeout: None,
            reconnect_interval: Duration::from_secs(3),
            max_reconnect_attempts: 10,
            reconnect_backoff: ReconnectBackoff::Fixed,
            connect_timeout: None,
            close_grace: Duration::from_secs(1),
            send_timeout: Duration::from_secs(10),
        }
    }
}

impl PushSettings {
    /// Build the reconnection strategy described by these settings
    pub fn reconnect_strategy(&self) -> Box<dyn ReconnectionStrategy> {
        let max_attempts = Some(self.max_reconnect_attempts);
        match self.reconnect_backoff {
            ReconnectBackoff::Fixed => Box::new(FixedDelay::new(self.reconnect_interval, max_attempts)),
            ReconnectBackoff::Exponential { max_delay } => Box::new(ExponentialBackoff::new(
                self.reconnect_interval,
                max_delay,
                max_attempts,
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval.is_zero() {
            return Err(DeliveryError::Configuration(
                "heartbeat_interval must be greater than 0".to_string(),
            ));
        }
        if self.reconnect_interval.is_zero() {
            return Err(DeliveryError::Configuration(
                "reconnect_interval must be greater than 0".to_string(),
            ));
        }
        if self.send_timeout.is_zero() {
            return Err(DeliveryError::Configuration(
                "send_timeout must be greater than 0".to_string(),
            ));
        }
        if matches!(self.heartbeat_timeout, Some(t) if t.is_zero()) {
            return Err(DeliveryError::Configuration(
                "heartbeat_timeout must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Polling fallback settings
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub base_interval: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub adaptive: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(30),
            min_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(120),
            adaptive: true,
        }
    }
}

impl PollSettings {
    pub fn validate(&self) -> Result<()> {
        if self.min_interval.is_zero() {
            return Err(DeliveryError::Configuration(
                "min_interval must be greater than 0".to_string(),
            ));
        }
        if self.min_interval > self.max_interval {
            return Err(DeliveryError::Configuration(format!(
                "min_interval ({:?}) must not exceed max_interval ({:?})",
                self.min_interval, self.max_interval
            )));
        }
        Ok(())
    }
}

/// Everything the delivery layer needs, fixed at construction
///
/// Built with [`TransportConfig::builder`], which requires a resolver and a
/// poll source before `build()` is available.
#[derive(Clone)]
pub struct TransportConfig {
    pub(crate) resolver: Arc<dyn EndpointResolver>,
    pub(crate) poll_source: Arc<dyn PollSource>,
    pub(crate) push: PushSettings,
    pub(crate) poll: PollSettings,
    pub(crate) fallback: FallbackPolicy,
}

impl TransportConfig {
    pub fn push(&self) -> &PushSettings {
        &self.push
    }

    pub fn poll(&self) -> &PollSettings {
        &self.poll
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("push", &self.push)
            .field("poll", &self.poll)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PushSettings::default().validate().is_ok());
        assert!(PollSettings::default().validate().is_ok());
    }

    #[test]
    fn test_shutdown_timeouts_default_and_validate() {
        let settings = PushSettings::default();
        assert_eq!(settings.close_grace, Duration::from_secs(1));
        assert_eq!(settings.send_timeout, Duration::from_secs(10));

        let settings = PushSettings {
            send_timeout: Duration::ZERO,
            ..PushSettings::default()
        };
        assert!(matches!(settings.validate(), Err(DeliveryError::Configuration(_))));
    }

    #[test]
    fn test_poll_bounds_validation() {
        let settings = PollSettings {
            min_interval: Duration::from_secs(60),
            max_interval: Duration::from_secs(30),
            ..PollSettings::default()
        };
        assert!(matches!(settings.validate(), Err(DeliveryError::Configuration(_))));

        let settings = PollSettings {
            min_interval: Duration::ZERO,
            ..PollSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_strategy_follows_backoff() {
        let mut settings = PushSettings {
            reconnect_interval: Duration::from_millis(100),
            max_reconnect_attempts: 3,
            ..PushSettings::default()
        };
        let fixed = settings.reconnect_strategy();
        assert_eq!(fixed.next_delay(2), Some(Duration::from_millis(100)));
        assert_eq!(fixed.next_delay(3), None);

        settings.reconnect_backoff = ReconnectBackoff::Exponential {
            max_delay: Duration::from_millis(250),
        };
        let exponential = settings.reconnect_strategy();
        assert_eq!(exponential.next_delay(1), Some(Duration::from_millis(200)));
        assert_eq!(exponential.next_delay(2), Some(Duration::from_millis(250)));
    }
}
