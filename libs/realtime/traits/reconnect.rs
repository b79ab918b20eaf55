use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// Implement this trait to control how the connection manager
/// behaves when reconnecting after a disconnection.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - Number of consecutive failed attempts so far (0-indexed)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Check if we should continue reconnecting
    fn should_reconnect(&self, attempt: usize) -> bool;
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time between reconnection attempts.
/// This is the default push behavior: `reconnect_interval` between
/// attempts, at most `max_reconnect_attempts` consecutive failures.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    /// Create a new fixed delay strategy
    ///
    /// # Arguments
    /// * `delay` - The fixed delay between reconnects
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Exponential backoff reconnection strategy
///
/// Delays between reconnection attempts grow exponentially:
/// initial_delay * 2^attempt, capped at max_delay
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `initial_delay` - The initial delay before first reconnect
    /// * `max_delay` - The maximum delay between reconnects
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        // 2^31 already dwarfs any sane max_delay
        let factor = 2u64.saturating_pow(attempt.min(31) as u32);
        let delay = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        Some(Duration::from_millis(delay.min(self.max_delay.as_millis() as u64)))
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}
