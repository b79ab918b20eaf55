//! Inbound liveness tracking
//!
//! Detects push connections that went silent without ever emitting a close
//! event. Any inbound frame (notification, pong, anything) counts as a sign
//! of life. When nothing arrives within the timeout the session treats the
//! socket as dead and takes the normal close path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Tracks the last time the server was heard from
///
/// Timestamps are stored as milliseconds since an internal epoch so they can
/// live in an atomic.
pub struct LivenessTracker {
    epoch: Instant,
    last_inbound_ms: AtomicU64,
    timeout: Duration,
}

impl LivenessTracker {
    /// Start tracking. The open handshake counts as the first sign of life.
    pub fn new(timeout: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            last_inbound_ms: AtomicU64::new(0),
            timeout,
        }
    }

    /// Record that a frame was just received
    pub fn record_inbound(&self) {
        let ms = self.epoch.elapsed().as_millis() as u64;
        self.last_inbound_ms.store(ms, Ordering::Release);
    }

    /// Instant after which the connection is considered dead
    pub fn deadline(&self) -> Instant {
        let last = Duration::from_millis(self.last_inbound_ms.load(Ordering::Acquire));
        self.epoch + last + self.timeout
    }

    pub fn is_healthy(&self) -> bool {
        Instant::now() < self.deadline()
    }

    pub fn time_since_last_inbound(&self) -> Duration {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        Duration::from_millis(now_ms.saturating_sub(self.last_inbound_ms.load(Ordering::Acquire)))
    }
}
