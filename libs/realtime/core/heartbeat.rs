//! Heartbeat mechanism for the push connection
//!
//! # Architecture
//!
//! The heartbeat runs as a dedicated Tokio task, independent of frame
//! processing:
//!
//! ```text
//! ┌─────────────────────┐
//! │  Heartbeat Task     │
//! │  (Tokio spawn)      │
//! │                     │
//! │  Every interval:    │
//! │  1. Wait for tick   │
//! │  2. Emit payload ───┼──> Unbounded Channel ──> Session Loop ──> WebSocket
//! │  3. Repeat          │
//! └─────────────────────┘
//! ```
//!
//! The [`Heartbeat`] handle owns the task. Dropping it aborts the task and
//! clears the shared "active" flag, so a torn-down session can never leave a
//! keepalive timer behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Heartbeat task that emits the keepalive payload at a fixed interval
///
/// The task:
/// 1. Waits for the first interval (skips the immediate first tick)
/// 2. On each tick, pushes the payload into the channel
/// 3. Exits when the receiving side is gone
pub async fn heartbeat_task(interval: Duration, payload: String, heartbeat_tx: mpsc::UnboundedSender<String>) {
    let mut ticker = tokio::time::interval(interval);
    // Skip the first immediate tick - wait for the first interval
    ticker.tick().await;
    // If we miss ticks due to slow processing, skip them rather than bursting
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    debug!("Heartbeat task started with interval: {:?}", interval);

    loop {
        ticker.tick().await;

        if heartbeat_tx.send(payload.clone()).is_err() {
            debug!("Heartbeat channel closed, shutting down heartbeat task");
            break;
        }
    }

    debug!("Heartbeat task exiting");
}

/// Owned handle to a running heartbeat task
pub struct Heartbeat {
    handle: JoinHandle<()>,
    rx: mpsc::UnboundedReceiver<String>,
    active: Arc<AtomicBool>,
}

impl Heartbeat {
    /// Wait for the next keepalive payload to send
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
        self.active.store(false, Ordering::Release);
        debug!("Heartbeat stopped");
    }
}

/// Spawn a heartbeat task
///
/// `active` is raised while the returned handle is alive.
pub fn spawn_heartbeat(interval: Duration, payload: String, active: Arc<AtomicBool>) -> Heartbeat {
    let (heartbeat_tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(heartbeat_task(interval, payload, heartbeat_tx));
    active.store(true, Ordering::Release);

    Heartbeat { handle, rx, active }
}
