//! Binary runner utilities
//!
//! Startup and shutdown banners plus a one-line status summary for
//! long-running binaries.

use realtime::{ConnectionMode, Diagnostics};
use tracing::info;

/// Configuration for running a binary application
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// Status report interval in seconds
    pub status_interval_secs: u64,
}

impl RunConfig {
    /// Create a new run configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status_interval_secs: 60,
        }
    }

    /// Set status report interval
    pub fn with_status_interval(mut self, secs: u64) -> Self {
        self.status_interval_secs = secs;
        self
    }

    /// Print startup banner
    pub fn print_banner(&self) {
        info!("");
        info!("========================================");
        info!("Starting {}", self.name);
        info!("Status every {}s", self.status_interval_secs);
        info!("Press Ctrl+C to stop");
        info!("========================================");
        info!("");
    }

    /// Print shutdown banner
    pub fn print_shutdown(&self, stats: Option<&str>) {
        info!("");
        info!("========================================");
        info!("{} stopped gracefully", self.name);
        if let Some(stats) = stats {
            info!("{}", stats);
        }
        info!("========================================");
    }
}

/// One-line summary of the delivery layer
pub fn format_status(diagnostics: &Diagnostics, received: u64) -> String {
    let transport = match diagnostics.mode {
        ConnectionMode::Push => format!(
            "push (heartbeat {})",
            if diagnostics.heartbeat_active { "on" } else { "off" }
        ),
        ConnectionMode::Poll => match diagnostics.poll_interval {
            Some(interval) => format!("poll (every {:.1}s)", interval.as_secs_f64()),
            None => "poll".to_string(),
        },
    };

    format!(
        "mode={} state={:?} subscribers={} received={}",
        transport, diagnostics.state, diagnostics.subscribers, received
    )
}
