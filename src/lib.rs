//! Notification Relay - Main Library
//!
//! Realtime notification delivery with push-first transport selection and a
//! polling fallback, plus the configuration and binary support around it.
//!
//! ## Architecture
//!
//! - **realtime**: Delivery layer (re-exported from workspace)
//! - **config**: YAML + `.env` configuration for the bundled binaries
//! - **logging**: Tracing subscriber setup
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use notification_relay::bin_common::{load_config_from_env, ConfigType};
//! use notification_relay::config::RelayConfig;
//! use notification_relay::realtime::DeliveryOrchestrator;
//! ```

// Re-export workspace libraries for convenience
pub use realtime;

pub mod config;
pub mod logging;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use runner::{format_status, RunConfig};
}

pub use config::{ConfigError, RelayConfig};
pub use logging::init_tracing_with_level;
