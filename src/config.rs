//! Relay configuration
//!
//! Loaded from a YAML file plus `.env`. Secrets and URL overrides come from
//! the environment:
//!
//! - `RELAY_AUTH_TOKEN` - bearer token for the polling endpoint (optional)
//! - `RELAY_PUSH_URL` - overrides `push.url`
//! - `RELAY_POLL_URL` - overrides `poll.url`

use realtime::{
    FallbackPolicy, HttpPollSource, PollSettings, PushSettings, ReconnectBackoff, StaticEndpoint,
    TransportConfig, DEFAULT_HEARTBEAT_PAYLOAD,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Failed to build transport: {0}")]
    TransportError(#[from] realtime::DeliveryError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub push: PushConfig,
    pub poll: PollConfig,
    #[serde(default)]
    pub fallback: FallbackMode,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,

    /// Bearer token from .env (not in YAML)
    #[serde(skip)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub url: String,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_heartbeat_payload")]
    pub heartbeat_payload: String,
    #[serde(default)]
    pub heartbeat_timeout_ms: Option<u64>,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: usize,
    /// Cap for exponential backoff; absent means fixed delay
    #[serde(default)]
    pub max_reconnect_delay_ms: Option<u64>,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub url: String,
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_adaptive")]
    pub adaptive: bool,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    #[default]
    Immediate,
    AfterReconnectExhausted,
}

impl From<FallbackMode> for FallbackPolicy {
    fn from(mode: FallbackMode) -> Self {
        match mode {
            FallbackMode::Immediate => FallbackPolicy::Immediate,
            FallbackMode::AfterReconnectExhausted => FallbackPolicy::AfterReconnectExhausted,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_status_interval() -> u64 {
    60
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_payload() -> String {
    DEFAULT_HEARTBEAT_PAYLOAD.to_string()
}

fn default_reconnect_interval_ms() -> u64 {
    3_000
}

fn default_max_reconnect_attempts() -> usize {
    10
}

fn default_close_grace_ms() -> u64 {
    1_000
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

fn default_base_interval_ms() -> u64 {
    30_000
}

fn default_min_interval_ms() -> u64 {
    5_000
}

fn default_max_interval_ms() -> u64 {
    120_000
}

fn default_adaptive() -> bool {
    true
}

impl RelayConfig {
    /// Load configuration from YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config = Self::from_yaml(&yaml_content)?;

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();
        config.apply_env();

        config.validate()?;
        Ok(config)
    }

    /// Parse without touching the environment
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("RELAY_PUSH_URL") {
            self.push.url = url;
        }
        if let Ok(url) = std::env::var("RELAY_POLL_URL") {
            self.poll.url = url;
        }
        self.auth_token = std::env::var("RELAY_AUTH_TOKEN").ok().filter(|t| !t.is_empty());
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.push.url.trim().is_empty() {
            return Err(ConfigError::ValidationError("push.url must not be empty".to_string()));
        }
        if self.poll.url.trim().is_empty() {
            return Err(ConfigError::ValidationError("poll.url must not be empty".to_string()));
        }

        if self.push.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "push.heartbeat_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.push.reconnect_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "push.reconnect_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.push.send_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "push.send_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.push.heartbeat_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "push.heartbeat_timeout_ms must be greater than 0 when set".to_string(),
            ));
        }

        if self.poll.min_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "poll.min_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.poll.min_interval_ms > self.poll.max_interval_ms {
            return Err(ConfigError::ValidationError(
                "poll.min_interval_ms must be <= poll.max_interval_ms".to_string(),
            ));
        }

        if self.status_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "status_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn push_settings(&self) -> PushSettings {
        let push = &self.push;
        PushSettings {
            heartbeat_interval: Duration::from_millis(push.heartbeat_interval_ms),
            heartbeat_payload: push.heartbeat_payload.clone(),
            heartbeat_timeout: push.heartbeat_timeout_ms.map(Duration::from_millis),
            reconnect_interval: Duration::from_millis(push.reconnect_interval_ms),
            max_reconnect_attempts: push.max_reconnect_attempts,
            reconnect_backoff: match push.max_reconnect_delay_ms {
                Some(max) => ReconnectBackoff::Exponential {
                    max_delay: Duration::from_millis(max),
                },
                None => ReconnectBackoff::Fixed,
            },
            connect_timeout: push.connect_timeout_ms.map(Duration::from_millis),
            close_grace: Duration::from_millis(push.close_grace_ms),
            send_timeout: Duration::from_millis(push.send_timeout_ms),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            base_interval: Duration::from_millis(self.poll.base_interval_ms),
            min_interval: Duration::from_millis(self.poll.min_interval_ms),
            max_interval: Duration::from_millis(self.poll.max_interval_ms),
            adaptive: self.poll.adaptive,
        }
    }

    /// Build the delivery layer configuration
    pub fn transport_config(&self) -> Result<TransportConfig> {
        let mut source = HttpPollSource::new(&self.poll.url)?;
        if let Some(ref token) = self.auth_token {
            source = source.with_bearer_token(token.clone());
        }
        if let Some(timeout_ms) = self.poll.request_timeout_ms {
            source = source.with_timeout(Duration::from_millis(timeout_ms));
        }

        let config = TransportConfig::builder()
            .resolver(StaticEndpoint::new(self.push.url.clone()))
            .poll_source(source)
            .push_settings(self.push_settings())
            .poll_settings(self.poll_settings())
            .fallback_policy(self.fallback.into())
            .build()?;
        Ok(config)
    }
}
