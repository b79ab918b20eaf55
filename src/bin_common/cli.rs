//! CLI utilities for binaries
//!
//! Handles configuration path lookup for all binary executables.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Relay configuration (config/relay.yaml)
    Relay,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Relay => "config/relay.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        "RELAY_CONFIG_PATH"
    }
}

/// Load configuration path from environment or use default
///
/// A custom path always wins over the environment.
///
/// # Examples
/// ```
/// use notification_relay::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Custom("relay.yaml".to_string()));
/// assert_eq!(path.to_str(), Some("relay.yaml"));
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    if let ConfigType::Custom(path) = config_type {
        return path.into();
    }

    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_type_paths() {
        assert_eq!(ConfigType::Relay.default_path(), "config/relay.yaml");

        let custom = ConfigType::Custom("custom/path.yaml".to_string());
        assert_eq!(custom.default_path(), "custom/path.yaml");
    }

    #[test]
    fn test_config_type_env_vars() {
        assert_eq!(ConfigType::Relay.env_var_name(), "RELAY_CONFIG_PATH");
    }
}
