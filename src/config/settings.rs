//! Configuration settings for the agent.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::AgentError;
use crate::extensions::ExtensionCatalog;

/// Main configuration structure for the agent.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub socket: SocketConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub extensions: ExtensionsConfig,
}

/// Socket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    /// Path to the Unix socket file.
    pub path: PathBuf,
    /// Socket file permissions (e.g., "0660").
    #[serde(default = "default_socket_permissions")]
    pub permissions: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Socket read/write timeout in seconds.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_seconds: u64,
    /// Maximum concurrent connections.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_connections: usize,
}

/// Extension loading configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionsConfig {
    /// Bundled extension types `core_loadlib` manifests may refer to.
    /// Empty disables runtime extension.
    #[serde(default = "default_catalog")]
    pub catalog: Vec<String>,
}

// Default value functions
fn default_socket_permissions() -> String {
    "0660".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_message_size() -> usize {
    crate::protocol::DEFAULT_MAX_MESSAGE_SIZE
}

fn default_socket_timeout() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    64
}

fn default_catalog() -> Vec<String> {
    vec!["echo".to_string()]
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            socket_timeout_seconds: default_socket_timeout(),
            max_concurrent_connections: default_max_concurrent(),
        }
    }
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| AgentError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let settings = Self::from_toml(&content).map_err(|e| match e {
            AgentError::Config { message } => AgentError::Config {
                message: format!("Invalid config file '{}': {}", path.display(), message),
            },
            other => other,
        })?;

        Ok(settings)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, AgentError> {
        let settings: Settings = toml::from_str(content).map_err(|e| AgentError::Config {
            message: e.to_string(),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), AgentError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(AgentError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(AgentError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if self.socket.permissions.is_empty()
            || !self.socket.permissions.chars().all(|c| ('0'..='7').contains(&c))
        {
            return Err(AgentError::Config {
                message: format!(
                    "Invalid socket permissions '{}'. Must be octal (e.g., '0660')",
                    self.socket.permissions
                ),
            });
        }

        if self.limits.max_message_size == 0
            || self.limits.socket_timeout_seconds == 0
            || self.limits.max_concurrent_connections == 0
        {
            return Err(AgentError::Config {
                message: "Limits must be greater than zero".to_string(),
            });
        }

        ExtensionCatalog::from_names(&self.extensions.catalog)?;

        Ok(())
    }
}
