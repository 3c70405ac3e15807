//! Configuration loading, validation, and management for LedgerLens.
//!
//! Loads configuration from `~/.ledgerlens/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use ledgerlens_core::transport::ReasoningConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ledgerlens/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Assistant exchange defaults
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Provider used when `send` does not name one
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used when `send` does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Conversation targeted when `send` does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_conversation: Option<String>,

    /// Shown when a transport fails without reporting an error event
    #[serde(default = "default_transport_failure_message")]
    pub transport_failure_message: String,

    /// Capacity of the domain event bus
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Reasoning settings forwarded with every exchange
    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_transport_failure_message() -> String {
    "The assistant connection was interrupted. Please try again.".into()
}
fn default_event_bus_capacity() -> usize {
    256
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: default_model(),
            default_conversation: None,
            reasoning: ReasoningConfig::default(),
            transport_failure_message: default_transport_failure_message(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ledgerlens/config.toml).
    ///
    /// Environment variables override the file:
    /// - `LEDGERLENS_PROVIDER`
    /// - `LEDGERLENS_MODEL`
    /// - `LEDGERLENS_CONVERSATION`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = var("LEDGERLENS_PROVIDER") {
            self.assistant.default_provider = provider;
        }
        if let Some(model) = var("LEDGERLENS_MODEL") {
            self.assistant.default_model = model;
        }
        if let Some(conversation) = var("LEDGERLENS_CONVERSATION") {
            self.assistant.default_conversation = Some(conversation);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ledgerlens")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let assistant = &self.assistant;

        if assistant.default_provider.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "assistant.default_provider must not be empty".into(),
            ));
        }

        if assistant.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "assistant.default_model must not be empty".into(),
            ));
        }

        if assistant.transport_failure_message.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "assistant.transport_failure_message must not be empty".into(),
            ));
        }

        if assistant.event_bus_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "assistant.event_bus_capacity must be > 0".into(),
            ));
        }

        if assistant.reasoning.budget_tokens == Some(0) {
            return Err(ConfigError::ValidationError(
                "assistant.reasoning.budget_tokens must be > 0 when set".into(),
            ));
        }

        if assistant
            .default_conversation
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "assistant.default_conversation must not be blank".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
