//! Application Configuration
//!
//! Options for the orchestrator. All fields have defaults, so an empty JSON
//! object is a valid configuration.

use serde::{Deserialize, Serialize};

/// How a hot-plug pass treats extensions loaded by earlier passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotPlugStrategy {
    /// Construct every extension again on every pass
    #[default]
    Reinstantiate,
    /// Keep instances created by earlier passes and only construct new ones
    ReuseExisting,
}

/// Orchestrator configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Name the built-in hub service is registered under (default: "hub")
    pub hub_service: String,

    /// Hot-plug behavior (default: reinstantiate)
    pub hot_plug: HotPlugStrategy,

    /// Run the first load pass during construction (default: false)
    pub auto_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hub_service: "hub".into(),
            hot_plug: HotPlugStrategy::default(),
            auto_start: false,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hub service name
    pub fn with_hub_service(mut self, name: impl Into<String>) -> Self {
        self.hub_service = name.into();
        self
    }

    /// Set the hot-plug strategy
    pub fn with_hot_plug(mut self, strategy: HotPlugStrategy) -> Self {
        self.hot_plug = strategy;
        self
    }

    /// Run the first pass during construction
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.hub_service.trim().is_empty() {
            return Err(ConfigValidationError::InvalidValue {
                field: "hub_service".into(),
                message: "must not be empty".into(),
            });
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
