//! Configuration management for the reminder service
//!
//! Supports loading configuration from:
//! - YAML files (`config/default.yaml`, optional `config/{env}.yaml`)
//! - Environment variables (`MEDCALL__` prefix, `__` separator)
//!
//! Validation runs at load time; strictness scales with the runtime
//! environment so development can run with an unconfigured provider while
//! production refuses to start.

pub mod prompts;
pub mod settings;

pub use prompts::PromptCatalog;
pub use settings::{
    load_settings, ObservabilityConfig, ProviderConfig, ReminderConfig, RuntimeEnvironment,
    ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
