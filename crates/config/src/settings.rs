//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Runtime environment enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Telephony provider credentials and voice settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Reminder call-flow policy knobs
    #[serde(default)]
    pub reminder: ReminderConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings; strict environments reject what development only
    /// warns about.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_reminder()?;
        self.validate_provider()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if self.server.public_base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.public_base_url".to_string(),
                message: "Public base URL is required for provider callbacks".to_string(),
            });
        }

        if self.environment.is_production()
            && self.server.cors_enabled
            && self.server.cors_origins.is_empty()
        {
            tracing::warn!(
                "CORS is enabled in production but no origins are configured. \
                 This may block legitimate requests."
            );
        }

        Ok(())
    }

    fn validate_reminder(&self) -> Result<(), ConfigError> {
        let reminder = &self.reminder;

        if reminder.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reminder.max_attempts".to_string(),
                message: "At least one attempt is required".to_string(),
            });
        }

        if !(1..=60).contains(&reminder.gather_timeout_secs) {
            return Err(ConfigError::InvalidValue {
                field: "reminder.gather_timeout_secs".to_string(),
                message: format!(
                    "Gather window must be 1-60 seconds, got {}",
                    reminder.gather_timeout_secs
                ),
            });
        }

        if reminder.follow_up_delay_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reminder.follow_up_delay_secs".to_string(),
                message: "Follow-up delay must be at least 1 second".to_string(),
            });
        }

        if reminder.max_active_calls == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reminder.max_active_calls".to_string(),
                message: "Must allow at least 1 active call".to_string(),
            });
        }

        Ok(())
    }

    fn validate_provider(&self) -> Result<(), ConfigError> {
        if self.provider.is_configured() {
            return Ok(());
        }

        if self.environment.is_strict() {
            return Err(ConfigError::InvalidValue {
                field: "provider".to_string(),
                message: format!(
                    "account_sid, auth_token and from_number are required in {} mode",
                    if self.environment.is_production() {
                        "production"
                    } else {
                        "staging"
                    }
                ),
            });
        }

        tracing::warn!("Telephony provider is not configured; outbound calls will fail");
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL embedded in provider callback URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_public_base_url(),
            timeout_seconds: default_timeout(),
            cors_enabled: default_true(),
            // Empty by default - must be explicitly configured for production
            cors_origins: Vec::new(),
        }
    }
}

/// Telephony provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider account identifier
    #[serde(default)]
    pub account_sid: String,

    /// Provider auth token (also the webhook signing key)
    #[serde(default)]
    pub auth_token: String,

    /// Sender number calls are placed from
    #[serde(default)]
    pub from_number: String,

    /// Provider REST API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Text-to-speech voice used in prompts
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Validate webhook request signatures
    #[serde(default)]
    pub validate_signatures: bool,
}

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}
fn default_voice() -> String {
    "alice".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            api_base: default_api_base(),
            voice: default_voice(),
            validate_signatures: false,
        }
    }
}

impl ProviderConfig {
    /// Check if the provider credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_number.is_empty()
    }
}

/// Reminder call-flow policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Seconds the gather accepts a keypress or speech before timing out
    #[serde(default = "default_gather_timeout")]
    pub gather_timeout_secs: u64,

    /// Extra slack on the orchestrator timeout timer, covering webhook latency
    #[serde(default = "default_timeout_slack")]
    pub timeout_slack_secs: u64,

    /// Delay before a follow-up attempt after a denial
    #[serde(default = "default_follow_up_delay")]
    pub follow_up_delay_secs: u64,

    /// Maximum dial attempts per logical reminder
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Maximum reminders held in the registry at once
    #[serde(default = "default_max_active_calls")]
    pub max_active_calls: usize,

    /// Seconds a terminal record is kept before eviction
    #[serde(default = "default_eviction_grace")]
    pub eviction_grace_secs: u64,

    /// Interval of the registry sweeper task
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_gather_timeout() -> u64 {
    10
}
fn default_timeout_slack() -> u64 {
    5
}
fn default_follow_up_delay() -> u64 {
    300
}
fn default_max_attempts() -> u32 {
    3
}
fn default_max_active_calls() -> usize {
    1000
}
fn default_eviction_grace() -> u64 {
    900
}
fn default_sweep_interval() -> u64 {
    60
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            gather_timeout_secs: default_gather_timeout(),
            timeout_slack_secs: default_timeout_slack(),
            follow_up_delay_secs: default_follow_up_delay(),
            max_attempts: default_max_attempts(),
            max_active_calls: default_max_active_calls(),
            eviction_grace_secs: default_eviction_grace(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (`MEDCALL__` prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("MEDCALL")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
