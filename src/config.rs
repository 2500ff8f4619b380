//! Layered server configuration
//!
//! Defaults, then an optional `taskflow.toml`, then `TASKFLOW_*` environment
//! variables (`__` separates nested keys, e.g. `TASKFLOW_SERVER__PORT`).

use crate::error::ConfigError;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                key: "server.host".to_string(),
                reason: e.to_string(),
            })
    }
}

/// Knobs for the tool contract and the widget-state store
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    /// Prefix every registered tool name must carry
    #[serde(default = "default_service_prefix")]
    pub service_prefix: String,

    /// Upper bound on narration length, in characters
    #[serde(default = "default_narration_max_chars")]
    pub narration_max_chars: usize,

    /// Approximate token budget for one widget's persisted state
    #[serde(default = "default_widget_state_token_budget")]
    pub widget_state_token_budget: usize,

    /// Idle time after which an active widget becomes stale
    #[serde(default = "default_widget_state_ttl_secs")]
    pub widget_state_ttl_secs: u64,

    /// Minimum spacing between two reminders for the same task
    #[serde(default = "default_reminder_cooldown_secs")]
    pub reminder_cooldown_secs: u64,

    /// Directory holding the widget HTML; discovered when unset
    #[serde(default)]
    pub assets_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            service_prefix: default_service_prefix(),
            narration_max_chars: default_narration_max_chars(),
            widget_state_token_budget: default_widget_state_token_budget(),
            widget_state_ttl_secs: default_widget_state_ttl_secs(),
            reminder_cooldown_secs: default_reminder_cooldown_secs(),
            assets_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub app: AppSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .add_source(File::with_name("taskflow").required(false))
            .add_source(
                Environment::with_prefix("TASKFLOW")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            ConfigError::Other(err)
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.app.service_prefix;
        if prefix.is_empty()
            || !prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ConfigError::InvalidValue {
                key: "app.service_prefix".to_string(),
                reason: "must be non-empty lowercase alphanumeric".to_string(),
            });
        }
        if self.app.narration_max_chars == 0 {
            return Err(ConfigError::InvalidValue {
                key: "app.narration_max_chars".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_service_prefix() -> String {
    "taskflow".to_string()
}

fn default_narration_max_chars() -> usize {
    400
}

fn default_widget_state_token_budget() -> usize {
    4000
}

fn default_widget_state_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_reminder_cooldown_secs() -> u64 {
    60
}
