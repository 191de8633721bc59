use config::builder::DefaultState;
use crate::error::Result;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Well-known recipient for heartbeats
pub const COORDINATOR_ID: &str = "coordinator";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub agent: AgentConfig,
    pub coordinator: CoordinatorConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub heartbeat_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub id: String,
    pub check_interval_ms: u64,
    pub stale_after_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// One agent to create at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub agent_type: String,
    #[serde(default)]
    pub config: Value,
}

/// Per-agent timing overrides read from an agent definition's `config`
#[derive(Debug, Default, Deserialize)]
struct AgentConfigOverrides {
    heartbeat_interval_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
}

impl AgentConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Apply timing keys present in a per-agent config object; other keys
    /// belong to the processor and are ignored here.
    pub fn with_overrides(&self, config: &Value) -> Self {
        let overrides: AgentConfigOverrides =
            serde_json::from_value(config.clone()).unwrap_or_default();
        Self {
            heartbeat_interval_ms: overrides
                .heartbeat_interval_ms
                .unwrap_or(self.heartbeat_interval_ms),
            poll_interval_ms: overrides.poll_interval_ms.unwrap_or(self.poll_interval_ms),
            request_timeout_ms: overrides
                .request_timeout_ms
                .unwrap_or(self.request_timeout_ms),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 30_000,
            poll_interval_ms: 1_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl CoordinatorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            id: COORDINATOR_ID.to_string(),
            check_interval_ms: 30_000,
            stale_after_ms: 90_000,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            coordinator: CoordinatorConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            agents: Vec::new(),
        }
    }
}

impl Settings {
    /// Defaults, then `config/{CONFIG_ENV}` if present, then `APP__*` variables
    pub fn new() -> Result<Self> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let settings = Self::with_defaults()?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Defaults, then the given file (format from its extension), then `APP__*`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = Self::with_defaults()?
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let defaults = Settings::default();

        Config::builder()
            .set_default(
                "agent.heartbeat_interval_ms",
                defaults.agent.heartbeat_interval_ms as i64,
            )?
            .set_default("agent.poll_interval_ms", defaults.agent.poll_interval_ms as i64)?
            .set_default(
                "agent.request_timeout_ms",
                defaults.agent.request_timeout_ms as i64,
            )?
            .set_default("coordinator.id", defaults.coordinator.id)?
            .set_default(
                "coordinator.check_interval_ms",
                defaults.coordinator.check_interval_ms as i64,
            )?
            .set_default(
                "coordinator.stale_after_ms",
                defaults.coordinator.stale_after_ms as i64,
            )?
            .set_default("logging.level", defaults.logging.level)
    }
}
