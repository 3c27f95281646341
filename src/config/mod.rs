//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod database;
mod dedup;
mod dispatch;

pub use database::{DatabaseBackend, DatabaseConfig};
pub use dedup::{parse_list, DedupConfig};
pub use dispatch::DispatchConfig;

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "EGRESS_INTENTS_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "EGRESS_INTENTS";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "EGRESS_INTENTS_LOG";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cluster name, used in the dispatch event type and payload.
    pub cluster: String,
    /// Relational backend connection.
    pub database: DatabaseConfig,
    /// Deduplication behaviour.
    pub dedup: DedupConfig,
    /// Outbound notification.
    pub dispatch: DispatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster: "cluster.local".to_string(),
            database: DatabaseConfig::default(),
            dedup: DedupConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix, `__` nesting
    ///    (e.g. `EGRESS_INTENTS__DEDUP__RETENTION_DAYS=30`)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would only fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.enabled {
            let missing: Vec<&str> = [
                ("dispatch.owner", self.dispatch.owner.as_str()),
                ("dispatch.repo", self.dispatch.repo.as_str()),
                ("dispatch.token", self.dispatch.token.as_str()),
            ]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect();

            if !missing.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "dispatch is enabled but {} not set",
                    missing.join(", ")
                )));
            }
        }
        if self.cluster.trim().is_empty() {
            return Err(ConfigError::Invalid("cluster must not be empty".to_string()));
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        let mut config = Self::default();
        config.database.path = ":memory:".to_string();
        config
    }
}
