//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod ledger;
mod storage;

pub use ledger::{RedemptionConfig, TransferConfig};
pub use storage::{StorageConfig, StorageType};

use serde::Deserialize;

use crate::ledger::RewardPolicy;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "stepledger.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "STEPLEDGER_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "STEPLEDGER";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "STEPLEDGER_LOG";
/// Environment variable for the transfer job's target day.
pub const TRANSFER_DATE_ENV_VAR: &str = "TRANSFER_DATE";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Daily reward thresholds.
    pub rewards: RewardPolicy,
    /// Redemption configuration.
    pub redemption: RedemptionConfig,
    /// Step transfer job configuration.
    pub transfer: TransferConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `stepledger.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
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
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Create config for testing: in-memory store, default thresholds.
    pub fn for_test() -> Self {
        Self {
            storage: StorageConfig::memory(),
            ..Self::default()
        }
    }
}
