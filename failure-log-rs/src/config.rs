// failure-log-rs/src/config.rs
// Configuration loader for the failure log

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::logging::LoggingConfig;

/// Prefix for environment overrides, e.g. `FAILURE_LOG_STORE__REDIS_URL`
pub const ENV_PREFIX: &str = "FAILURE_LOG";

/// Default list key, shared with existing dashboards
pub const DEFAULT_LIST_KEY: &str = "failed";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FailureLogConfig {
    /// Key of the list failures are appended to
    pub list_key: String,
    /// Backtrace frames from the first one containing this marker onward are
    /// dropped before saving
    pub backtrace_cutoff: Option<String>,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl Default for FailureLogConfig {
    fn default() -> Self {
        Self {
            list_key: DEFAULT_LIST_KEY.to_string(),
            backtrace_cutoff: None,
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// `memory` or `redis`
    pub backend: String,
    pub redis_url: String,
    /// Key prefix, joined with `:`. When set, `clear_all` only deletes keys
    /// under this prefix; without it the whole Redis database is flushed.
    pub namespace: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            namespace: None,
        }
    }
}

impl FailureLogConfig {
    /// Load defaults, then `path` if it exists, then `FAILURE_LOG_*`
    /// environment variables. Nested keys use `__`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load `.env` if present, then the file named by `FAILURE_LOG_CONFIG`
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let path = std::env::var(format!("{}_CONFIG", ENV_PREFIX)).ok();
        Self::load(path.as_deref().map(Path::new))
    }
}
