use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::BatchError;

/// Configuration file looked up when none is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "bookstore-batch.toml";

/// Prefix of configuration environment variables. Sections are separated by
/// a double underscore: `BOOKSTORE_CHUNK__SIZE=10`.
pub const ENV_PREFIX: &str = "BOOKSTORE_";

/// Settings of both bookstore jobs.
///
/// Layered from lowest to highest precedence: built-in defaults, the TOML
/// file, `BOOKSTORE_*` environment variables, then command-line flags merged
/// by the caller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub input: InputConfig,
    pub chunk: ChunkConfig,
    pub delete: DeleteConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    /// Semicolon-delimited file of books to import
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Records per flush
    pub size: u16,
    /// Malformed records tolerated before the import fails
    pub skip_limit: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_timeout_ms: Option<u64>,
    /// Attempts per chunk write, the first one included
    pub write_attempts: u32,
    /// Delay before the first retry, doubled on every further retry
    pub write_backoff_ms: u64,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: 2,
            skip_limit: 0,
            write_timeout_ms: None,
            write_attempts: 1,
            write_backoff_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeleteConfig {
    /// File removed by the delete job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://bookstore.db".to_string(),
        }
    }
}

impl BatchConfig {
    /// Builds the provider chain: defaults, then `file`, then the environment.
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(BatchConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(file: &Path) -> Result<Self, BatchError> {
        Self::from_figment(Self::figment(file))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, BatchError> {
        let config: BatchConfig = figment
            .extract()
            .map_err(|error| BatchError::Configuration(error.to_string()))?;

        if config.chunk.size == 0 {
            return Err(BatchError::Configuration(
                "chunk.size must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn input_path(&self) -> Result<&Path, BatchError> {
        self.input
            .path
            .as_deref()
            .ok_or_else(|| BatchError::Configuration("input.path is not set".to_string()))
    }

    pub fn delete_path(&self) -> Result<&Path, BatchError> {
        self.delete
            .path
            .as_deref()
            .ok_or_else(|| BatchError::Configuration("delete.path is not set".to_string()))
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.chunk.write_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_backoff(&self) -> Duration {
        Duration::from_millis(self.chunk.write_backoff_ms)
    }
}
