//! Runtime configuration.
//!
//! Configuration is loaded via the `config` crate from `SIGFLOW__`-prefixed
//! environment variables, with nested sections separated by `__`:
//!
//! ```text
//! SIGFLOW__ENGINE__MAX_PARALLEL_NODES=4
//! SIGFLOW__ENGINE__NODE_TIMEOUT_SECS=30
//! SIGFLOW__STORAGE__DATASET_DIR=/var/lib/sigflow/datasets
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SigflowConfig {
    /// Execution engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Dataset and metadata storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Execution engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of nodes executing at once within a single run.
    /// A value of 1 executes nodes strictly one after another.
    #[serde(default = "default_max_parallel_nodes")]
    pub max_parallel_nodes: usize,

    /// Per-node deadline in seconds. Unset means nodes may run indefinitely.
    #[serde(default)]
    pub node_timeout_secs: Option<u64>,
}

fn default_max_parallel_nodes() -> usize {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: default_max_parallel_nodes(),
            node_timeout_secs: None,
        }
    }
}

impl EngineConfig {
    /// Returns the per-node deadline, if one is configured.
    #[must_use]
    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_secs.map(Duration::from_secs)
    }

    /// Returns the effective parallelism, never less than one.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.max_parallel_nodes.max(1)
    }
}

/// Storage settings for the reference store implementations.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one file per stored dataset.
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,

    /// SQLite connection URL for workflow metadata.
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("data/datasets")
}

fn default_database_url() -> String {
    "sqlite://sigflow.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dataset_dir: default_dataset_dir(),
            database_url: default_database_url(),
        }
    }
}

impl SigflowConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(
            config::Environment::with_prefix("SIGFLOW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Loads configuration from an arbitrary `config` source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or deserialized.
    pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn engine_config_defaults_to_sequential_without_timeout() {
        let config = EngineConfig::default();
        assert_eq!(config.max_parallel_nodes, 1);
        assert_eq!(config.parallelism(), 1);
        assert!(config.node_timeout().is_none());
    }

    #[test]
    fn parallelism_is_never_zero() {
        let config = EngineConfig {
            max_parallel_nodes: 0,
            node_timeout_secs: None,
        };
        assert_eq!(config.parallelism(), 1);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = SigflowConfig::from_source(File::from_str("{}", FileFormat::Json))
            .expect("empty config should load");
        assert_eq!(config.engine.max_parallel_nodes, 1);
        assert_eq!(config.storage.dataset_dir, PathBuf::from("data/datasets"));
        assert_eq!(config.storage.database_url, "sqlite://sigflow.db");
    }

    #[test]
    fn nested_values_override_defaults() {
        let json = r#"{
            "engine": { "max_parallel_nodes": 4, "node_timeout_secs": 30 },
            "storage": { "dataset_dir": "/tmp/sigflow" }
        }"#;
        let config = SigflowConfig::from_source(File::from_str(json, FileFormat::Json))
            .expect("config should load");

        assert_eq!(config.engine.parallelism(), 4);
        assert_eq!(config.engine.node_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.storage.dataset_dir, PathBuf::from("/tmp/sigflow"));
        assert_eq!(config.storage.database_url, "sqlite://sigflow.db");
    }
}
