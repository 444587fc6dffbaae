//! Configuration loader for procscope
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use crate::core::types::{InfoRequest, ProcError};
use crate::process::AggregatorOptions;
use crate::snapshot::SnapshotLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ProcError {
    fn from(e: ConfigError) -> Self {
        ProcError::Config(e.to_string())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_snapshot")]
    pub snapshot: SnapshotConfig,

    #[serde(default = "default_inspector")]
    pub inspector: InspectorConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// Bounds on the snapshot buffer-growth loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_initial_buffer_size")]
    pub initial_buffer_size: usize,
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SnapshotConfig {
    pub fn limits(&self) -> SnapshotLimits {
        SnapshotLimits {
            initial_size: self.initial_buffer_size,
            max_size: self.max_buffer_size,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Per-process inspection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectorConfig {
    /// Resolve group SIDs to account names; slower
    #[serde(default = "default_resolve_group_names")]
    pub resolve_group_names: bool,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl InspectorConfig {
    pub fn aggregator_options(&self) -> AggregatorOptions {
        AggregatorOptions {
            parallel: self.parallel,
            worker_threads: self.worker_threads,
        }
    }

    /// Applies the group-name setting to `request`
    pub fn apply(&self, request: InfoRequest) -> InfoRequest {
        request.with_group_names(self.resolve_group_names)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration or returns defaults if file doesn't exist
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(ConfigError::FileNotFound(_)) => Config::default(),
            Err(e) => {
                tracing::warn!(
                    "ignoring unreadable config {}: {}",
                    self.config_path.display(),
                    e
                );
                Config::default()
            }
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from the default location
pub fn load_config() -> Config {
    ConfigLoader::new("procscope.toml").load_or_default()
}

// Default functions for serde
fn default_snapshot() -> SnapshotConfig {
    let defaults = default_config().snapshot;
    SnapshotConfig {
        initial_buffer_size: defaults.initial_buffer_size,
        max_buffer_size: defaults.max_buffer_size,
        timeout_ms: defaults.timeout_ms,
    }
}

fn default_inspector() -> InspectorConfig {
    let defaults = default_config().inspector;
    InspectorConfig {
        resolve_group_names: defaults.resolve_group_names,
        parallel: defaults.parallel,
        worker_threads: defaults.worker_threads,
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_config().logging.level,
    }
}

// Individual field defaults
fn default_initial_buffer_size() -> usize {
    default_config().snapshot.initial_buffer_size
}

fn default_max_buffer_size() -> usize {
    default_config().snapshot.max_buffer_size
}

fn default_timeout_ms() -> u64 {
    default_config().snapshot.timeout_ms
}

fn default_resolve_group_names() -> bool {
    default_config().inspector.resolve_group_names
}

fn default_parallel() -> bool {
    default_config().inspector.parallel
}

fn default_worker_threads() -> usize {
    default_config().inspector.worker_threads
}

fn default_log_level() -> String {
    default_config().logging.level
}

impl Default for Config {
    fn default() -> Self {
        Config {
            snapshot: default_snapshot(),
            inspector: default_inspector(),
            logging: default_logging(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.snapshot.limits(), SnapshotLimits::default());
        assert!(config.inspector.worker_threads > 0);
    }

    #[test]
    fn test_load_missing_file() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let result = loader.load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_or_default() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let config = loader.load_or_default();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[snapshot\ntimeout_ms = ").unwrap();

        let loader = ConfigLoader::new(&config_path);
        assert!(matches!(loader.load(), Err(ConfigError::TomlParse(_))));
        assert_eq!(loader.load_or_default().snapshot.timeout_ms, 5000);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let mut config = Config::default();
        config.inspector.parallel = false;
        let loader = ConfigLoader::new(&config_path);

        loader.save(&config).unwrap();
        assert!(config_path.exists());

        let loaded = loader.load().unwrap();
        assert!(!loaded.inspector.parallel);
        assert_eq!(loaded.snapshot.max_buffer_size, config.snapshot.max_buffer_size);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [snapshot]
            timeout_ms = 250
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.snapshot.timeout_ms, 250);
        // Check defaults are applied
        assert_eq!(config.snapshot.initial_buffer_size, 512 * 1024);
        assert!(config.inspector.resolve_group_names);
        assert_eq!(
            config.snapshot.limits().timeout,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_inspector_applies_group_names() {
        let mut config = Config::default();
        config.inspector.resolve_group_names = false;
        let request = config.inspector.apply(InfoRequest::everything());
        assert!(!request.resolve_group_names);
        assert!(request.token_groups);
    }
}
