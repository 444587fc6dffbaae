//! Configuration validator for procscope
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{Config, ConfigError, InspectorConfig, LoggingConfig, SnapshotConfig};

/// Largest worker pool accepted
pub const MAX_WORKER_THREADS: usize = 128;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_snapshot(&config.snapshot)?;
        Self::validate_inspector(&config.inspector)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    fn validate_snapshot(snapshot: &SnapshotConfig) -> Result<(), ConfigError> {
        if snapshot.initial_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "Initial snapshot buffer size must be greater than 0".to_string(),
            ));
        }

        if snapshot.max_buffer_size < snapshot.initial_buffer_size {
            return Err(ConfigError::Invalid(format!(
                "Maximum snapshot buffer size {} is below the initial size {}",
                snapshot.max_buffer_size, snapshot.initial_buffer_size
            )));
        }

        if snapshot.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Snapshot timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_inspector(inspector: &InspectorConfig) -> Result<(), ConfigError> {
        if inspector.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "Worker threads must be at least 1".to_string(),
            ));
        }

        if inspector.worker_threads > MAX_WORKER_THREADS {
            return Err(ConfigError::Invalid(format!(
                "Worker threads cannot exceed {}",
                MAX_WORKER_THREADS
            )));
        }

        Ok(())
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}
