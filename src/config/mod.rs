//! Configuration module for procscope
//!
//! Provides configuration loading, validation, and default settings
//! for the snapshot reader and the aggregator.

mod defaults;
mod loader;
mod validator;

pub use defaults::{default_config, ConfigDefaults};
pub use loader::{load_config, ConfigLoader};
pub use loader::{InspectorConfig, LoggingConfig, SnapshotConfig};
pub use validator::{validate_config, ConfigValidator, MAX_WORKER_THREADS};

// Re-export the main configuration structure
pub use loader::Config;

// Configuration-related error type
pub use loader::ConfigError;

// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;
