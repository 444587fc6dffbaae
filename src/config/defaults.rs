//! Default configuration values for procscope

use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub snapshot: SnapshotDefaults,
    pub inspector: InspectorDefaults,
    pub logging: LoggingDefaults,
}

/// Default snapshot buffer bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDefaults {
    pub initial_buffer_size: usize,
    pub max_buffer_size: usize,
    pub timeout_ms: u64,
}

/// Default per-process inspection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectorDefaults {
    pub resolve_group_names: bool,
    pub parallel: bool,
    pub worker_threads: usize,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        snapshot: SnapshotDefaults {
            initial_buffer_size: 524288, // 512KB
            max_buffer_size: 268435456,  // 256MB
            timeout_ms: 5000,
        },
        inspector: InspectorDefaults {
            resolve_group_names: true,
            parallel: true,
            worker_threads: num_cpus::get().min(8),
        },
        logging: LoggingDefaults {
            level: "info".to_string(),
        },
    }
}
