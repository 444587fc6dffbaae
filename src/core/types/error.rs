//! Custom error types for procscope

use std::fmt;
use thiserror::Error;

/// Main error type for introspection operations
#[derive(Error, Debug)]
pub enum ProcError {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Access denied to process {pid}: {reason}")]
    AccessDenied { pid: u32, reason: String },

    #[error("Failed to read memory at {address}: {reason}")]
    ReadFailed { address: String, reason: String },

    #[error("Malformed snapshot at offset 0x{offset:X}: {reason}")]
    MalformedSnapshot { offset: usize, reason: String },

    #[error("Snapshot buffer limit exceeded: requested {requested} bytes, limit {limit}")]
    BufferLimitExceeded { requested: usize, limit: usize },

    #[error("Snapshot query did not settle within {0} ms")]
    SnapshotTimeout(u64),

    #[error("{api} failed with status 0x{status:08X}")]
    NativeQuery { api: &'static str, status: u32 },

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsApiError(#[from] windows::core::Error),

    #[error("Windows API: {0}")]
    WindowsApi(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for introspection operations
pub type ProcResult<T> = Result<T, ProcError>;

impl ProcError {
    /// Creates a new Windows API error with the last error code
    #[cfg(windows)]
    pub fn last_os_error() -> Self {
        ProcError::WindowsApiError(windows::core::Error::from_win32())
    }

    /// Creates an access denied error for a process
    pub fn access_denied(pid: u32, reason: impl Into<String>) -> Self {
        ProcError::AccessDenied {
            pid,
            reason: reason.into(),
        }
    }

    /// Creates a read failed error
    pub fn read_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        ProcError::ReadFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed snapshot error
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        ProcError::MalformedSnapshot {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether this error means the snapshot buffer itself could not be trusted
    pub fn is_snapshot_fatal(&self) -> bool {
        matches!(
            self,
            ProcError::MalformedSnapshot { .. }
                | ProcError::BufferLimitExceeded { .. }
                | ProcError::SnapshotTimeout(_)
        )
    }
}
