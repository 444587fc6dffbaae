//! Core module containing fundamental types for procscope
//!
//! This module provides the records, security types, request policy and
//! error type shared by the snapshot reader, the memory walker, the token
//! inspector and the aggregator.

pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    InfoRequest, ProcError, ProcResult, ProcessInfo, ProcessRecord, ProcessSnapshot,
    SecurityProfile, ThreadRecord,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

#[cfg(not(target_pointer_width = "64"))]
#[cfg(not(target_pointer_width = "32"))]
compile_error!("procscope requires a 32-bit or 64-bit target");
