//! procscope: process and security-token introspection for Windows
//!
//! Reads a system-wide process and thread snapshot, walks each process's
//! environment block for its command line, inspects its security token,
//! and assembles everything into one [`ProcessInfo`] per process.

pub mod config;
pub mod core;
pub mod memory;
pub mod process;
pub mod security;
pub mod snapshot;
#[cfg(windows)]
pub mod windows;

// Re-export main types from core module
pub use crate::core::types::{
    Address, Elevation, FileMetadata, GroupEntry, InfoRequest, IntegrityLevel, MemoryCounters,
    ModuleRecord, PrivilegeEntry, PrivilegeStatus, ProcError, ProcResult, ProcessId, ProcessInfo,
    ProcessRecord, ProcessSnapshot, SecurityProfile, ThreadId, ThreadRecord, ThreadState,
    TokenRequest,
};
pub use crate::core::{AUTHORS, VERSION};

pub use process::{Aggregator, AggregatorOptions, SystemProbe};

#[cfg(windows)]
pub use process::{get_all_processes, get_process, WindowsProbe};
