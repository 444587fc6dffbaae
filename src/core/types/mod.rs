//! Core type definitions for procscope
//!
//! Record types produced by the snapshot reader and the aggregator, the
//! security profile types, the request policy, and the error type.

mod address;
mod error;
mod process_info;
mod request;
mod security;

// Re-export all public types
pub use address::Address;
pub use error::{ProcError, ProcResult};
pub use process_info::{
    filetime_to_system_time, image_file_name, well_known_process_name, FileMetadata, MemoryCounters,
    ModuleRecord, ProcessInfo, ProcessRecord, ProcessSnapshot, ThreadRecord, ThreadState,
};
pub use request::{InfoRequest, TokenRequest};
pub use security::{
    Elevation, GroupAttribute, GroupEntry, IntegrityLevel, PrivilegeEntry, PrivilegeStatus,
    SecurityProfile,
};

// Common type aliases
pub type ProcessId = u32;
pub type ThreadId = u32;
