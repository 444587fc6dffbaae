//! The system queries the aggregator is built on

use crate::core::types::{
    FileMetadata, MemoryCounters, ModuleRecord, ProcResult, ProcessId, ProcessSnapshot,
    SecurityProfile, ThreadRecord, TokenRequest,
};
use std::time::SystemTime;

/// Everything the aggregator asks of the operating system.
///
/// Per-process queries return errors freely; the aggregator degrades each
/// failure to the field's default. Only the two snapshot calls may report
/// errors that reach the caller.
pub trait SystemProbe: Sync {
    /// Native system-wide snapshot; empty when the query itself is refused
    fn snapshot(&self, include_start_times: bool) -> ProcResult<Vec<ProcessSnapshot>>;

    /// Two-list snapshot used when the native query yields nothing
    fn legacy_snapshot(&self) -> ProcResult<Vec<ProcessSnapshot>>;

    /// Whether `pid` can be opened and has not exited
    fn is_running(&self, pid: ProcessId) -> bool;

    /// Parent id from the process's basic information; 0 when unknown
    fn parent_pid(&self, pid: ProcessId) -> ProcResult<ProcessId>;

    fn threads(&self, pid: ProcessId) -> ProcResult<Vec<ThreadRecord>>;

    fn start_time(&self, pid: ProcessId) -> ProcResult<Option<SystemTime>>;

    fn memory_counters(&self, pid: ProcessId) -> ProcResult<MemoryCounters>;

    fn handle_count(&self, pid: ProcessId) -> ProcResult<u32>;

    /// Image path through the lightweight limited-information query
    fn limited_image_path(&self, pid: ProcessId) -> ProcResult<String>;

    /// Path of module zero, the executable itself
    fn main_module_path(&self, pid: ProcessId) -> ProcResult<String>;

    fn modules(&self, pid: ProcessId) -> ProcResult<Vec<ModuleRecord>>;

    fn session_id(&self, pid: ProcessId) -> ProcResult<u32>;

    /// Command line from the environment block; empty on any failure
    fn command_line(&self, pid: ProcessId) -> String;

    fn security_profile(&self, pid: ProcessId, request: &TokenRequest) -> SecurityProfile;

    fn path_exists(&self, path: &str) -> bool;

    fn file_metadata(&self, path: &str) -> ProcResult<FileMetadata>;
}
