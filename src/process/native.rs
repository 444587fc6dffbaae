//! The live Windows implementation of [`SystemProbe`]

use super::aggregator::{Aggregator, AggregatorOptions};
use super::enumerator::threads_of;
use super::handle::ProcessHandle;
use super::probe::SystemProbe;
use crate::core::types::{
    filetime_to_system_time, FileMetadata, InfoRequest, MemoryCounters, ModuleRecord, ProcResult,
    ProcessId, ProcessInfo, ProcessSnapshot, SecurityProfile, ThreadRecord, TokenRequest,
};
use crate::memory::read_command_line;
use crate::security::inspect_process;
use crate::snapshot::{read_all_processes, read_all_processes_legacy, SnapshotLimits};
use crate::windows::bindings::{kernel32, version};
use std::path::Path;
use std::time::SystemTime;

/// Answers probe queries with live system calls
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsProbe {
    limits: SnapshotLimits,
}

impl WindowsProbe {
    pub fn new(limits: SnapshotLimits) -> Self {
        WindowsProbe { limits }
    }

    pub fn limits(&self) -> &SnapshotLimits {
        &self.limits
    }

    fn limited(&self, pid: ProcessId) -> ProcResult<ProcessHandle> {
        ProcessHandle::open_limited(pid)
    }
}

impl SystemProbe for WindowsProbe {
    fn snapshot(&self, include_start_times: bool) -> ProcResult<Vec<ProcessSnapshot>> {
        read_all_processes(include_start_times, &self.limits)
    }

    fn legacy_snapshot(&self) -> ProcResult<Vec<ProcessSnapshot>> {
        read_all_processes_legacy()
    }

    fn is_running(&self, pid: ProcessId) -> bool {
        // the idle process cannot be opened but always exists
        if pid == 0 {
            return true;
        }
        self.limited(pid).map_or(false, |handle| handle.is_active())
    }

    fn parent_pid(&self, pid: ProcessId) -> ProcResult<ProcessId> {
        self.limited(pid)?.parent_pid()
    }

    fn threads(&self, pid: ProcessId) -> ProcResult<Vec<ThreadRecord>> {
        threads_of(pid)
    }

    fn start_time(&self, pid: ProcessId) -> ProcResult<Option<SystemTime>> {
        let ticks = self.limited(pid)?.creation_ticks()?;
        Ok(filetime_to_system_time(ticks))
    }

    fn memory_counters(&self, pid: ProcessId) -> ProcResult<MemoryCounters> {
        self.limited(pid)?.memory_counters()
    }

    fn handle_count(&self, pid: ProcessId) -> ProcResult<u32> {
        self.limited(pid)?.handle_count()
    }

    fn limited_image_path(&self, pid: ProcessId) -> ProcResult<String> {
        self.limited(pid)?.image_path()
    }

    fn main_module_path(&self, pid: ProcessId) -> ProcResult<String> {
        ProcessHandle::open_for_read(pid)?.main_module_path()
    }

    fn modules(&self, pid: ProcessId) -> ProcResult<Vec<ModuleRecord>> {
        ProcessHandle::open_for_read(pid)?.modules()
    }

    fn session_id(&self, pid: ProcessId) -> ProcResult<u32> {
        kernel32::process_session_id(pid)
    }

    fn command_line(&self, pid: ProcessId) -> String {
        read_command_line(pid)
    }

    fn security_profile(&self, pid: ProcessId, request: &TokenRequest) -> SecurityProfile {
        inspect_process(pid, request)
    }

    fn path_exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn file_metadata(&self, path: &str) -> ProcResult<FileMetadata> {
        version::file_metadata(path)
    }
}

/// Information about one process, using default snapshot limits
pub fn get_process(pid: ProcessId, request: &InfoRequest) -> ProcessInfo {
    Aggregator::new(WindowsProbe::default()).get_process(pid, request)
}

/// Information about every process, using default limits and a parallel pool
pub fn get_all_processes(request: &InfoRequest) -> ProcResult<Vec<ProcessInfo>> {
    Aggregator::with_options(WindowsProbe::default(), AggregatorOptions::default())
        .get_all_processes(request)
}
