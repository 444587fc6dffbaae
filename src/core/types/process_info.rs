//! Process, thread and module record types

use super::security::SecurityProfile;
use super::{Address, ProcessId, ThreadId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 100ns intervals between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;

/// Converts a FILETIME tick count into a `SystemTime`; zero means "not set".
pub fn filetime_to_system_time(ticks: u64) -> Option<SystemTime> {
    if ticks == 0 {
        return None;
    }
    let since_unix = ticks.checked_sub(FILETIME_UNIX_EPOCH)?;
    Some(UNIX_EPOCH + Duration::from_nanos(since_unix.saturating_mul(100)))
}

/// Memory usage counters reported for a process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCounters {
    pub virtual_size: u64,
    pub peak_virtual_size: u64,
    pub working_set_size: u64,
    pub peak_working_set_size: u64,
    pub pagefile_usage: u64,
    pub peak_pagefile_usage: u64,
    pub private_bytes: u64,
}

/// Identity and resource snapshot of one process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: ProcessId,
    /// As reported by the OS; the id may since have been reused.
    pub parent_pid: ProcessId,
    pub name: String,
    pub path: Option<String>,
    pub handle_count: u32,
    pub session_id: Option<u32>,
    /// 1-based position in the snapshot, 0 when the record did not come from one.
    ///
    /// A single-process query answered by direct queries never scans, so its
    /// record keeps 0. Use [`ProcessRecord::enumeration_position`] to tell the
    /// cases apart.
    pub enumeration_order: u32,
    pub base_priority: i32,
    /// Declared number of threads; always equals the attached thread record count.
    pub thread_count: u32,
    pub memory: MemoryCounters,
    pub start_time: Option<SystemTime>,
}

impl ProcessRecord {
    /// Creates a record with only the identity fields set
    pub fn new(pid: ProcessId, name: impl Into<String>) -> Self {
        ProcessRecord {
            pid,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Position in the snapshot the record was taken from, if any
    pub fn enumeration_position(&self) -> Option<u32> {
        (self.enumeration_order != 0).then_some(self.enumeration_order)
    }

    /// Checks if this is the idle or system process
    pub fn is_system_process(&self) -> bool {
        self.pid == 0 || self.pid == 4
    }
}

/// Name used for a well-known process id when the OS supplies none
pub fn well_known_process_name(pid: ProcessId) -> Option<&'static str> {
    match pid {
        0 => Some("Idle"),
        4 => Some("System"),
        _ => None,
    }
}

/// Final component of a Windows image path
pub fn image_file_name(path: &str) -> &str {
    path.rsplit(|c: char| c == '\\' || c == '/')
        .next()
        .unwrap_or(path)
}

/// Coarse scheduler state of a thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    Initialized,
    Ready,
    Running,
    Standby,
    Terminated,
    Waiting,
    Transition,
    DeferredReady,
    GateWait,
    WaitingForProcessInSwap,
    #[default]
    Unknown,
}

impl From<u32> for ThreadState {
    fn from(raw: u32) -> Self {
        match raw {
            0 => ThreadState::Initialized,
            1 => ThreadState::Ready,
            2 => ThreadState::Running,
            3 => ThreadState::Standby,
            4 => ThreadState::Terminated,
            5 => ThreadState::Waiting,
            6 => ThreadState::Transition,
            7 => ThreadState::DeferredReady,
            8 => ThreadState::GateWait,
            9 => ThreadState::WaitingForProcessInSwap,
            _ => ThreadState::Unknown,
        }
    }
}

/// One thread of a process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub tid: ThreadId,
    pub owner_pid: ProcessId,
    pub priority: i32,
    pub base_priority: i32,
    pub start_address: Address,
    pub state: ThreadState,
    /// Only filled by the native snapshot path.
    pub create_time: Option<SystemTime>,
}

/// A process record together with the threads that belong to it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub record: ProcessRecord,
    pub threads: Vec<ThreadRecord>,
}

impl ProcessSnapshot {
    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.threads.iter().map(|t| t.tid).collect()
    }
}

/// Module loaded into a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub name: String,
    pub path: String,
    /// Position in the module table; the executable itself is 0.
    pub load_order: u32,
    pub base_address: Address,
}

/// Version-resource strings of an executable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub company: Option<String>,
    pub description: Option<String>,
}

/// Fully assembled information about one process.
///
/// Snapshot-only facts (enumeration order, base priority, virtual sizes) are
/// zero for a single-process query that never needed a full scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub record: ProcessRecord,
    pub threads: Vec<ThreadRecord>,
    /// False when a single-process query found nothing running under the id.
    pub is_running: bool,
    pub command_line: Option<String>,
    pub modules: Vec<ModuleRecord>,
    pub file_metadata: Option<FileMetadata>,
    pub security: SecurityProfile,
}

impl ProcessInfo {
    /// Record for a process id that is not currently running
    pub fn not_running(pid: ProcessId) -> Self {
        ProcessInfo {
            record: ProcessRecord::new(pid, ""),
            is_running: false,
            ..Default::default()
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.record.pid
    }

    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.threads.iter().map(|t| t.tid).collect()
    }
}

impl fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (parent {}, {} threads)",
            self.record.pid,
            self.record.name,
            self.record.parent_pid,
            self.threads.len()
        )?;
        if !self.is_running {
            write!(f, " [not running]")?;
        }
        Ok(())
    }
}
