//! Process and thread enumeration using the Windows ToolHelp32 API
//!
//! This is the legacy two-list snapshot: the process list and the thread
//! list are separate ToolHelp snapshots taken one after the other.

use crate::core::types::{ProcResult, ProcessId, ThreadRecord};
use crate::snapshot::{LegacyProcessEntry, LegacyThreadEntry};
use crate::windows::types::Handle;
use crate::windows::utils::string_conv::wide_to_string;
use std::mem;
use tracing::debug;
use winapi::shared::minwindef::FALSE;
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, Thread32First, Thread32Next,
    PROCESSENTRY32W, TH32CS_SNAPPROCESS, TH32CS_SNAPTHREAD, THREADENTRY32,
};

/// Process enumerator over a ToolHelp32 process snapshot
pub struct ProcessEnumerator {
    snapshot: Handle,
    first_called: bool,
}

impl ProcessEnumerator {
    /// Create a new process enumerator
    pub fn new() -> ProcResult<Self> {
        let raw = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) };
        Ok(ProcessEnumerator {
            snapshot: Handle::checked(raw, "CreateToolhelp32Snapshot(process)")?,
            first_called: false,
        })
    }

    fn next_process(&mut self) -> Option<LegacyProcessEntry> {
        unsafe {
            let mut entry: PROCESSENTRY32W = mem::zeroed();
            entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as u32;

            let success = if !self.first_called {
                self.first_called = true;
                Process32FirstW(self.snapshot.raw(), &mut entry)
            } else {
                Process32NextW(self.snapshot.raw(), &mut entry)
            };

            if success == FALSE {
                return None;
            }

            Some(LegacyProcessEntry {
                pid: entry.th32ProcessID,
                parent_pid: entry.th32ParentProcessID,
                thread_count: entry.cntThreads,
                base_priority: entry.pcPriClassBase,
                name: wide_to_string(&entry.szExeFile),
            })
        }
    }
}

impl Iterator for ProcessEnumerator {
    type Item = LegacyProcessEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_process()
    }
}

/// Thread enumerator over a ToolHelp32 thread snapshot (system-wide)
pub struct ThreadEnumerator {
    snapshot: Handle,
    first_called: bool,
}

impl ThreadEnumerator {
    pub fn new() -> ProcResult<Self> {
        let raw = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) };
        Ok(ThreadEnumerator {
            snapshot: Handle::checked(raw, "CreateToolhelp32Snapshot(thread)")?,
            first_called: false,
        })
    }

    fn next_thread(&mut self) -> Option<LegacyThreadEntry> {
        unsafe {
            let mut entry: THREADENTRY32 = mem::zeroed();
            entry.dwSize = mem::size_of::<THREADENTRY32>() as u32;

            let success = if !self.first_called {
                self.first_called = true;
                Thread32First(self.snapshot.raw(), &mut entry)
            } else {
                Thread32Next(self.snapshot.raw(), &mut entry)
            };

            if success == FALSE {
                return None;
            }

            Some(LegacyThreadEntry {
                tid: entry.th32ThreadID,
                owner_pid: entry.th32OwnerProcessID,
                base_priority: entry.tpBasePri,
            })
        }
    }
}

impl Iterator for ThreadEnumerator {
    type Item = LegacyThreadEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_thread()
    }
}

/// Captures the process list
pub fn capture_processes() -> ProcResult<Vec<LegacyProcessEntry>> {
    let processes: Vec<_> = ProcessEnumerator::new()?.collect();
    debug!("toolhelp process list has {} entries", processes.len());
    Ok(processes)
}

/// Captures the system-wide thread list
pub fn capture_threads() -> ProcResult<Vec<LegacyThreadEntry>> {
    let threads: Vec<_> = ThreadEnumerator::new()?.collect();
    debug!("toolhelp thread list has {} entries", threads.len());
    Ok(threads)
}

/// Threads owned by `pid`, from a fresh thread list
pub fn threads_of(pid: ProcessId) -> ProcResult<Vec<ThreadRecord>> {
    Ok(ThreadEnumerator::new()?
        .filter(|entry| entry.owner_pid == pid)
        .map(|entry| ThreadRecord::from(&entry))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_capture_processes() {
        let processes = capture_processes().unwrap();
        // Should have at least System and System Idle Process
        assert!(processes.len() >= 2);
        assert!(processes.iter().any(|p| p.pid == 4));
        assert!(processes.iter().any(|p| p.pid == std::process::id()));
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_own_threads_listed() {
        let threads = threads_of(std::process::id()).unwrap();
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|t| t.owner_pid == std::process::id()));
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_process_enumerator_iterator() {
        let count = ProcessEnumerator::new().unwrap().take(5).count();
        assert!(count > 0);
    }
}
