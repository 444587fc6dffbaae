//! Two-list (toolhelp-style) snapshot: processes and threads captured
//! separately and joined by owning process id.

use crate::core::types::{
    well_known_process_name, ProcessId, ProcessRecord, ProcessSnapshot, ThreadId, ThreadRecord,
};
use std::collections::HashMap;
use tracing::debug;

/// One row of the process list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyProcessEntry {
    pub pid: ProcessId,
    pub parent_pid: ProcessId,
    pub thread_count: u32,
    pub base_priority: i32,
    pub name: String,
}

/// One row of the thread list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyThreadEntry {
    pub tid: ThreadId,
    pub owner_pid: ProcessId,
    pub base_priority: i32,
}

impl From<&LegacyThreadEntry> for ThreadRecord {
    fn from(entry: &LegacyThreadEntry) -> Self {
        ThreadRecord {
            tid: entry.tid,
            owner_pid: entry.owner_pid,
            priority: entry.base_priority,
            base_priority: entry.base_priority,
            ..Default::default()
        }
    }
}

/// Joins the two lists into process snapshots in process-list order.
///
/// The two lists are taken at different instants, so the declared thread
/// count is replaced by the number of threads actually joined. Threads whose
/// owner is not in the process list are dropped.
pub fn join_legacy(
    processes: Vec<LegacyProcessEntry>,
    threads: Vec<LegacyThreadEntry>,
) -> Vec<ProcessSnapshot> {
    let mut by_owner: HashMap<ProcessId, Vec<ThreadRecord>> = HashMap::new();
    for thread in &threads {
        by_owner
            .entry(thread.owner_pid)
            .or_default()
            .push(ThreadRecord::from(thread));
    }

    processes
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let threads = by_owner.remove(&entry.pid).unwrap_or_default();
            if threads.len() as u32 != entry.thread_count {
                debug!(
                    "pid {} declared {} threads, thread list has {}",
                    entry.pid,
                    entry.thread_count,
                    threads.len()
                );
            }
            let name = if entry.name.is_empty() {
                well_known_process_name(entry.pid)
                    .map(str::to_string)
                    .unwrap_or_default()
            } else {
                entry.name
            };
            ProcessSnapshot {
                record: ProcessRecord {
                    pid: entry.pid,
                    parent_pid: entry.parent_pid,
                    name,
                    enumeration_order: index as u32 + 1,
                    base_priority: entry.base_priority,
                    thread_count: threads.len() as u32,
                    ..Default::default()
                },
                threads,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn process(pid: ProcessId, name: &str, thread_count: u32) -> LegacyProcessEntry {
        LegacyProcessEntry {
            pid,
            parent_pid: 4,
            thread_count,
            base_priority: 8,
            name: name.to_string(),
        }
    }

    fn thread(tid: ThreadId, owner_pid: ProcessId) -> LegacyThreadEntry {
        LegacyThreadEntry {
            tid,
            owner_pid,
            base_priority: 8,
        }
    }

    #[test]
    fn test_threads_joined_to_owner() {
        let snaps = join_legacy(
            vec![process(100, "a.exe", 2), process(200, "b.exe", 1)],
            vec![thread(101, 100), thread(201, 200), thread(102, 100)],
        );
        assert_eq!(snaps[0].thread_ids(), vec![101, 102]);
        assert_eq!(snaps[1].thread_ids(), vec![201]);
        assert_eq!(snaps[0].record.enumeration_order, 1);
        assert_eq!(snaps[1].record.enumeration_order, 2);
    }

    #[test]
    fn test_thread_count_matches_joined_threads() {
        // process list claims 5, only 1 thread survived until the thread list
        let snaps = join_legacy(vec![process(300, "c.exe", 5)], vec![thread(301, 300)]);
        assert_eq!(snaps[0].record.thread_count, 1);
        assert_eq!(snaps[0].threads.len(), 1);
    }

    #[test]
    fn test_orphan_threads_dropped_and_names_resolved() {
        let snaps = join_legacy(
            vec![process(0, "", 1), process(4, "", 0)],
            vec![thread(0, 0), thread(999, 12345)],
        );
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].record.name, "Idle");
        assert_eq!(snaps[1].record.name, "System");
        assert_eq!(snaps[0].threads.len(), 1);
        assert!(snaps[1].threads.is_empty());
    }

    #[test]
    fn test_legacy_records_have_no_start_times() {
        let snaps = join_legacy(vec![process(7, "x.exe", 1)], vec![thread(8, 7)]);
        assert!(snaps[0].record.start_time.is_none());
        assert!(snaps[0].threads[0].create_time.is_none());
    }
}
