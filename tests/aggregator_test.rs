//! Aggregator behaviour against an in-memory system probe

use pretty_assertions::assert_eq;
use procscope::core::types::*;
use procscope::{Aggregator, AggregatorOptions, SystemProbe};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

#[derive(Default)]
struct MockProbe {
    native: Vec<ProcessSnapshot>,
    legacy: Vec<ProcessSnapshot>,
    native_fails: bool,
    running: Vec<ProcessId>,
    parents: HashMap<ProcessId, ProcessId>,
    threads: HashMap<ProcessId, Vec<ThreadRecord>>,
    counters: HashMap<ProcessId, MemoryCounters>,
    handles: HashMap<ProcessId, u32>,
    limited_paths: HashMap<ProcessId, String>,
    module_paths: HashMap<ProcessId, String>,
    existing_files: Vec<String>,
    command_lines: HashMap<ProcessId, String>,
    sessions: HashMap<ProcessId, u32>,
    profile: SecurityProfile,
    snapshot_calls: AtomicUsize,
    legacy_calls: AtomicUsize,
    token_calls: AtomicUsize,
    session_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
}

fn denied(pid: ProcessId) -> ProcError {
    ProcError::access_denied(pid, "mock")
}

impl SystemProbe for MockProbe {
    fn snapshot(&self, _include_start_times: bool) -> ProcResult<Vec<ProcessSnapshot>> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if self.native_fails {
            return Err(ProcError::malformed(0x40, "next offset does not advance"));
        }
        Ok(self.native.clone())
    }

    fn legacy_snapshot(&self) -> ProcResult<Vec<ProcessSnapshot>> {
        self.legacy_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.legacy.clone())
    }

    fn is_running(&self, pid: ProcessId) -> bool {
        self.running.contains(&pid)
    }

    fn parent_pid(&self, pid: ProcessId) -> ProcResult<ProcessId> {
        self.parents.get(&pid).copied().ok_or_else(|| denied(pid))
    }

    fn threads(&self, pid: ProcessId) -> ProcResult<Vec<ThreadRecord>> {
        Ok(self.threads.get(&pid).cloned().unwrap_or_default())
    }

    fn start_time(&self, pid: ProcessId) -> ProcResult<Option<SystemTime>> {
        Err(denied(pid))
    }

    fn memory_counters(&self, pid: ProcessId) -> ProcResult<MemoryCounters> {
        self.counters.get(&pid).copied().ok_or_else(|| denied(pid))
    }

    fn handle_count(&self, pid: ProcessId) -> ProcResult<u32> {
        self.handles.get(&pid).copied().ok_or_else(|| denied(pid))
    }

    fn limited_image_path(&self, pid: ProcessId) -> ProcResult<String> {
        self.limited_paths.get(&pid).cloned().ok_or_else(|| denied(pid))
    }

    fn main_module_path(&self, pid: ProcessId) -> ProcResult<String> {
        self.module_paths.get(&pid).cloned().ok_or_else(|| denied(pid))
    }

    fn modules(&self, pid: ProcessId) -> ProcResult<Vec<ModuleRecord>> {
        let path = self.main_module_path(pid)?;
        Ok(vec![ModuleRecord {
            name: image_file_name(&path).to_string(),
            path,
            load_order: 0,
            base_address: Address::from(0x1_4000_0000u64),
        }])
    }

    fn session_id(&self, pid: ProcessId) -> ProcResult<u32> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        self.sessions.get(&pid).copied().ok_or_else(|| denied(pid))
    }

    fn command_line(&self, pid: ProcessId) -> String {
        self.command_lines.get(&pid).cloned().unwrap_or_default()
    }

    fn security_profile(&self, _pid: ProcessId, _request: &TokenRequest) -> SecurityProfile {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        self.profile.clone()
    }

    fn path_exists(&self, path: &str) -> bool {
        self.existing_files.iter().any(|f| f == path)
    }

    fn file_metadata(&self, _path: &str) -> ProcResult<FileMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(FileMetadata {
            company: Some("Contoso".to_string()),
            description: Some("Test application".to_string()),
        })
    }
}

fn thread(tid: ThreadId, owner: ProcessId) -> ThreadRecord {
    ThreadRecord {
        tid,
        owner_pid: owner,
        ..Default::default()
    }
}

fn snapshot(
    order: u32,
    pid: ProcessId,
    parent: ProcessId,
    name: &str,
    tids: &[ThreadId],
    session: Option<u32>,
) -> ProcessSnapshot {
    let threads: Vec<_> = tids.iter().map(|&tid| thread(tid, pid)).collect();
    let mut record = ProcessRecord::new(pid, name);
    record.parent_pid = parent;
    record.enumeration_order = order;
    record.base_priority = 8;
    record.session_id = session;
    record.thread_count = threads.len() as u32;
    ProcessSnapshot { record, threads }
}

fn system_with_app() -> MockProbe {
    MockProbe {
        native: vec![
            snapshot(1, 0, 0, "Idle", &[0], Some(0)),
            snapshot(2, 4, 0, "System", &[8, 12], Some(0)),
            snapshot(3, 1200, 800, "app.exe", &[1204, 1208, 1212], Some(1)),
        ],
        running: vec![0, 4, 1200],
        ..Default::default()
    }
}

fn sequential() -> AggregatorOptions {
    AggregatorOptions {
        parallel: false,
        worker_threads: 1,
    }
}

#[test]
fn test_not_running_pid_yields_placeholder() {
    let aggregator = Aggregator::new(system_with_app());
    let info = aggregator.get_process(31337, &InfoRequest::everything());

    assert!(!info.is_running);
    assert_eq!(info.pid(), 31337);
    assert!(info.threads.is_empty());
    assert!(info.security.is_empty());
    assert_eq!(aggregator.probe().snapshot_calls.load(Ordering::SeqCst), 0);
    assert_eq!(aggregator.probe().token_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_direct_queries_avoid_full_scan() {
    let mut probe = system_with_app();
    probe.parents.insert(1200, 800);
    probe
        .limited_paths
        .insert(1200, "C:\\Apps\\app.exe".to_string());
    probe.threads.insert(1200, vec![thread(1204, 1200)]);
    probe.counters.insert(
        1200,
        MemoryCounters {
            working_set_size: 4096,
            ..Default::default()
        },
    );
    probe.handles.insert(1200, 64);

    let aggregator = Aggregator::new(probe);
    let info = aggregator.get_process(1200, &InfoRequest::basic());

    assert!(info.is_running);
    assert_eq!(info.record.name, "app.exe");
    assert_eq!(info.record.parent_pid, 800);
    assert_eq!(info.thread_ids(), vec![1204]);
    assert_eq!(info.record.memory.working_set_size, 4096);
    assert_eq!(info.record.handle_count, 64);
    assert_eq!(aggregator.probe().snapshot_calls.load(Ordering::SeqCst), 0);
    // snapshot-only facts stay unset without a scan
    assert_eq!(info.record.enumeration_order, 0);
    assert_eq!(info.record.enumeration_position(), None);
}

#[test]
fn test_full_scan_runs_at_most_once() {
    // every direct query fails: name, parent, threads, counters all fall back
    let aggregator = Aggregator::new(system_with_app());
    let info = aggregator.get_process(1200, &InfoRequest::everything());

    assert_eq!(aggregator.probe().snapshot_calls.load(Ordering::SeqCst), 1);
    assert_eq!(info.record.name, "app.exe");
    assert_eq!(info.record.parent_pid, 800);
    assert_eq!(info.thread_ids(), vec![1204, 1208, 1212]);
    assert_eq!(info.record.thread_count, 3);
    assert_eq!(info.record.enumeration_order, 3);
    assert_eq!(info.record.enumeration_position(), Some(3));
    assert_eq!(info.record.base_priority, 8);
    assert_eq!(info.record.session_id, Some(1));
    assert_eq!(aggregator.probe().session_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_fallback_scan_uses_legacy_when_native_empty() {
    let mut probe = system_with_app();
    probe.legacy = std::mem::take(&mut probe.native);

    let aggregator = Aggregator::new(probe);
    let info = aggregator.get_process(1200, &InfoRequest::basic());

    assert_eq!(aggregator.probe().snapshot_calls.load(Ordering::SeqCst), 1);
    assert_eq!(aggregator.probe().legacy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(info.record.parent_pid, 800);
    assert_eq!(info.threads.len(), 3);
}

#[test]
fn test_process_missing_from_scan_keeps_defaults() {
    let mut probe = system_with_app();
    probe.running.push(5000);

    let aggregator = Aggregator::new(probe);
    let info = aggregator.get_process(5000, &InfoRequest::basic());

    assert!(info.is_running);
    assert_eq!(info.record.name, "");
    assert_eq!(info.record.parent_pid, 0);
    assert!(info.threads.is_empty());
    assert_eq!(info.record.thread_count, 0);
    assert_eq!(aggregator.probe().snapshot_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_fallback_scan_is_not_fatal() {
    let mut probe = system_with_app();
    probe.native_fails = true;
    probe.parents.insert(1200, 800);

    let aggregator = Aggregator::new(probe);
    let info = aggregator.get_process(1200, &InfoRequest::basic());

    assert!(info.is_running);
    assert_eq!(info.record.parent_pid, 800);
    assert!(info.threads.is_empty());
    assert_eq!(aggregator.probe().snapshot_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_well_known_pid_named_without_path() {
    let mut probe = system_with_app();
    probe.parents.insert(4, 0);
    probe.threads.insert(4, vec![thread(8, 4)]);

    let aggregator = Aggregator::new(probe);
    let info = aggregator.get_process(4, &InfoRequest::basic());

    assert_eq!(info.record.name, "System");
    assert!(info.record.path.is_none());
}

#[test]
fn test_all_processes_in_snapshot_order() {
    let aggregator = Aggregator::with_options(system_with_app(), sequential());
    let all = aggregator.get_all_processes(&InfoRequest::basic()).unwrap();

    let pids: Vec<_> = all.iter().map(ProcessInfo::pid).collect();
    assert_eq!(pids, vec![0, 4, 1200]);
    assert!(all.iter().all(|p| p.is_running));
    assert!(all
        .iter()
        .all(|p| p.record.thread_count as usize == p.threads.len()));
    assert_eq!(aggregator.probe().snapshot_calls.load(Ordering::SeqCst), 1);
    assert_eq!(aggregator.probe().legacy_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_parallel_matches_sequential() {
    let request = InfoRequest::everything();
    let summary = |all: Vec<ProcessInfo>| -> Vec<(ProcessId, String, Vec<ThreadId>)> {
        all.into_iter()
            .map(|p| (p.pid(), p.record.name.clone(), p.thread_ids()))
            .collect()
    };

    let sequential_result = Aggregator::with_options(system_with_app(), sequential())
        .get_all_processes(&request)
        .unwrap();
    let parallel_result = Aggregator::with_options(
        system_with_app(),
        AggregatorOptions {
            parallel: true,
            worker_threads: 2,
        },
    )
    .get_all_processes(&request)
    .unwrap();

    assert_eq!(summary(sequential_result), summary(parallel_result));
}

#[test]
fn test_all_processes_legacy_fallback_resolves_sessions() {
    let mut probe = MockProbe {
        legacy: vec![
            snapshot(1, 4, 0, "System", &[8], None),
            snapshot(2, 1200, 800, "app.exe", &[1204], None),
        ],
        ..Default::default()
    };
    probe.sessions.insert(1200, 2);

    let aggregator = Aggregator::with_options(probe, sequential());
    let all = aggregator
        .get_all_processes(&InfoRequest::everything())
        .unwrap();

    assert_eq!(aggregator.probe().legacy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(aggregator.probe().session_calls.load(Ordering::SeqCst), 2);
    assert_eq!(all[0].record.session_id, None);
    assert_eq!(all[1].record.session_id, Some(2));
}

#[test]
fn test_malformed_snapshot_is_an_error() {
    let mut probe = system_with_app();
    probe.native_fails = true;

    let aggregator = Aggregator::with_options(probe, sequential());
    let result = aggregator.get_all_processes(&InfoRequest::basic());

    assert!(matches!(result, Err(ProcError::MalformedSnapshot { .. })));
    assert_eq!(aggregator.probe().legacy_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_basic_request_skips_optional_queries() {
    let mut probe = system_with_app();
    probe
        .command_lines
        .insert(1200, "app.exe --serve".to_string());
    probe
        .limited_paths
        .insert(1200, "C:\\Apps\\app.exe".to_string());

    let aggregator = Aggregator::with_options(probe, sequential());
    let all = aggregator.get_all_processes(&InfoRequest::basic()).unwrap();
    let app = &all[2];

    assert!(app.command_line.is_none());
    assert!(app.record.path.is_none());
    assert!(app.modules.is_empty());
    assert!(app.file_metadata.is_none());
    assert!(app.security.is_empty());
    assert_eq!(aggregator.probe().token_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_optional_fields_when_requested() {
    let mut probe = system_with_app();
    probe
        .command_lines
        .insert(1200, "app.exe --serve".to_string());
    probe
        .module_paths
        .insert(1200, "C:\\Apps\\app.exe".to_string());
    probe.existing_files.push("C:\\Apps\\app.exe".to_string());
    probe.profile = SecurityProfile {
        integrity: IntegrityLevel::Medium,
        elevation: Some(Elevation::NotElevated),
        ..Default::default()
    };

    let aggregator = Aggregator::with_options(probe, sequential());
    let all = aggregator
        .get_all_processes(&InfoRequest::everything())
        .unwrap();
    let app = &all[2];

    assert_eq!(app.command_line.as_deref(), Some("app.exe --serve"));
    // limited query failed; module zero supplies the path
    assert_eq!(app.record.path.as_deref(), Some("C:\\Apps\\app.exe"));
    assert_eq!(app.modules.len(), 1);
    assert_eq!(
        app.file_metadata.as_ref().and_then(|m| m.company.as_deref()),
        Some("Contoso")
    );
    assert_eq!(app.security.integrity, IntegrityLevel::Medium);
    // idle and system have no command line
    assert!(all[0].command_line.is_none());
    assert_eq!(aggregator.probe().token_calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_metadata_skipped_for_missing_file() {
    let mut probe = system_with_app();
    probe
        .limited_paths
        .insert(1200, "C:\\Gone\\app.exe".to_string());

    let aggregator = Aggregator::with_options(probe, sequential());
    let request = InfoRequest {
        file_metadata: true,
        ..InfoRequest::basic()
    };
    let all = aggregator.get_all_processes(&request).unwrap();

    assert!(all[2].file_metadata.is_none());
    // path was only resolved for the metadata lookup
    assert!(all[2].record.path.is_none());
    assert_eq!(aggregator.probe().metadata_calls.load(Ordering::SeqCst), 0);
}
