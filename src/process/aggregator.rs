//! Assembles full process records from the snapshot and per-process queries
//!
//! Every process, whether it came from a full snapshot or from a single-PID
//! request, goes through the same stage sequence. The only difference
//! between the two modes is where snapshot-backed facts come from: the
//! all-processes path already holds the snapshot entry, while the single-PID
//! path runs one full scan lazily, the first time a direct query comes back
//! with nothing, and reuses it for every later stage of the same call.

use super::probe::SystemProbe;
use crate::core::types::{
    image_file_name, well_known_process_name, InfoRequest, ProcResult, ProcessId, ProcessInfo,
    ProcessRecord, ProcessSnapshot,
};
use rayon::prelude::*;
use std::cell::OnceCell;
use tracing::{debug, trace, warn};

/// Tuning for the all-processes path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorOptions {
    /// Resolve per-process details on a worker pool
    pub parallel: bool,
    /// Pool size; 0 lets rayon decide
    pub worker_threads: usize,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        AggregatorOptions {
            parallel: true,
            worker_threads: 0,
        }
    }
}

/// Pipeline stages, in order. Each optional stage is skipped when the
/// request does not ask for its fields; a failing stage leaves its fields
/// at their defaults and hands over to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Identified,
    Path,
    Threads,
    Session,
    CommandLine,
    Token,
    Final,
}

impl Stage {
    pub fn next(self) -> Stage {
        match self {
            Stage::Identified => Stage::Path,
            Stage::Path => Stage::Threads,
            Stage::Threads => Stage::Session,
            Stage::Session => Stage::CommandLine,
            Stage::CommandLine => Stage::Token,
            Stage::Token | Stage::Final => Stage::Final,
        }
    }
}

/// Source of snapshot-backed facts for one process
enum Scan<'s> {
    /// The record came out of a full snapshot
    Done(&'s ProcessSnapshot),
    /// Single-PID mode: a full scan runs on first need, at most once
    Deferred {
        pid: ProcessId,
        include_start_times: bool,
        cell: &'s OnceCell<Option<ProcessSnapshot>>,
    },
}

impl<'s> Scan<'s> {
    /// The snapshot entry, running the full scan if it has not run yet
    fn lookup<P: SystemProbe>(&self, probe: &P) -> Option<&'s ProcessSnapshot> {
        match *self {
            Scan::Done(snapshot) => Some(snapshot),
            Scan::Deferred {
                pid,
                include_start_times,
                cell,
            } => cell
                .get_or_init(|| full_scan_lookup(probe, pid, include_start_times))
                .as_ref(),
        }
    }

    /// The snapshot entry only if it is already at hand
    fn peek(&self) -> Option<&'s ProcessSnapshot> {
        match *self {
            Scan::Done(snapshot) => Some(snapshot),
            Scan::Deferred { cell, .. } => cell.get().and_then(Option::as_ref),
        }
    }
}

/// Takes a full snapshot and picks out `pid`; any failure means "not found"
fn full_scan_lookup<P: SystemProbe>(
    probe: &P,
    pid: ProcessId,
    include_start_times: bool,
) -> Option<ProcessSnapshot> {
    debug!("pid {}: falling back to a full snapshot scan", pid);
    let snapshots = match take_snapshot(probe, include_start_times) {
        Ok(snapshots) => snapshots,
        Err(e) => {
            warn!("pid {}: fallback snapshot failed: {}", pid, e);
            return None;
        }
    };
    snapshots.into_iter().find(|s| s.record.pid == pid)
}

/// Native snapshot, or the legacy two-list snapshot when the native one is empty
fn take_snapshot<P: SystemProbe>(
    probe: &P,
    include_start_times: bool,
) -> ProcResult<Vec<ProcessSnapshot>> {
    let snapshots = probe.snapshot(include_start_times)?;
    if !snapshots.is_empty() {
        return Ok(snapshots);
    }
    warn!("native process snapshot returned nothing, using the legacy listing");
    probe.legacy_snapshot()
}

/// One process moving through the stages
struct Pipeline<'a, 's, P> {
    probe: &'a P,
    request: &'a InfoRequest,
    scan: Scan<'s>,
    info: ProcessInfo,
    /// Limited-query path, kept when it was already fetched for the name
    limited_path: Option<String>,
}

impl<'a, 's, P: SystemProbe> Pipeline<'a, 's, P> {
    fn pid(&self) -> ProcessId {
        self.info.record.pid
    }

    fn run(mut self) -> ProcessInfo {
        let mut stage = Stage::Identified;
        while stage != Stage::Final {
            trace!("pid {}: stage {:?}", self.pid(), stage);
            match stage {
                Stage::Identified => self.identify(),
                Stage::Path => self.resolve_path(),
                Stage::Threads => self.resolve_threads(),
                Stage::Session => self.resolve_session(),
                Stage::CommandLine => self.resolve_command_line(),
                Stage::Token => self.resolve_token(),
                Stage::Final => {}
            }
            stage = stage.next();
        }
        self.finish()
    }

    /// Fills identity and resource fields of a single-PID record from direct
    /// queries; snapshot-backed records are already identified.
    fn identify(&mut self) {
        if let Scan::Done(_) = self.scan {
            return;
        }
        let pid = self.pid();
        let probe = self.probe;

        if self.info.record.name.is_empty() {
            if let Some(name) = well_known_process_name(pid) {
                self.info.record.name = name.to_string();
            } else if let Ok(path) = probe.limited_image_path(pid) {
                if !path.is_empty() {
                    self.info.record.name = image_file_name(&path).to_string();
                    self.limited_path = Some(path);
                }
            }
        }
        if self.info.record.name.is_empty() {
            if let Some(snapshot) = self.scan.lookup(probe) {
                self.info.record.name = snapshot.record.name.clone();
            }
        }

        let parent = probe.parent_pid(pid).unwrap_or_else(|e| {
            debug!("pid {}: parent query failed: {}", pid, e);
            0
        });
        self.info.record.parent_pid = if parent != 0 {
            parent
        } else {
            self.scan
                .lookup(probe)
                .map_or(0, |snapshot| snapshot.record.parent_pid)
        };

        match probe.memory_counters(pid) {
            Ok(counters) => self.info.record.memory = counters,
            Err(e) => {
                debug!("pid {}: memory counters unavailable: {}", pid, e);
                if let Some(snapshot) = self.scan.lookup(probe) {
                    self.info.record.memory = snapshot.record.memory;
                }
            }
        }

        match probe.handle_count(pid) {
            Ok(count) => self.info.record.handle_count = count,
            Err(e) => {
                debug!("pid {}: handle count unavailable: {}", pid, e);
                if let Some(snapshot) = self.scan.lookup(probe) {
                    self.info.record.handle_count = snapshot.record.handle_count;
                }
            }
        }

        if self.request.start_time {
            let direct = probe.start_time(pid).unwrap_or_else(|e| {
                debug!("pid {}: start time unavailable: {}", pid, e);
                None
            });
            self.info.record.start_time = direct.or_else(|| {
                self.scan
                    .lookup(probe)
                    .and_then(|snapshot| snapshot.record.start_time)
            });
        }
    }

    fn resolve_path(&mut self) {
        let wants_path = self.request.path || self.request.file_metadata;
        if !wants_path && !self.request.modules {
            return;
        }
        let pid = self.pid();
        let probe = self.probe;

        if wants_path {
            let limited = match self.limited_path.take() {
                Some(path) => Some(path),
                None => probe.limited_image_path(pid).ok().filter(|p| !p.is_empty()),
            };
            let path = limited.or_else(|| {
                probe
                    .main_module_path(pid)
                    .map_err(|e| debug!("pid {}: no image path: {}", pid, e))
                    .ok()
                    .filter(|p| !p.is_empty())
            });

            if self.request.file_metadata {
                if let Some(path) = path.as_deref() {
                    if probe.path_exists(path) {
                        self.info.file_metadata = probe
                            .file_metadata(path)
                            .map_err(|e| debug!("pid {}: no file metadata: {}", pid, e))
                            .ok();
                    }
                }
            }
            if self.request.path {
                self.info.record.path = path;
            }
        }

        if self.request.modules {
            self.info.modules = probe.modules(pid).unwrap_or_else(|e| {
                debug!("pid {}: module list unavailable: {}", pid, e);
                Vec::new()
            });
        }
    }

    fn resolve_threads(&mut self) {
        if let Scan::Done(snapshot) = self.scan {
            self.info.threads = snapshot.threads.clone();
            return;
        }
        let pid = self.pid();
        let probe = self.probe;
        let direct = probe.threads(pid).unwrap_or_else(|e| {
            debug!("pid {}: thread list unavailable: {}", pid, e);
            Vec::new()
        });
        self.info.threads = if direct.is_empty() {
            self.scan
                .lookup(probe)
                .map(|snapshot| snapshot.threads.clone())
                .unwrap_or_default()
        } else {
            direct
        };
    }

    fn resolve_session(&mut self) {
        if !self.request.session_id || self.info.record.session_id.is_some() {
            return;
        }
        if let Some(session) = self.scan.peek().and_then(|s| s.record.session_id) {
            self.info.record.session_id = Some(session);
            return;
        }
        let pid = self.pid();
        self.info.record.session_id = self
            .probe
            .session_id(pid)
            .map_err(|e| debug!("pid {}: session id unavailable: {}", pid, e))
            .ok();
    }

    fn resolve_command_line(&mut self) {
        if !self.request.command_line {
            return;
        }
        let command_line = self.probe.command_line(self.pid());
        self.info.command_line = (!command_line.is_empty()).then_some(command_line);
    }

    fn resolve_token(&mut self) {
        let token = self.request.token();
        if !token.any() {
            return;
        }
        self.info.security = self.probe.security_profile(self.pid(), &token);
    }

    /// Copies whatever the snapshot knows that direct queries do not report
    fn finish(mut self) -> ProcessInfo {
        if let Some(snapshot) = self.scan.peek() {
            let record = &mut self.info.record;
            if record.enumeration_order == 0 {
                record.enumeration_order = snapshot.record.enumeration_order;
            }
            if record.base_priority == 0 {
                record.base_priority = snapshot.record.base_priority;
            }
            if record.memory.virtual_size == 0 {
                record.memory.virtual_size = snapshot.record.memory.virtual_size;
                record.memory.peak_virtual_size = snapshot.record.memory.peak_virtual_size;
            }
        }
        self.info.record.thread_count = self.info.threads.len() as u32;
        self.info
    }
}

/// Process information aggregator over a [`SystemProbe`]
pub struct Aggregator<P> {
    probe: P,
    options: AggregatorOptions,
}

impl<P: SystemProbe> Aggregator<P> {
    pub fn new(probe: P) -> Self {
        Self::with_options(probe, AggregatorOptions::default())
    }

    pub fn with_options(probe: P, options: AggregatorOptions) -> Self {
        Aggregator { probe, options }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn options(&self) -> AggregatorOptions {
        self.options
    }

    /// Information about one process.
    ///
    /// Always returns a record: a process id that is not running yields
    /// [`ProcessInfo::not_running`], and every field that cannot be read is
    /// left at its default.
    pub fn get_process(&self, pid: ProcessId, request: &InfoRequest) -> ProcessInfo {
        if !self.probe.is_running(pid) {
            debug!("pid {} is not running", pid);
            return ProcessInfo::not_running(pid);
        }

        let cell = OnceCell::new();
        let pipeline = Pipeline {
            probe: &self.probe,
            request,
            scan: Scan::Deferred {
                pid,
                include_start_times: request.start_time,
                cell: &cell,
            },
            info: ProcessInfo {
                record: ProcessRecord::new(pid, ""),
                is_running: true,
                ..Default::default()
            },
            limited_path: None,
        };
        pipeline.run()
    }

    /// Information about every process, in snapshot order.
    ///
    /// Fails only when the snapshot itself cannot be trusted (malformed
    /// buffer, growth limit or timeout exhausted).
    pub fn get_all_processes(&self, request: &InfoRequest) -> ProcResult<Vec<ProcessInfo>> {
        let snapshots = take_snapshot(&self.probe, request.start_time)?;
        debug!("resolving details for {} processes", snapshots.len());

        let resolve = |snapshot: &ProcessSnapshot| self.resolve_snapshot(snapshot, request);

        if !self.options.parallel || snapshots.len() < 2 {
            return Ok(snapshots.iter().map(resolve).collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.worker_threads)
            .build();
        match pool {
            Ok(pool) => Ok(pool.install(|| snapshots.par_iter().map(resolve).collect())),
            Err(e) => {
                warn!("worker pool unavailable, resolving sequentially: {}", e);
                Ok(snapshots.iter().map(resolve).collect())
            }
        }
    }

    fn resolve_snapshot(&self, snapshot: &ProcessSnapshot, request: &InfoRequest) -> ProcessInfo {
        Pipeline {
            probe: &self.probe,
            request,
            scan: Scan::Done(snapshot),
            info: ProcessInfo {
                record: snapshot.record.clone(),
                is_running: true,
                ..Default::default()
            },
            limited_path: None,
        }
        .run()
    }
}
