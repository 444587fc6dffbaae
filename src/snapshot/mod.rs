//! System-wide process snapshots
//!
//! The native path issues one query that returns every process followed by
//! its threads in a single self-describing buffer. The legacy path captures
//! a process list and a thread list separately and joins them.

#[cfg(any(test, feature = "test-support"))]
mod builder;
pub mod cursor;
pub mod layout;
pub mod legacy;
pub mod parser;
pub mod reader;

#[cfg(any(test, feature = "test-support"))]
pub use builder::SnapshotBuilder;
pub use layout::SnapshotLayout;
pub use legacy::{join_legacy, LegacyProcessEntry, LegacyThreadEntry};
pub use parser::SnapshotParser;
pub use reader::{
    fill_buffer, read_processes_with, QueryStatus, SnapshotLimits, SystemQuery,
};

#[cfg(windows)]
use crate::core::types::{ProcResult, ProcessSnapshot};

/// Reads every process and its threads through the native system query
#[cfg(windows)]
pub fn read_all_processes(
    include_start_times: bool,
    limits: &SnapshotLimits,
) -> ProcResult<Vec<ProcessSnapshot>> {
    let mut query = crate::windows::bindings::ntdll::ProcessInformationQuery;
    read_processes_with(&mut query, limits, SnapshotLayout::native(), include_start_times)
}

/// Reads every process and its threads through the toolhelp lists
#[cfg(windows)]
pub fn read_all_processes_legacy() -> ProcResult<Vec<ProcessSnapshot>> {
    let processes = crate::process::enumerator::capture_processes()?;
    let threads = crate::process::enumerator::capture_threads()?;
    Ok(join_legacy(processes, threads))
}
