//! Process information aggregation
//!
//! The aggregator and its probe trait are platform independent; the live
//! Windows probe, process handles and toolhelp enumeration are Windows only.

pub mod aggregator;
pub mod probe;

#[cfg(windows)]
pub mod enumerator;
#[cfg(windows)]
pub mod handle;
#[cfg(windows)]
pub mod native;

pub use aggregator::{Aggregator, AggregatorOptions, Stage};
pub use probe::SystemProbe;

#[cfg(windows)]
pub use enumerator::{capture_processes, capture_threads, ProcessEnumerator, ThreadEnumerator};
#[cfg(windows)]
pub use handle::{ProcessAccess, ProcessHandle};
#[cfg(windows)]
pub use native::{get_all_processes, get_process, WindowsProbe};
