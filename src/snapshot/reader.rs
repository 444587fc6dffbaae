//! Buffer management for the system-wide process query

use super::layout::SnapshotLayout;
use super::parser::SnapshotParser;
use crate::core::types::{ProcError, ProcResult, ProcessSnapshot};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of one attempt to fill the snapshot buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// The buffer now holds `written` bytes of snapshot data.
    Complete { written: usize },
    /// The buffer was too small; the OS needs at least `required` bytes.
    TooSmall { required: usize },
    /// Any other failure status.
    Failed { status: u32 },
}

/// A system-wide process query that writes into a caller buffer
pub trait SystemQuery {
    fn query(&mut self, buffer: &mut [u8]) -> QueryStatus;
}

/// Bounds on the buffer-growth loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLimits {
    pub initial_size: usize,
    pub max_size: usize,
    pub timeout: Duration,
}

impl Default for SnapshotLimits {
    fn default() -> Self {
        SnapshotLimits {
            initial_size: 512 * 1024,
            max_size: 256 * 1024 * 1024,
            timeout: Duration::from_secs(5),
        }
    }
}

/// 8-byte aligned byte buffer; the native query rejects unaligned output.
pub struct AlignedBuffer {
    words: Vec<u64>,
    len: usize,
}

impl AlignedBuffer {
    pub fn zeroed(len: usize) -> Self {
        AlignedBuffer {
            words: vec![0u64; (len + 7) / 8],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `words` owns at least `len` initialized bytes and u8 has no alignment needs.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr() as *const u8, self.len) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and the mutable borrow of self guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr() as *mut u8, self.len) }
    }

    /// Address of the first byte, as seen by the OS when it filled the buffer
    pub fn base_address(&self) -> u64 {
        self.words.as_ptr() as usize as u64
    }
}

/// A filled snapshot buffer
pub struct FilledBuffer {
    pub buffer: AlignedBuffer,
    pub written: usize,
    /// Number of query calls it took
    pub attempts: u32,
}

impl FilledBuffer {
    pub fn data(&self) -> &[u8] {
        let end = if self.written == 0 {
            self.buffer.len()
        } else {
            self.written.min(self.buffer.len())
        };
        &self.buffer.as_bytes()[..end]
    }
}

/// Size to retry with after the OS reported `required` for a buffer of `current` bytes.
///
/// Always strictly larger than `current`; at least `required`, with a little
/// headroom for processes started between the two calls.
pub fn next_buffer_size(current: usize, required: usize) -> usize {
    if required > current {
        required.saturating_add(required / 16)
    } else {
        current.saturating_mul(2).max(current.saturating_add(1))
    }
}

/// Repeatedly issues `query` until the buffer is big enough.
///
/// Returns `Ok(None)` when the query fails for any reason other than size,
/// and an error when growth would pass `limits.max_size` or the loop runs
/// past `limits.timeout`.
pub fn fill_buffer<Q: SystemQuery>(
    query: &mut Q,
    limits: &SnapshotLimits,
) -> ProcResult<Option<FilledBuffer>> {
    let started = Instant::now();
    let mut size = limits.initial_size.clamp(1, limits.max_size.max(1));
    let mut attempts = 0u32;

    loop {
        if attempts > 0 && started.elapsed() > limits.timeout {
            return Err(ProcError::SnapshotTimeout(limits.timeout.as_millis() as u64));
        }
        attempts += 1;

        let mut buffer = AlignedBuffer::zeroed(size);
        match query.query(buffer.as_bytes_mut()) {
            QueryStatus::Complete { written } => {
                debug!(
                    "snapshot filled {} bytes after {} attempt(s), buffer {} bytes",
                    written, attempts, size
                );
                return Ok(Some(FilledBuffer {
                    buffer,
                    written,
                    attempts,
                }));
            }
            QueryStatus::TooSmall { required } => {
                let grown = next_buffer_size(size, required);
                if grown > limits.max_size {
                    return Err(ProcError::BufferLimitExceeded {
                        requested: grown,
                        limit: limits.max_size,
                    });
                }
                debug!(
                    "snapshot buffer of {} bytes too small, os wants {}, retrying with {}",
                    size, required, grown
                );
                size = grown;
            }
            QueryStatus::Failed { status } => {
                warn!("system process query failed with status 0x{:08X}", status);
                return Ok(None);
            }
        }
    }
}

/// Fills a buffer through `query` and parses it into process snapshots.
///
/// A non-size failure of the query yields an empty list; malformed buffer
/// contents and limit exhaustion are errors.
pub fn read_processes_with<Q: SystemQuery>(
    query: &mut Q,
    limits: &SnapshotLimits,
    layout: SnapshotLayout,
    include_start_times: bool,
) -> ProcResult<Vec<ProcessSnapshot>> {
    let filled = match fill_buffer(query, limits)? {
        Some(filled) => filled,
        None => return Ok(Vec::new()),
    };
    SnapshotParser::new(filled.data(), filled.buffer.base_address(), layout)
        .include_start_times(include_start_times)
        .parse()
}
