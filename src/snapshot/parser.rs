//! Walks a filled system process information buffer into records

use super::cursor::ByteCursor;
use super::layout::SnapshotLayout;
use crate::core::types::{
    filetime_to_system_time, well_known_process_name, Address, MemoryCounters, ProcError,
    ProcResult, ProcessRecord, ProcessSnapshot, ThreadRecord, ThreadState,
};
use tracing::trace;

/// Parser over one snapshot buffer.
///
/// `base_address` is the address the buffer had when the OS filled it; the
/// image name pointers inside the buffer are absolute and are translated
/// back to offsets through it.
pub struct SnapshotParser<'a> {
    cursor: ByteCursor<'a>,
    base_address: u64,
    layout: SnapshotLayout,
    include_start_times: bool,
}

impl<'a> SnapshotParser<'a> {
    pub fn new(buf: &'a [u8], base_address: u64, layout: SnapshotLayout) -> Self {
        SnapshotParser {
            cursor: ByteCursor::new(buf),
            base_address,
            layout,
            include_start_times: false,
        }
    }

    pub fn include_start_times(mut self, include: bool) -> Self {
        self.include_start_times = include;
        self
    }

    /// Parses every process block in buffer order.
    ///
    /// Fails if any block, thread run or name lies outside the buffer, or if a
    /// next-entry offset does not move the cursor past the current block.
    pub fn parse(&self) -> ProcResult<Vec<ProcessSnapshot>> {
        let mut snapshots = Vec::new();
        if self.cursor.is_empty() {
            return Ok(snapshots);
        }

        let mut offset = 0usize;
        let mut order = 0u32;
        loop {
            order += 1;
            let (snapshot, block_end) = self.parse_block(offset, order)?;
            snapshots.push(snapshot);

            let next = self.cursor.u32_at(offset + self.layout.process.next_entry)? as usize;
            if next == 0 {
                break;
            }
            let next_offset = offset
                .checked_add(next)
                .ok_or_else(|| ProcError::malformed(offset, "next entry offset overflows"))?;
            if next_offset < block_end {
                return Err(ProcError::malformed(
                    offset,
                    format!(
                        "next entry offset 0x{:X} does not advance past 0x{:X}",
                        next_offset, block_end
                    ),
                ));
            }
            offset = next_offset;
        }

        trace!("parsed {} process blocks", snapshots.len());
        Ok(snapshots)
    }

    /// Parses the block at `offset`, returning it with the offset just past its threads
    fn parse_block(&self, offset: usize, order: u32) -> ProcResult<(ProcessSnapshot, usize)> {
        let p = &self.layout.process;
        let ptr = self.layout.pointer_size;
        let at = |field: usize| offset + field;

        // whole fixed part must be present before reading any field
        self.cursor.bytes(offset, p.size)?;

        let pid = self.cursor.pointer_at(at(p.pid), ptr)? as u32;
        let thread_count = self.cursor.u32_at(at(p.thread_count))?;

        let mut name = self.image_name(offset)?;
        if name.is_empty() {
            if let Some(known) = well_known_process_name(pid) {
                name = known.to_string();
            }
        }

        let start_time = if self.include_start_times {
            filetime_to_system_time(self.cursor.u64_at(at(p.create_time))?)
        } else {
            None
        };

        let record = ProcessRecord {
            pid,
            parent_pid: self.cursor.pointer_at(at(p.parent_pid), ptr)? as u32,
            name,
            path: None,
            handle_count: self.cursor.u32_at(at(p.handle_count))?,
            session_id: Some(self.cursor.u32_at(at(p.session_id))?),
            enumeration_order: order,
            base_priority: self.cursor.i32_at(at(p.base_priority))?,
            thread_count,
            memory: MemoryCounters {
                virtual_size: self.cursor.pointer_at(at(p.virtual_size), ptr)?,
                peak_virtual_size: self.cursor.pointer_at(at(p.peak_virtual_size), ptr)?,
                working_set_size: self.cursor.pointer_at(at(p.working_set_size), ptr)?,
                peak_working_set_size: self
                    .cursor
                    .pointer_at(at(p.peak_working_set_size), ptr)?,
                pagefile_usage: self.cursor.pointer_at(at(p.pagefile_usage), ptr)?,
                peak_pagefile_usage: self.cursor.pointer_at(at(p.peak_pagefile_usage), ptr)?,
                private_bytes: self.cursor.pointer_at(at(p.private_bytes), ptr)?,
            },
            start_time,
        };

        let threads_start = offset + p.size;
        let threads_len = (thread_count as usize)
            .checked_mul(self.layout.thread.size)
            .ok_or_else(|| ProcError::malformed(offset, "thread count overflows"))?;
        self.cursor.bytes(threads_start, threads_len).map_err(|_| {
            ProcError::malformed(
                offset,
                format!("{} thread records run past end of buffer", thread_count),
            )
        })?;

        let threads = (0..thread_count as usize)
            .map(|i| self.parse_thread(threads_start + i * self.layout.thread.size))
            .collect::<ProcResult<Vec<_>>>()?;

        Ok((ProcessSnapshot { record, threads }, threads_start + threads_len))
    }

    fn parse_thread(&self, offset: usize) -> ProcResult<ThreadRecord> {
        let t = &self.layout.thread;
        let ptr = self.layout.pointer_size;
        let at = |field: usize| offset + field;

        let create_time = if self.include_start_times {
            filetime_to_system_time(self.cursor.u64_at(at(t.create_time))?)
        } else {
            None
        };

        Ok(ThreadRecord {
            tid: self.cursor.pointer_at(at(t.client_tid), ptr)? as u32,
            owner_pid: self.cursor.pointer_at(at(t.client_pid), ptr)? as u32,
            priority: self.cursor.i32_at(at(t.priority))?,
            base_priority: self.cursor.i32_at(at(t.base_priority))?,
            start_address: Address::new(self.cursor.pointer_at(at(t.start_address), ptr)?),
            state: ThreadState::from(self.cursor.u32_at(at(t.state))?),
            create_time,
        })
    }

    /// Image name of the block at `offset`; empty when the OS supplied none
    fn image_name(&self, offset: usize) -> ProcResult<String> {
        let p = &self.layout.process;
        let len = self.cursor.u16_at(offset + p.image_name_length)? as usize;
        let pointer = self
            .cursor
            .pointer_at(offset + p.image_name_buffer, self.layout.pointer_size)?;
        if len == 0 || pointer == 0 {
            return Ok(String::new());
        }

        let relative = pointer
            .checked_sub(self.base_address)
            .and_then(|rel| usize::try_from(rel).ok())
            .ok_or_else(|| {
                ProcError::malformed(
                    offset,
                    format!("image name pointer 0x{:X} lies before the buffer", pointer),
                )
            })?;
        self.cursor.utf16_at(relative, len)
    }
}
