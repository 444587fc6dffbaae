//! Synthetic snapshot buffers in the exact native byte layout.
//!
//! Used by tests and benchmarks to exercise the parser without the OS.
//! Outside this crate's own tests it needs the `test-support` feature.

use super::layout::SnapshotLayout;
use crate::core::types::{MemoryCounters, ProcessId, ThreadId};

#[derive(Debug, Clone, Default)]
struct ThreadSpec {
    tid: ThreadId,
    state: u32,
    priority: i32,
    start_address: u64,
}

#[derive(Debug, Clone, Default)]
struct ProcessSpec {
    pid: ProcessId,
    parent_pid: ProcessId,
    name: String,
    session_id: u32,
    handle_count: u32,
    base_priority: i32,
    create_time: u64,
    counters: MemoryCounters,
    threads: Vec<ThreadSpec>,
}

/// Builder for a buffer the parser will accept.
///
/// Thread and attribute calls apply to the most recently added process.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    layout: SnapshotLayout,
    base_address: u64,
    processes: Vec<ProcessSpec>,
}

impl SnapshotBuilder {
    pub fn new(layout: SnapshotLayout, base_address: u64) -> Self {
        SnapshotBuilder {
            layout,
            base_address,
            processes: Vec::new(),
        }
    }

    pub fn layout(&self) -> SnapshotLayout {
        self.layout
    }

    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    pub fn process(&mut self, pid: ProcessId, parent_pid: ProcessId, name: &str) -> &mut Self {
        self.processes.push(ProcessSpec {
            pid,
            parent_pid,
            name: name.to_string(),
            base_priority: 8,
            ..Default::default()
        });
        self
    }

    pub fn thread(&mut self, tid: ThreadId, state: u32) -> &mut Self {
        let start_address = 0x7FF0_0000 + u64::from(tid) * 0x10;
        self.last().threads.push(ThreadSpec {
            tid,
            state,
            priority: 8,
            start_address,
        });
        self
    }

    pub fn session(&mut self, session_id: u32) -> &mut Self {
        self.last().session_id = session_id;
        self
    }

    pub fn handles(&mut self, handle_count: u32) -> &mut Self {
        self.last().handle_count = handle_count;
        self
    }

    pub fn base_priority(&mut self, priority: i32) -> &mut Self {
        self.last().base_priority = priority;
        self
    }

    pub fn create_time(&mut self, ticks: u64) -> &mut Self {
        self.last().create_time = ticks;
        self
    }

    pub fn counters(&mut self, counters: MemoryCounters) -> &mut Self {
        self.last().counters = counters;
        self
    }

    fn last(&mut self) -> &mut ProcessSpec {
        if self.processes.is_empty() {
            self.processes.push(ProcessSpec::default());
        }
        let last = self.processes.len() - 1;
        &mut self.processes[last]
    }

    /// Serializes every process block, its threads and its name
    pub fn build(&self) -> Vec<u8> {
        let p = self.layout.process;
        let t = self.layout.thread;
        let ptr = self.layout.pointer_size;
        let mut buf = Vec::new();

        for (index, spec) in self.processes.iter().enumerate() {
            let start = buf.len();
            let name: Vec<u8> = spec
                .name
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect();
            let threads_len = spec.threads.len() * t.size;
            let name_offset = start + p.size + threads_len;
            let block_len = align8(p.size + threads_len + name.len());
            buf.resize(start + block_len, 0);

            let is_last = index + 1 == self.processes.len();
            let next = if is_last { 0 } else { block_len as u32 };
            put(&mut buf, start + p.next_entry, &next.to_le_bytes());
            put(
                &mut buf,
                start + p.thread_count,
                &(spec.threads.len() as u32).to_le_bytes(),
            );
            put(&mut buf, start + p.create_time, &spec.create_time.to_le_bytes());
            if !name.is_empty() {
                put(
                    &mut buf,
                    start + p.image_name_length,
                    &(name.len() as u16).to_le_bytes(),
                );
                put_pointer(
                    &mut buf,
                    start + p.image_name_buffer,
                    self.base_address + name_offset as u64,
                    ptr,
                );
                put(&mut buf, name_offset, &name);
            }
            put(&mut buf, start + p.base_priority, &spec.base_priority.to_le_bytes());
            put_pointer(&mut buf, start + p.pid, u64::from(spec.pid), ptr);
            put_pointer(&mut buf, start + p.parent_pid, u64::from(spec.parent_pid), ptr);
            put(&mut buf, start + p.handle_count, &spec.handle_count.to_le_bytes());
            put(&mut buf, start + p.session_id, &spec.session_id.to_le_bytes());

            let c = spec.counters;
            for (offset, value) in [
                (p.peak_virtual_size, c.peak_virtual_size),
                (p.virtual_size, c.virtual_size),
                (p.peak_working_set_size, c.peak_working_set_size),
                (p.working_set_size, c.working_set_size),
                (p.pagefile_usage, c.pagefile_usage),
                (p.peak_pagefile_usage, c.peak_pagefile_usage),
                (p.private_bytes, c.private_bytes),
            ] {
                put_pointer(&mut buf, start + offset, value, ptr);
            }

            for (i, thread) in spec.threads.iter().enumerate() {
                let at = start + p.size + i * t.size;
                put(&mut buf, at + t.create_time, &spec.create_time.to_le_bytes());
                put_pointer(&mut buf, at + t.start_address, thread.start_address, ptr);
                put_pointer(&mut buf, at + t.client_pid, u64::from(spec.pid), ptr);
                put_pointer(&mut buf, at + t.client_tid, u64::from(thread.tid), ptr);
                put(&mut buf, at + t.priority, &thread.priority.to_le_bytes());
                put(&mut buf, at + t.base_priority, &thread.priority.to_le_bytes());
                put(&mut buf, at + t.state, &thread.state.to_le_bytes());
            }
        }
        buf
    }
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

fn put(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn put_pointer(buf: &mut [u8], offset: usize, value: u64, pointer_size: usize) {
    if pointer_size == 4 {
        put(buf, offset, &(value as u32).to_le_bytes());
    } else {
        put(buf, offset, &value.to_le_bytes());
    }
}
