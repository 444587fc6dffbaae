//! Byte layouts of the system process information buffer
//!
//! The buffer is a chain of process blocks, each followed by its thread
//! blocks. Field offsets depend only on the pointer width of the reader.

/// Offsets inside one process block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOffsets {
    pub next_entry: usize,
    pub thread_count: usize,
    pub create_time: usize,
    pub image_name_length: usize,
    pub image_name_buffer: usize,
    pub base_priority: usize,
    pub pid: usize,
    pub parent_pid: usize,
    pub handle_count: usize,
    pub session_id: usize,
    pub peak_virtual_size: usize,
    pub virtual_size: usize,
    pub peak_working_set_size: usize,
    pub working_set_size: usize,
    pub pagefile_usage: usize,
    pub peak_pagefile_usage: usize,
    pub private_bytes: usize,
    /// Size of the fixed part; thread blocks start right after it.
    pub size: usize,
}

/// Offsets inside one thread block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadOffsets {
    pub create_time: usize,
    pub start_address: usize,
    pub client_pid: usize,
    pub client_tid: usize,
    pub priority: usize,
    pub base_priority: usize,
    pub state: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLayout {
    pub pointer_size: usize,
    pub process: ProcessOffsets,
    pub thread: ThreadOffsets,
}

impl SnapshotLayout {
    pub const X64: SnapshotLayout = SnapshotLayout {
        pointer_size: 8,
        process: ProcessOffsets {
            next_entry: 0x00,
            thread_count: 0x04,
            create_time: 0x20,
            image_name_length: 0x38,
            image_name_buffer: 0x40,
            base_priority: 0x48,
            pid: 0x50,
            parent_pid: 0x58,
            handle_count: 0x60,
            session_id: 0x64,
            peak_virtual_size: 0x70,
            virtual_size: 0x78,
            peak_working_set_size: 0x88,
            working_set_size: 0x90,
            pagefile_usage: 0xB8,
            peak_pagefile_usage: 0xC0,
            private_bytes: 0xC8,
            size: 0x100,
        },
        thread: ThreadOffsets {
            create_time: 0x10,
            start_address: 0x20,
            client_pid: 0x28,
            client_tid: 0x30,
            priority: 0x38,
            base_priority: 0x3C,
            state: 0x44,
            size: 0x50,
        },
    };

    pub const X86: SnapshotLayout = SnapshotLayout {
        pointer_size: 4,
        process: ProcessOffsets {
            next_entry: 0x00,
            thread_count: 0x04,
            create_time: 0x20,
            image_name_length: 0x38,
            image_name_buffer: 0x3C,
            base_priority: 0x40,
            pid: 0x44,
            parent_pid: 0x48,
            handle_count: 0x4C,
            session_id: 0x50,
            peak_virtual_size: 0x58,
            virtual_size: 0x5C,
            peak_working_set_size: 0x64,
            working_set_size: 0x68,
            pagefile_usage: 0x7C,
            peak_pagefile_usage: 0x80,
            private_bytes: 0x84,
            size: 0xB8,
        },
        thread: ThreadOffsets {
            create_time: 0x10,
            start_address: 0x1C,
            client_pid: 0x20,
            client_tid: 0x24,
            priority: 0x28,
            base_priority: 0x2C,
            state: 0x34,
            size: 0x40,
        },
    };

    /// Layout matching the pointer width of this build
    pub const fn native() -> SnapshotLayout {
        if cfg!(target_pointer_width = "64") {
            Self::X64
        } else {
            Self::X86
        }
    }
}
