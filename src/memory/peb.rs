//! Command-line recovery from a process's environment block
//!
//! The chain is PEB -> process parameters -> command-line descriptor ->
//! character buffer, each link one read in the target's address space.

use super::reader::{MemoryReader, RemoteMemory};
use crate::core::types::{Address, ProcError, ProcResult};
use tracing::{debug, trace};

/// Offsets of the structures walked to reach the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PebLayout {
    pub pointer_size: usize,
    /// `PEB.ProcessParameters`
    pub process_parameters: u64,
    /// `RTL_USER_PROCESS_PARAMETERS.CommandLine`
    pub command_line: u64,
    /// `UNICODE_STRING.Buffer`, relative to the descriptor
    pub string_buffer: u64,
}

impl PebLayout {
    pub const X64: PebLayout = PebLayout {
        pointer_size: 8,
        process_parameters: 0x20,
        command_line: 0x70,
        string_buffer: 0x08,
    };

    pub const X86: PebLayout = PebLayout {
        pointer_size: 4,
        process_parameters: 0x10,
        command_line: 0x40,
        string_buffer: 0x04,
    };

    /// Layout matching the reader's own bitness
    pub const fn native() -> PebLayout {
        if cfg!(target_pointer_width = "64") {
            PebLayout::X64
        } else {
            PebLayout::X86
        }
    }
}

fn offset(base: Address, by: u64) -> ProcResult<Address> {
    base.checked_add(by)
        .ok_or_else(|| ProcError::read_failed(base, "address overflow"))
}

fn pointer_from_le(bytes: &[u8]) -> Option<Address> {
    match bytes.len() {
        4 => Some(Address::new(u64::from(u32::from_le_bytes(bytes.try_into().ok()?)))),
        8 => Some(Address::new(u64::from_le_bytes(bytes.try_into().ok()?))),
        _ => None,
    }
}

/// Walks from the PEB at `peb` to the command-line string
pub fn walk_command_line<M: RemoteMemory + ?Sized>(
    memory: &M,
    peb: Address,
    layout: PebLayout,
) -> ProcResult<String> {
    if peb.is_null() {
        return Err(ProcError::read_failed(peb, "environment block address is null"));
    }
    let reader = MemoryReader::new(memory);

    let params = reader.read_pointer(offset(peb, layout.process_parameters)?, layout.pointer_size)?;
    trace!("process parameters at {}", params);
    if params.is_null() {
        return Err(ProcError::read_failed(params, "process parameters pointer is null"));
    }

    // Length, MaximumLength and Buffer come back in one read
    let descriptor = offset(params, layout.command_line)?;
    let buffer_at = layout.string_buffer as usize;
    let raw = reader.read_raw(descriptor, buffer_at + layout.pointer_size)?;
    let length = u16::from_le_bytes([raw[0], raw[1]]);
    let buffer = pointer_from_le(&raw[buffer_at..])
        .ok_or_else(|| ProcError::read_failed(descriptor, "unsupported pointer size"))?;
    if length == 0 {
        return Ok(String::new());
    }
    if buffer.is_null() {
        return Err(ProcError::read_failed(buffer, "command line buffer is null"));
    }

    reader.read_utf16(buffer, usize::from(length))
}

/// Same as [`walk_command_line`], but any failure yields an empty string
pub fn read_command_line_from<M: RemoteMemory + ?Sized>(
    memory: &M,
    peb: Address,
    layout: PebLayout,
) -> String {
    match walk_command_line(memory, peb, layout) {
        Ok(command_line) => command_line,
        Err(e) => {
            debug!("command line unavailable: {}", e);
            String::new()
        }
    }
}

/// Reads the command line of a live process; empty on any failure
#[cfg(windows)]
pub fn read_command_line(pid: u32) -> String {
    use crate::process::handle::{ProcessAccess, ProcessHandle};

    let access = ProcessAccess::combine(&[ProcessAccess::QUERY_INFORMATION, ProcessAccess::VM_READ]);
    let handle = match ProcessHandle::open(pid, access) {
        Ok(handle) => handle,
        Err(e) => {
            debug!("pid {}: cannot open for command line: {}", pid, e);
            return String::new();
        }
    };
    let peb = match handle.peb_address() {
        Ok(peb) => peb,
        Err(e) => {
            debug!("pid {}: basic information query failed: {}", pid, e);
            return String::new();
        }
    };
    read_command_line_from(&handle, peb, PebLayout::native())
}
