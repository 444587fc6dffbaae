//! NTDLL.dll bindings for the system process query and process basic information

use crate::core::types::{Address, ProcError, ProcResult};
use crate::snapshot::{QueryStatus, SystemQuery};
use std::mem;
use winapi::shared::minwindef::ULONG;
use winapi::shared::ntdef::{NTSTATUS, PVOID};
use winapi::um::winnt::HANDLE;

// NT Status codes
pub const STATUS_SUCCESS: NTSTATUS = 0x00000000;
pub const STATUS_INFO_LENGTH_MISMATCH: NTSTATUS = 0xC0000004_u32 as i32;
pub const STATUS_BUFFER_TOO_SMALL: NTSTATUS = 0xC0000023_u32 as i32;
pub const STATUS_ACCESS_DENIED: NTSTATUS = 0xC0000022_u32 as i32;

/// Process information class for NtQueryInformationProcess
#[repr(C)]
pub enum ProcessInfoClass {
    ProcessBasicInformation = 0,
}

/// Basic process information structure
#[repr(C)]
pub struct ProcessBasicInfo {
    pub exit_status: NTSTATUS,
    pub peb_base_address: PVOID,
    pub affinity_mask: usize,
    pub base_priority: i32,
    pub unique_process_id: usize,
    pub inherited_from_unique_process_id: usize,
}

/// System information class
#[repr(C)]
pub enum SystemInfoClass {
    SystemProcessInformation = 5,
}

#[link(name = "ntdll")]
extern "system" {
    fn NtQueryInformationProcess(
        process_handle: HANDLE,
        process_info_class: ULONG,
        process_info: PVOID,
        process_info_length: ULONG,
        return_length: *mut ULONG,
    ) -> NTSTATUS;

    fn NtQuerySystemInformation(
        system_info_class: ULONG,
        system_info: PVOID,
        system_info_length: ULONG,
        return_length: *mut ULONG,
    ) -> NTSTATUS;
}

/// Check if NTSTATUS indicates success
pub fn nt_success(status: NTSTATUS) -> bool {
    status >= 0
}

/// Maps an NTSTATUS from the system process query onto the buffer-growth protocol
pub fn classify_query_status(status: NTSTATUS, written: usize, required: usize) -> QueryStatus {
    if nt_success(status) {
        QueryStatus::Complete { written }
    } else if status == STATUS_INFO_LENGTH_MISMATCH || status == STATUS_BUFFER_TOO_SMALL {
        QueryStatus::TooSmall { required }
    } else {
        QueryStatus::Failed {
            status: status as u32,
        }
    }
}

/// `NtQuerySystemInformation(SystemProcessInformation)` as a [`SystemQuery`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInformationQuery;

impl SystemQuery for ProcessInformationQuery {
    fn query(&mut self, buffer: &mut [u8]) -> QueryStatus {
        let length = buffer.len().min(ULONG::MAX as usize) as ULONG;
        let mut return_length: ULONG = 0;

        // SAFETY: the buffer is valid for `length` bytes and 8-byte aligned by the caller.
        let status = unsafe {
            NtQuerySystemInformation(
                SystemInfoClass::SystemProcessInformation as ULONG,
                buffer.as_mut_ptr() as PVOID,
                length,
                &mut return_length,
            )
        };
        classify_query_status(status, return_length as usize, return_length as usize)
    }
}

/// Queries the basic information block of a process (PEB address, parent id)
///
/// # Safety
/// The handle must be a valid process handle opened with query access
pub unsafe fn query_basic_information(handle: HANDLE) -> ProcResult<ProcessBasicInfo> {
    let mut info: ProcessBasicInfo = mem::zeroed();
    let mut return_length = 0u32;

    let status = NtQueryInformationProcess(
        handle,
        ProcessInfoClass::ProcessBasicInformation as ULONG,
        &mut info as *mut _ as PVOID,
        mem::size_of::<ProcessBasicInfo>() as ULONG,
        &mut return_length,
    );

    if nt_success(status) {
        Ok(info)
    } else {
        Err(ProcError::NativeQuery {
            api: "NtQueryInformationProcess",
            status: status as u32,
        })
    }
}

/// Address of the process environment block of the process behind `handle`
///
/// # Safety
/// The handle must be a valid process handle opened with query access
pub unsafe fn query_peb_address(handle: HANDLE) -> ProcResult<Address> {
    let info = query_basic_information(handle)?;
    Ok(Address::from(info.peb_base_address as usize))
}
