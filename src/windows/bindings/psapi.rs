//! PSAPI.dll bindings for memory counters and module enumeration

use crate::core::types::{MemoryCounters, ProcError, ProcResult};
use crate::windows::utils::{wide_to_string, ErrorCode};
use std::mem;
use winapi::shared::minwindef::{FALSE, HMODULE, MAX_PATH};
use winapi::um::psapi::{
    EnumProcessModules, GetModuleBaseNameW, GetModuleFileNameExW, GetProcessMemoryInfo,
    PROCESS_MEMORY_COUNTERS, PROCESS_MEMORY_COUNTERS_EX,
};
use winapi::um::winnt::HANDLE;

/// Safe wrapper for GetProcessMemoryInfo using the extended counters
///
/// # Safety
/// The handle must be a valid process handle with limited query access
pub unsafe fn get_memory_counters(handle: HANDLE) -> ProcResult<MemoryCounters> {
    let mut counters: PROCESS_MEMORY_COUNTERS_EX = mem::zeroed();
    counters.cb = mem::size_of::<PROCESS_MEMORY_COUNTERS_EX>() as u32;

    let result = GetProcessMemoryInfo(
        handle,
        &mut counters as *mut PROCESS_MEMORY_COUNTERS_EX as *mut PROCESS_MEMORY_COUNTERS,
        counters.cb,
    );

    if result == FALSE {
        return Err(ProcError::WindowsApi(format!(
            "GetProcessMemoryInfo failed: {}",
            ErrorCode::last_error()
        )));
    }

    Ok(MemoryCounters {
        // not reported by PSAPI; only the system snapshot carries it
        virtual_size: 0,
        peak_virtual_size: 0,
        working_set_size: counters.WorkingSetSize as u64,
        peak_working_set_size: counters.PeakWorkingSetSize as u64,
        pagefile_usage: counters.PagefileUsage as u64,
        peak_pagefile_usage: counters.PeakPagefileUsage as u64,
        private_bytes: counters.PrivateUsage as u64,
    })
}

/// Safe wrapper for EnumProcessModules; growing the array until all modules fit
///
/// # Safety
/// The handle must be a valid process handle with query and VM read access
pub unsafe fn enum_process_modules(handle: HANDLE) -> ProcResult<Vec<HMODULE>> {
    let mut modules: Vec<HMODULE> = vec![std::ptr::null_mut(); 256];
    loop {
        let capacity = (modules.len() * mem::size_of::<HMODULE>()) as u32;
        let mut bytes_needed = 0u32;

        let result = EnumProcessModules(handle, modules.as_mut_ptr(), capacity, &mut bytes_needed);
        if result == FALSE {
            return Err(ProcError::WindowsApi(format!(
                "EnumProcessModules failed: {}",
                ErrorCode::last_error()
            )));
        }

        let count = bytes_needed as usize / mem::size_of::<HMODULE>();
        if count <= modules.len() {
            modules.truncate(count);
            return Ok(modules);
        }
        modules.resize(count, std::ptr::null_mut());
    }
}

/// Safe wrapper for GetModuleFileNameExW
///
/// # Safety
/// The handle must be a valid process handle and module must belong to it
pub unsafe fn get_module_file_name(handle: HANDLE, module: HMODULE) -> ProcResult<String> {
    let mut buffer = vec![0u16; MAX_PATH * 4];

    let length = GetModuleFileNameExW(handle, module, buffer.as_mut_ptr(), buffer.len() as u32);
    if length == 0 {
        return Err(ProcError::WindowsApi(format!(
            "GetModuleFileNameExW failed: {}",
            ErrorCode::last_error()
        )));
    }

    Ok(wide_to_string(&buffer[..length as usize]))
}

/// Safe wrapper for GetModuleBaseNameW
///
/// # Safety
/// The handle must be a valid process handle and module must belong to it
pub unsafe fn get_module_base_name(handle: HANDLE, module: HMODULE) -> ProcResult<String> {
    let mut buffer = vec![0u16; MAX_PATH];

    let length = GetModuleBaseNameW(handle, module, buffer.as_mut_ptr(), MAX_PATH as u32);
    if length == 0 {
        return Err(ProcError::WindowsApi(format!(
            "GetModuleBaseNameW failed: {}",
            ErrorCode::last_error()
        )));
    }

    Ok(wide_to_string(&buffer[..length as usize]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;
    use winapi::um::processthreadsapi::GetCurrentProcess;

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_null_handle_operations() {
        unsafe {
            assert!(enum_process_modules(ptr::null_mut()).is_err());
            assert!(get_module_base_name(ptr::null_mut(), ptr::null_mut()).is_err());
            assert!(get_memory_counters(ptr::null_mut()).is_err());
        }
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_current_process_modules() {
        unsafe {
            let current = GetCurrentProcess();
            let modules = enum_process_modules(current).unwrap();
            assert!(!modules.is_empty());
            let main = get_module_file_name(current, modules[0]).unwrap();
            assert!(main.to_lowercase().ends_with(".exe"));
            let base = get_module_base_name(current, modules[0]).unwrap();
            assert!(main.ends_with(&base));
        }
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_current_process_counters() {
        let counters = unsafe { get_memory_counters(GetCurrentProcess()) }.unwrap();
        assert!(counters.working_set_size > 0);
        assert!(counters.peak_working_set_size >= counters.working_set_size);
    }
}
