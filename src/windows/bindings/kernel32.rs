//! Kernel32.dll bindings for process queries and remote reads

use crate::core::types::{ProcError, ProcResult};
use crate::windows::utils::{wide_to_string, ErrorCode};
use std::mem;
use winapi::shared::minwindef::{DWORD, FALSE, FILETIME, LPVOID};
use winapi::um::handleapi::CloseHandle;
use winapi::um::memoryapi::ReadProcessMemory;
use winapi::um::minwinbase::STILL_ACTIVE;
use winapi::um::processthreadsapi::{
    GetExitCodeProcess, GetProcessHandleCount, GetProcessTimes, OpenProcess, ProcessIdToSessionId,
};
use winapi::um::winbase::QueryFullProcessImageNameW;
use winapi::um::winnt::HANDLE;

/// Safe wrapper for OpenProcess
pub fn open_process(pid: u32, desired_access: u32) -> ProcResult<HANDLE> {
    unsafe {
        let handle = OpenProcess(desired_access, FALSE, pid);
        if handle.is_null() {
            match ErrorCode::last_error() {
                ErrorCode::AccessDenied => Err(ProcError::access_denied(pid, "OpenProcess refused")),
                code => Err(ProcError::ProcessNotFound(format!("PID {}: {}", pid, code))),
            }
        } else {
            Ok(handle)
        }
    }
}

/// Safe wrapper for CloseHandle
///
/// # Safety
/// The handle must be a valid Windows handle
pub unsafe fn close_handle(handle: HANDLE) -> ProcResult<()> {
    if handle.is_null() {
        return Ok(());
    }

    if CloseHandle(handle) == FALSE {
        Err(ProcError::last_os_error())
    } else {
        Ok(())
    }
}

/// Safe wrapper for ReadProcessMemory; partial reads are failures
///
/// # Safety
/// The handle must be a valid process handle opened with `PROCESS_VM_READ`
pub unsafe fn read_process_memory(
    handle: HANDLE,
    address: usize,
    buffer: &mut [u8],
) -> ProcResult<usize> {
    let mut bytes_read = 0;

    let result = ReadProcessMemory(
        handle,
        address as LPVOID,
        buffer.as_mut_ptr() as LPVOID,
        buffer.len(),
        &mut bytes_read,
    );

    if result == FALSE || bytes_read != buffer.len() {
        Err(ProcError::read_failed(
            format!("0x{:X}", address),
            format!("ReadProcessMemory failed: {}", ErrorCode::last_error()),
        ))
    } else {
        Ok(bytes_read)
    }
}

/// Whether the process behind `handle` has not exited yet
///
/// # Safety
/// The handle must be a valid process handle with query access
pub unsafe fn is_process_active(handle: HANDLE) -> bool {
    let mut exit_code: DWORD = 0;
    GetExitCodeProcess(handle, &mut exit_code) != FALSE && exit_code == STILL_ACTIVE
}

/// Creation time of the process as a raw FILETIME tick count
///
/// # Safety
/// The handle must be a valid process handle with query access
pub unsafe fn process_creation_ticks(handle: HANDLE) -> ProcResult<u64> {
    let mut creation: FILETIME = mem::zeroed();
    let mut exit: FILETIME = mem::zeroed();
    let mut kernel: FILETIME = mem::zeroed();
    let mut user: FILETIME = mem::zeroed();

    if GetProcessTimes(handle, &mut creation, &mut exit, &mut kernel, &mut user) == FALSE {
        return Err(ProcError::WindowsApi(format!(
            "GetProcessTimes failed: {}",
            ErrorCode::last_error()
        )));
    }
    Ok((u64::from(creation.dwHighDateTime) << 32) | u64::from(creation.dwLowDateTime))
}

/// Number of open handles in the process
///
/// # Safety
/// The handle must be a valid process handle with query access
pub unsafe fn process_handle_count(handle: HANDLE) -> ProcResult<u32> {
    let mut count: DWORD = 0;
    if GetProcessHandleCount(handle, &mut count) == FALSE {
        return Err(ProcError::WindowsApi(format!(
            "GetProcessHandleCount failed: {}",
            ErrorCode::last_error()
        )));
    }
    Ok(count)
}

/// Terminal-services session of a process id
pub fn process_session_id(pid: u32) -> ProcResult<u32> {
    let mut session: DWORD = 0;
    if unsafe { ProcessIdToSessionId(pid, &mut session) } == FALSE {
        return Err(ProcError::WindowsApi(format!(
            "ProcessIdToSessionId({}) failed: {}",
            pid,
            ErrorCode::last_error()
        )));
    }
    Ok(session)
}

/// Full Win32 image path; works with `PROCESS_QUERY_LIMITED_INFORMATION`
///
/// # Safety
/// The handle must be a valid process handle with limited query access
pub unsafe fn query_full_image_name(handle: HANDLE) -> ProcResult<String> {
    let mut buffer = vec![0u16; 1024];
    loop {
        let mut size = buffer.len() as DWORD;
        if QueryFullProcessImageNameW(handle, 0, buffer.as_mut_ptr(), &mut size) != FALSE {
            return Ok(wide_to_string(&buffer[..size as usize]));
        }
        match ErrorCode::last_error() {
            ErrorCode::InsufficientBuffer if buffer.len() < 32 * 1024 => {
                buffer.resize(buffer.len() * 2, 0);
            }
            code => {
                return Err(ProcError::WindowsApi(format!(
                    "QueryFullProcessImageNameW failed: {}",
                    code
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;
    use winapi::um::processthreadsapi::{GetCurrentProcess, GetCurrentProcessId};

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_null_handle_operations() {
        unsafe {
            assert!(close_handle(ptr::null_mut()).is_ok());

            let mut buffer = vec![0u8; 4];
            assert!(read_process_memory(ptr::null_mut(), 0x1000, &mut buffer).is_err());
            assert!(!is_process_active(ptr::null_mut()));
        }
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_open_invalid_process() {
        use winapi::um::winnt::PROCESS_QUERY_LIMITED_INFORMATION;
        // pid 0 is the idle pseudo-process and can never be opened
        assert!(open_process(0, PROCESS_QUERY_LIMITED_INFORMATION).is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_current_process_queries() {
        unsafe {
            let current = GetCurrentProcess();
            assert!(is_process_active(current));
            assert!(process_creation_ticks(current).unwrap() > 0);
            assert!(process_handle_count(current).unwrap() > 0);
            let path = query_full_image_name(current).unwrap();
            assert!(path.to_lowercase().ends_with(".exe"));
        }
        assert!(process_session_id(unsafe { GetCurrentProcessId() }).is_ok());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_read_own_memory() {
        let value: u64 = 0x1122_3344_5566_7788;
        let mut buffer = [0u8; 8];
        unsafe {
            read_process_memory(
                GetCurrentProcess(),
                &value as *const u64 as usize,
                &mut buffer,
            )
            .unwrap();
        }
        assert_eq!(u64::from_le_bytes(buffer), value);
    }
}
