//! Safe HANDLE wrapper with automatic cleanup

use crate::core::types::{ProcError, ProcResult};
use crate::windows::bindings::kernel32;
use std::ptr;
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::winnt::HANDLE;

/// Safe wrapper around Windows HANDLE with RAII semantics
pub struct Handle {
    handle: HANDLE,
}

impl Handle {
    /// Create a new Handle wrapper
    pub fn new(handle: HANDLE) -> Self {
        Handle { handle }
    }

    /// Wraps a handle returned by an API that signals failure with
    /// either null or `INVALID_HANDLE_VALUE`
    pub fn checked(handle: HANDLE, api: &str) -> ProcResult<Self> {
        let wrapped = Handle::new(handle);
        if wrapped.is_valid() {
            Ok(wrapped)
        } else {
            Err(ProcError::InvalidHandle(format!("{} returned no handle", api)))
        }
    }

    /// Create a null handle
    pub fn null() -> Self {
        Handle {
            handle: ptr::null_mut(),
        }
    }

    /// Check if handle is null
    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }

    /// Neither null nor the invalid-handle sentinel
    pub fn is_valid(&self) -> bool {
        !self.handle.is_null() && self.handle != INVALID_HANDLE_VALUE
    }

    /// Get the raw handle
    pub fn raw(&self) -> HANDLE {
        self.handle
    }

    /// Take ownership of the handle, preventing automatic cleanup
    pub fn take(mut self) -> HANDLE {
        let handle = self.handle;
        self.handle = ptr::null_mut();
        handle
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.is_valid() {
            // Ignore errors on cleanup
            unsafe {
                let _ = kernel32::close_handle(self.handle);
            }
        }
    }
}

// Send + Sync are safe because HANDLEs are process-local
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}
