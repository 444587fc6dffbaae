//! Windows error code handling utilities

use crate::core::types::ProcError;
use std::fmt;
use winapi::um::errhandlingapi::GetLastError;

/// Common Windows error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success,
    AccessDenied,
    InvalidHandle,
    InvalidParameter,
    InsufficientBuffer,
    PartialCopy,
    NoneMapped,
    ResourceTypeNotFound,
    Unknown(u32),
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        match code {
            0 => ErrorCode::Success,
            5 => ErrorCode::AccessDenied,
            6 => ErrorCode::InvalidHandle,
            87 => ErrorCode::InvalidParameter,
            122 => ErrorCode::InsufficientBuffer,
            299 => ErrorCode::PartialCopy,
            1332 => ErrorCode::NoneMapped,
            1813 => ErrorCode::ResourceTypeNotFound,
            _ => ErrorCode::Unknown(code),
        }
    }
}

impl ErrorCode {
    /// Get the last Windows error
    pub fn last_error() -> Self {
        unsafe { ErrorCode::from(GetLastError()) }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Success => write!(f, "Success"),
            ErrorCode::AccessDenied => write!(f, "Access denied"),
            ErrorCode::InvalidHandle => write!(f, "Invalid handle"),
            ErrorCode::InvalidParameter => write!(f, "Invalid parameter"),
            ErrorCode::InsufficientBuffer => write!(f, "Insufficient buffer"),
            ErrorCode::PartialCopy => write!(f, "Partial copy"),
            ErrorCode::NoneMapped => write!(f, "No mapping between account names and SIDs"),
            ErrorCode::ResourceTypeNotFound => write!(f, "Resource type not found"),
            ErrorCode::Unknown(code) => write!(f, "Unknown error: {}", code),
        }
    }
}

/// Windows error wrapper
pub struct WinError {
    code: ErrorCode,
    context: String,
}

impl WinError {
    /// Create a new Windows error with context
    pub fn new(context: impl Into<String>) -> Self {
        WinError {
            code: ErrorCode::last_error(),
            context: context.into(),
        }
    }

    /// Create with specific error code
    pub fn with_code(code: ErrorCode, context: impl Into<String>) -> Self {
        WinError {
            code,
            context: context.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Convert to ProcError, keeping access denials distinguishable
    pub fn into_proc_error(self, pid: u32) -> ProcError {
        match self.code {
            ErrorCode::AccessDenied => ProcError::access_denied(pid, self.context),
            code => ProcError::WindowsApi(format!("{}: {}", self.context, code)),
        }
    }
}

/// Get last Windows error as ProcError
pub fn last_error_as_proc_error(pid: u32, context: impl Into<String>) -> ProcError {
    WinError::new(context).into_proc_error(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(ErrorCode::from(0), ErrorCode::Success);
        assert_eq!(ErrorCode::from(5), ErrorCode::AccessDenied);
        assert_eq!(ErrorCode::from(1332), ErrorCode::NoneMapped);
        assert_eq!(ErrorCode::from(999), ErrorCode::Unknown(999));
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::AccessDenied), "Access denied");
        assert_eq!(format!("{}", ErrorCode::Unknown(123)), "Unknown error: 123");
    }

    #[test]
    fn test_win_error_conversion() {
        let err = WinError::with_code(ErrorCode::InvalidHandle, "GetTokenInformation");
        assert!(err
            .into_proc_error(10)
            .to_string()
            .contains("Invalid handle"));

        let err = WinError::with_code(ErrorCode::AccessDenied, "OpenProcessToken");
        assert!(matches!(
            err.into_proc_error(10),
            ProcError::AccessDenied { pid: 10, .. }
        ));
    }
}
