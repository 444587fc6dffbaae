//! Windows utility functions

pub mod error_codes;
pub mod string_conv;

// Re-export commonly used utilities
pub use error_codes::{last_error_as_proc_error, ErrorCode, WinError};
pub use string_conv::{string_to_wide, wide_ptr_to_string, wide_to_string};
