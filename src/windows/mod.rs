//! Windows API layer for process and token introspection
//!
//! All unsafe FFI calls are contained within this module. Everything above
//! it works on plain Rust types and is platform independent.

pub mod bindings;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::Handle;
pub use utils::{ErrorCode, WinError};

// Re-export key bindings
pub use bindings::{kernel32, ntdll, psapi, version};
