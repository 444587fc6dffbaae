//! String conversion utilities for Windows API

use std::ffi::{OsStr, OsString};
use std::os::windows::ffi::{OsStrExt, OsStringExt};

/// Convert a Rust string to a NUL-terminated wide string (UTF-16)
pub fn string_to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// Convert a wide string (UTF-16) to Rust string, stopping at the first NUL
pub fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    let os_string = OsString::from_wide(&wide[..len]);
    os_string.to_string_lossy().into_owned()
}

/// Convert a NUL-terminated wide string pointer to Rust string
///
/// # Safety
/// The pointer must be null or point to a NUL-terminated UTF-16 string
pub unsafe fn wide_ptr_to_string(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }

    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }

    let slice = std::slice::from_raw_parts(ptr, len);
    wide_to_string(slice)
}

/// Joins a domain and account name the way Windows displays them
pub fn qualified_account(domain: &str, name: &str) -> String {
    if domain.is_empty() {
        name.to_string()
    } else {
        format!("{}\\{}", domain, name)
    }
}
