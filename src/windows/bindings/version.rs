//! Version.dll bindings for reading file version resources

use crate::core::types::{FileMetadata, ProcError, ProcResult};
use crate::windows::utils::{string_to_wide, wide_ptr_to_string, ErrorCode};
use std::ptr;
use winapi::shared::minwindef::{FALSE, LPVOID, UINT};
use winapi::um::winver::{GetFileVersionInfoSizeW, GetFileVersionInfoW, VerQueryValueW};

/// US English, Unicode: used when the resource has no translation table
const FALLBACK_TRANSLATION: (u16, u16) = (0x0409, 0x04B0);

/// Raw version resource of one file
pub struct VersionInfo {
    data: Vec<u8>,
}

impl VersionInfo {
    /// Loads the version resource of the file at `path`
    pub fn load(path: &str) -> ProcResult<Self> {
        let wide_path = string_to_wide(path);
        let mut ignored = 0u32;

        let size = unsafe { GetFileVersionInfoSizeW(wide_path.as_ptr(), &mut ignored) };
        if size == 0 {
            return Err(ProcError::WindowsApi(format!(
                "GetFileVersionInfoSizeW({}) failed: {}",
                path,
                ErrorCode::last_error()
            )));
        }

        let mut data = vec![0u8; size as usize];
        let ok = unsafe {
            GetFileVersionInfoW(wide_path.as_ptr(), 0, size, data.as_mut_ptr() as LPVOID)
        };
        if ok == FALSE {
            return Err(ProcError::WindowsApi(format!(
                "GetFileVersionInfoW({}) failed: {}",
                path,
                ErrorCode::last_error()
            )));
        }
        Ok(VersionInfo { data })
    }

    /// First (language, codepage) pair of the translation table
    pub fn translation(&self) -> (u16, u16) {
        let block = string_to_wide("\\VarFileInfo\\Translation");
        let mut value: LPVOID = ptr::null_mut();
        let mut len: UINT = 0;

        let ok = unsafe {
            VerQueryValueW(
                self.data.as_ptr() as LPVOID,
                block.as_ptr(),
                &mut value,
                &mut len,
            )
        };
        if ok == FALSE || value.is_null() || (len as usize) < 4 {
            return FALLBACK_TRANSLATION;
        }
        // SAFETY: VerQueryValueW reported at least 4 bytes at `value`, inside `self.data`.
        unsafe {
            let pair = value as *const u16;
            (ptr::read_unaligned(pair), ptr::read_unaligned(pair.add(1)))
        }
    }

    /// Looks up one string value (`CompanyName`, `FileDescription`, ...)
    pub fn string_value(&self, key: &str) -> Option<String> {
        let (language, codepage) = self.translation();
        let block = string_to_wide(&string_block_path(language, codepage, key));
        let mut value: LPVOID = ptr::null_mut();
        let mut len: UINT = 0;

        let ok = unsafe {
            VerQueryValueW(
                self.data.as_ptr() as LPVOID,
                block.as_ptr(),
                &mut value,
                &mut len,
            )
        };
        if ok == FALSE || value.is_null() || len == 0 {
            return None;
        }
        // SAFETY: string values in the resource are NUL-terminated UTF-16 inside `self.data`.
        let text = unsafe { wide_ptr_to_string(value as *const u16) };
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Query path of a string value under the `StringFileInfo` block
pub fn string_block_path(language: u16, codepage: u16, key: &str) -> String {
    format!("\\StringFileInfo\\{:04x}{:04x}\\{}", language, codepage, key)
}

/// Company and description of the file at `path`
pub fn file_metadata(path: &str) -> ProcResult<FileMetadata> {
    let info = VersionInfo::load(path)?;
    Ok(FileMetadata {
        company: info.string_value("CompanyName"),
        description: info.string_value("FileDescription"),
    })
}
