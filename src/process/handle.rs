//! Safe process handle wrapper with RAII semantics

use crate::core::types::{
    image_file_name, Address, MemoryCounters, ModuleRecord, ProcError, ProcResult,
};
use crate::memory::RemoteMemory;
use crate::windows::bindings::{kernel32, ntdll, psapi};
use crate::windows::types::Handle;
use std::fmt;
use winapi::um::winnt::HANDLE;

/// Access rights for process handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessAccess {
    value: u32,
}

impl ProcessAccess {
    /// Query information access
    pub const QUERY_INFORMATION: Self = Self { value: 0x0400 };
    /// Limited query; granted for most processes, even protected ones
    pub const QUERY_LIMITED_INFORMATION: Self = Self { value: 0x1000 };
    /// Read memory access
    pub const VM_READ: Self = Self { value: 0x0010 };

    /// Combine access rights
    pub fn combine(rights: &[Self]) -> Self {
        let mut value = 0;
        for right in rights {
            value |= right.value;
        }
        Self { value }
    }

    /// Get raw value
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Safe wrapper around a Windows process handle
pub struct ProcessHandle {
    handle: Handle,
    pid: u32,
    access: ProcessAccess,
}

impl ProcessHandle {
    /// Open a process with specified access rights
    pub fn open(pid: u32, access: ProcessAccess) -> ProcResult<Self> {
        let raw_handle = kernel32::open_process(pid, access.value())?;
        Ok(ProcessHandle {
            handle: Handle::new(raw_handle),
            pid,
            access,
        })
    }

    /// Open a process with the least access that still allows basic queries
    pub fn open_limited(pid: u32) -> ProcResult<Self> {
        Self::open(pid, ProcessAccess::QUERY_LIMITED_INFORMATION)
    }

    /// Open a process for reading memory
    pub fn open_for_read(pid: u32) -> ProcResult<Self> {
        Self::open(
            pid,
            ProcessAccess::combine(&[ProcessAccess::QUERY_INFORMATION, ProcessAccess::VM_READ]),
        )
    }

    /// Get the process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Get the raw handle
    ///
    /// # Safety
    /// The returned handle is only valid as long as this ProcessHandle exists
    pub unsafe fn raw(&self) -> HANDLE {
        self.handle.raw()
    }

    /// Get the access rights
    pub fn access(&self) -> ProcessAccess {
        self.access
    }

    /// Check if handle is valid
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    fn checked_raw(&self) -> ProcResult<HANDLE> {
        if !self.is_valid() {
            return Err(ProcError::InvalidHandle(
                "Process handle is null".to_string(),
            ));
        }
        Ok(self.handle.raw())
    }

    /// Whether the process has not exited
    pub fn is_active(&self) -> bool {
        match self.checked_raw() {
            Ok(raw) => unsafe { kernel32::is_process_active(raw) },
            Err(_) => false,
        }
    }

    /// Address of the process environment block; null for a wider target
    pub fn peb_address(&self) -> ProcResult<Address> {
        let raw = self.checked_raw()?;
        unsafe { ntdll::query_peb_address(raw) }
    }

    /// Parent process id from the basic information block
    pub fn parent_pid(&self) -> ProcResult<u32> {
        let raw = self.checked_raw()?;
        let info = unsafe { ntdll::query_basic_information(raw) }?;
        Ok(info.inherited_from_unique_process_id as u32)
    }

    /// Creation time as raw FILETIME ticks
    pub fn creation_ticks(&self) -> ProcResult<u64> {
        let raw = self.checked_raw()?;
        unsafe { kernel32::process_creation_ticks(raw) }
    }

    pub fn handle_count(&self) -> ProcResult<u32> {
        let raw = self.checked_raw()?;
        unsafe { kernel32::process_handle_count(raw) }
    }

    pub fn memory_counters(&self) -> ProcResult<MemoryCounters> {
        let raw = self.checked_raw()?;
        unsafe { psapi::get_memory_counters(raw) }
    }

    /// Full image path via the limited-information query
    pub fn image_path(&self) -> ProcResult<String> {
        let raw = self.checked_raw()?;
        unsafe { kernel32::query_full_image_name(raw) }
    }

    /// Loaded modules in load order; module zero is the executable
    pub fn modules(&self) -> ProcResult<Vec<ModuleRecord>> {
        let raw = self.checked_raw()?;
        let modules = unsafe { psapi::enum_process_modules(raw) }?;
        let mut records = Vec::with_capacity(modules.len());
        for (index, &module) in modules.iter().enumerate() {
            let path = match unsafe { psapi::get_module_file_name(raw, module) } {
                Ok(path) => path,
                Err(_) => continue,
            };
            let name = unsafe { psapi::get_module_base_name(raw, module) }
                .unwrap_or_else(|_| image_file_name(&path).to_string());
            records.push(ModuleRecord {
                name,
                path,
                load_order: index as u32,
                base_address: Address::from(module as usize),
            });
        }
        Ok(records)
    }

    /// Path of module zero, the process's own executable
    pub fn main_module_path(&self) -> ProcResult<String> {
        let raw = self.checked_raw()?;
        let modules = unsafe { psapi::enum_process_modules(raw) }?;
        match modules.first() {
            Some(&main) => unsafe { psapi::get_module_file_name(raw, main) },
            None => Err(ProcError::WindowsApi(format!(
                "pid {} has no modules",
                self.pid
            ))),
        }
    }
}

impl RemoteMemory for ProcessHandle {
    fn read(&self, address: Address, buffer: &mut [u8]) -> ProcResult<()> {
        let raw = self.checked_raw()?;
        let at = address
            .to_usize()
            .ok_or_else(|| ProcError::read_failed(address, "address exceeds host pointer width"))?;
        unsafe { kernel32::read_process_memory(raw, at, buffer) }.map(|_| ())
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("valid", &self.is_valid())
            .field("access", &format!("0x{:X}", self.access.value()))
            .finish()
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProcessHandle(pid={}, valid={})",
            self.pid,
            self.is_valid()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::read_command_line_from;
    use crate::memory::PebLayout;

    fn null_handle(pid: u32) -> ProcessHandle {
        ProcessHandle {
            handle: Handle::null(),
            pid,
            access: ProcessAccess::VM_READ,
        }
    }

    #[test]
    fn test_process_access_combine() {
        let combined =
            ProcessAccess::combine(&[ProcessAccess::QUERY_INFORMATION, ProcessAccess::VM_READ]);
        assert_eq!(combined.value(), 0x0410);
        assert_eq!(ProcessAccess::QUERY_LIMITED_INFORMATION.value(), 0x1000);
    }

    #[test]
    fn test_invalid_handle_operations() {
        let handle = null_handle(1234);
        assert!(!handle.is_valid());
        assert!(!handle.is_active());

        let mut buffer = vec![0u8; 4];
        match handle.read(Address::new(0x1000), &mut buffer) {
            Err(ProcError::InvalidHandle(msg)) => assert!(msg.contains("null")),
            other => panic!("Expected InvalidHandle error, got {:?}", other),
        }
        assert!(handle.peb_address().is_err());
        assert!(handle.modules().is_err());
    }

    #[test]
    fn test_process_handle_display() {
        let handle = null_handle(1234);
        let display = format!("{}", handle);
        assert!(display.contains("pid=1234"));
        assert!(display.contains("valid=false"));
        assert!(format!("{:?}", handle).contains("0x10"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_process_handle_open_invalid() {
        assert!(ProcessHandle::open_limited(0).is_err());
        assert!(ProcessHandle::open_for_read(0).is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_current_process_queries() {
        let handle = ProcessHandle::open_for_read(std::process::id()).unwrap();
        assert!(handle.is_active());
        assert!(handle.parent_pid().unwrap() != 0);
        let modules = handle.modules().unwrap();
        assert_eq!(modules[0].load_order, 0);
        assert_eq!(handle.main_module_path().unwrap(), modules[0].path);
        assert_eq!(
            handle.image_path().unwrap().to_lowercase(),
            modules[0].path.to_lowercase()
        );
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_own_command_line_matches() {
        let handle = ProcessHandle::open_for_read(std::process::id()).unwrap();
        let peb = handle.peb_address().unwrap();
        let command_line = read_command_line_from(&handle, peb, PebLayout::native());
        let exe = std::env::current_exe().unwrap();
        let stem = exe.file_stem().unwrap().to_string_lossy().to_string();
        assert!(command_line.contains(&stem), "{}", command_line);
    }
}
