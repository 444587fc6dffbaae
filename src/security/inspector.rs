//! Live token queries against a process token

use super::groups::group_entry;
use super::privileges::{luid_key, privilege_status, PrivilegeNameCache, PrivilegeResolver};
use super::profile::{build_profile, unopenable_profile, TokenSource};
use crate::core::types::{
    GroupEntry, IntegrityLevel, PrivilegeEntry, ProcError, ProcResult, SecurityProfile,
    TokenRequest,
};
use crate::process::handle::ProcessHandle;
use crate::windows::types::Handle;
use crate::windows::utils::string_conv::{qualified_account, wide_ptr_to_string, wide_to_string};
use crate::windows::utils::{last_error_as_proc_error, ErrorCode};
use lazy_static::lazy_static;
use std::{mem, ptr};
use tracing::debug;
use winapi::shared::minwindef::{DWORD, FALSE};
use winapi::shared::sddl::ConvertSidToStringSidW;
use winapi::um::processthreadsapi::OpenProcessToken;
use winapi::um::securitybaseapi::{
    DuplicateTokenEx, GetSidSubAuthority, GetSidSubAuthorityCount, GetTokenInformation,
};
use winapi::um::winbase::{LocalFree, LookupAccountSidW, LookupPrivilegeNameW};
use winapi::um::winnt::{
    SecurityImpersonation, TokenGroups, TokenIntegrityLevel, TokenPrimary, TokenPrivileges,
    TokenUser, HANDLE, LUID, PSID, SID_NAME_USE, TOKEN_DUPLICATE, TOKEN_GROUPS,
    TOKEN_INFORMATION_CLASS, TOKEN_MANDATORY_LABEL, TOKEN_PRIVILEGES, TOKEN_QUERY, TOKEN_USER,
};

/// Resolves privilege LUIDs through `LookupPrivilegeNameW`
pub struct LookupPrivilegeName;

impl PrivilegeResolver for LookupPrivilegeName {
    fn resolve(&self, luid: u64) -> Option<String> {
        let mut value = LUID {
            LowPart: luid as u32,
            HighPart: (luid >> 32) as i32,
        };
        let mut buffer = vec![0u16; 64];
        loop {
            let mut len = buffer.len() as DWORD;
            let ok = unsafe {
                LookupPrivilegeNameW(ptr::null(), &mut value, buffer.as_mut_ptr(), &mut len)
            };
            if ok != FALSE {
                return Some(wide_to_string(&buffer[..len as usize]));
            }
            match ErrorCode::last_error() {
                ErrorCode::InsufficientBuffer if (len as usize) > buffer.len() => {
                    buffer.resize(len as usize + 1, 0);
                }
                _ => return None,
            }
        }
    }
}

lazy_static! {
    /// Process-wide privilege name cache shared by every inspector
    pub static ref PRIVILEGE_NAMES: PrivilegeNameCache<LookupPrivilegeName> =
        PrivilegeNameCache::new(LookupPrivilegeName);
}

/// Textual form (`S-1-5-32-544`) of a SID
///
/// # Safety
/// `sid` must point to a valid SID
unsafe fn sid_to_string(sid: PSID) -> ProcResult<String> {
    let mut raw: *mut u16 = ptr::null_mut();
    if ConvertSidToStringSidW(sid, &mut raw) == FALSE || raw.is_null() {
        return Err(ProcError::WindowsApi(format!(
            "ConvertSidToStringSidW failed: {}",
            ErrorCode::last_error()
        )));
    }
    let text = wide_ptr_to_string(raw);
    LocalFree(raw as *mut _);
    Ok(text)
}

/// `DOMAIN\name` of a SID
///
/// # Safety
/// `sid` must point to a valid SID
unsafe fn sid_to_account(sid: PSID) -> ProcResult<String> {
    let mut name = vec![0u16; 256];
    let mut domain = vec![0u16; 256];
    loop {
        let mut name_len = name.len() as DWORD;
        let mut domain_len = domain.len() as DWORD;
        let mut use_kind: SID_NAME_USE = 0;
        let ok = LookupAccountSidW(
            ptr::null(),
            sid,
            name.as_mut_ptr(),
            &mut name_len,
            domain.as_mut_ptr(),
            &mut domain_len,
            &mut use_kind,
        );
        if ok != FALSE {
            return Ok(qualified_account(
                &wide_to_string(&domain[..domain_len as usize]),
                &wide_to_string(&name[..name_len as usize]),
            ));
        }
        match ErrorCode::last_error() {
            ErrorCode::InsufficientBuffer
                if name_len as usize > name.len() || domain_len as usize > domain.len() =>
            {
                name.resize(name.len().max(name_len as usize), 0);
                domain.resize(domain.len().max(domain_len as usize), 0);
            }
            code => {
                return Err(ProcError::WindowsApi(format!(
                    "LookupAccountSidW failed: {}",
                    code
                )))
            }
        }
    }
}

/// An open process token
pub struct TokenInspector {
    token: Handle,
    pid: u32,
}

impl TokenInspector {
    /// Opens the token of `pid` with limited query rights on the process
    pub fn open(pid: u32) -> ProcResult<Self> {
        let process = ProcessHandle::open_limited(pid)?;
        Self::from_process(&process)
    }

    /// Opens the token of an already-open process
    pub fn from_process(process: &ProcessHandle) -> ProcResult<Self> {
        let mut token: HANDLE = ptr::null_mut();
        let ok = unsafe { OpenProcessToken(process.raw(), TOKEN_QUERY | TOKEN_DUPLICATE, &mut token) };
        if ok == FALSE {
            return Err(last_error_as_proc_error(process.pid(), "OpenProcessToken"));
        }
        Ok(TokenInspector {
            token: Handle::checked(token, "OpenProcessToken")?,
            pid: process.pid(),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Queries one information class into an 8-byte aligned buffer
    fn query(token: HANDLE, class: TOKEN_INFORMATION_CLASS, what: &str) -> ProcResult<Vec<u64>> {
        let mut size: DWORD = 0;
        unsafe {
            GetTokenInformation(token, class, ptr::null_mut(), 0, &mut size);
        }
        if size == 0 {
            return Err(ProcError::WindowsApi(format!(
                "GetTokenInformation({}) size query failed: {}",
                what,
                ErrorCode::last_error()
            )));
        }

        let mut buffer = vec![0u64; (size as usize + 7) / 8];
        let capacity = (buffer.len() * mem::size_of::<u64>()) as DWORD;
        let ok = unsafe {
            GetTokenInformation(token, class, buffer.as_mut_ptr() as *mut _, capacity, &mut size)
        };
        if ok == FALSE {
            return Err(ProcError::WindowsApi(format!(
                "GetTokenInformation({}) failed: {}",
                what,
                ErrorCode::last_error()
            )));
        }
        Ok(buffer)
    }

    /// Builds the profile parts selected by `request`
    pub fn profile(&self, request: &TokenRequest) -> SecurityProfile {
        build_profile(self, request)
    }
}

impl TokenSource for TokenInspector {
    fn integrity(&self) -> ProcResult<IntegrityLevel> {
        // the label query is only reliable on a query-only duplicate
        let mut duplicate: HANDLE = ptr::null_mut();
        let ok = unsafe {
            DuplicateTokenEx(
                self.token.raw(),
                TOKEN_QUERY,
                ptr::null_mut(),
                SecurityImpersonation,
                TokenPrimary,
                &mut duplicate,
            )
        };
        if ok == FALSE {
            return Err(last_error_as_proc_error(self.pid, "DuplicateTokenEx"));
        }
        let duplicate = Handle::checked(duplicate, "DuplicateTokenEx")?;

        let buffer = Self::query(duplicate.raw(), TokenIntegrityLevel, "TokenIntegrityLevel")?;
        unsafe {
            let label = &*(buffer.as_ptr() as *const TOKEN_MANDATORY_LABEL);
            let sid = label.Label.Sid;
            if sid.is_null() {
                return Ok(IntegrityLevel::Unknown);
            }
            let count = *GetSidSubAuthorityCount(sid);
            if count == 0 {
                return Ok(IntegrityLevel::Unknown);
            }
            let rid = *GetSidSubAuthority(sid, DWORD::from(count) - 1);
            Ok(IntegrityLevel::from_rid(rid))
        }
    }

    fn user(&self) -> ProcResult<String> {
        let buffer = Self::query(self.token.raw(), TokenUser, "TokenUser")?;
        unsafe {
            let user = &*(buffer.as_ptr() as *const TOKEN_USER);
            match sid_to_account(user.User.Sid) {
                Ok(account) => Ok(account),
                Err(e) => {
                    debug!("pid {}: user account lookup failed: {}", self.pid, e);
                    sid_to_string(user.User.Sid)
                }
            }
        }
    }

    fn privileges(&self) -> ProcResult<Vec<PrivilegeEntry>> {
        let buffer = Self::query(self.token.raw(), TokenPrivileges, "TokenPrivileges")?;
        let entries = unsafe {
            let privileges = &*(buffer.as_ptr() as *const TOKEN_PRIVILEGES);
            std::slice::from_raw_parts(
                privileges.Privileges.as_ptr(),
                privileges.PrivilegeCount as usize,
            )
        };

        Ok(entries
            .iter()
            .filter_map(|entry| {
                let status = privilege_status(entry.Attributes)?;
                let key = luid_key(entry.Luid.LowPart, entry.Luid.HighPart);
                Some(PrivilegeEntry {
                    name: PRIVILEGE_NAMES.name_or_placeholder(key),
                    status,
                })
            })
            .collect())
    }

    fn groups(&self, resolve_names: bool) -> ProcResult<Vec<GroupEntry>> {
        let buffer = Self::query(self.token.raw(), TokenGroups, "TokenGroups")?;
        let entries = unsafe {
            let groups = &*(buffer.as_ptr() as *const TOKEN_GROUPS);
            std::slice::from_raw_parts(groups.Groups.as_ptr(), groups.GroupCount as usize)
        };

        let mut result = Vec::with_capacity(entries.len());
        for entry in entries {
            let sid = match unsafe { sid_to_string(entry.Sid) } {
                Ok(sid) => sid,
                Err(e) => {
                    debug!("pid {}: skipping unconvertible group SID: {}", self.pid, e);
                    continue;
                }
            };
            let account = if resolve_names {
                unsafe { sid_to_account(entry.Sid) }.ok()
            } else {
                None
            };
            result.push(group_entry(sid, account, entry.Attributes));
        }
        Ok(result)
    }
}

/// Profile of `pid`. An unopenable process or token yields an empty profile,
/// except that a requested elevation verdict is indeterminate.
pub fn inspect_process(pid: u32, request: &TokenRequest) -> SecurityProfile {
    if !request.any() {
        return SecurityProfile::default();
    }
    match TokenInspector::open(pid) {
        Ok(inspector) => inspector.profile(request),
        Err(e) => {
            debug!("pid {}: token unavailable: {}", pid, e);
            unopenable_profile(request)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Elevation, InfoRequest};

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_own_token_profile() {
        let profile = inspect_process(std::process::id(), &InfoRequest::everything().token());
        assert!(profile.integrity >= IntegrityLevel::Low);
        assert!(profile.user.is_some());
        assert!(profile.privilege_count > 0);
        assert!(profile.group_count > 0);
        assert!(profile
            .privileges
            .unwrap()
            .iter()
            .any(|p| p.name == "SeChangeNotifyPrivilege"));
        assert!(profile.elevation.is_some());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_fast_groups_keep_sids_only() {
        let request = InfoRequest::everything().with_group_names(false).token();
        let profile = inspect_process(std::process::id(), &request);
        let groups = profile.groups.unwrap();
        assert!(groups.iter().all(|g| g.account.is_none()));
        assert!(groups.iter().all(|g| g.sid.starts_with("S-1-")));
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_privilege_names_are_cached() {
        inspect_process(std::process::id(), &InfoRequest::everything().token());
        assert!(!PRIVILEGE_NAMES.is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_idle_process_elevation_is_indeterminate() {
        let profile = inspect_process(0, &InfoRequest::everything().token());
        assert_eq!(profile.elevation, Some(Elevation::Indeterminate));
        assert!(profile.user.is_none());
        assert_eq!(profile.integrity, IntegrityLevel::Unknown);
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_idle_process_without_elevation_is_empty() {
        let request = InfoRequest {
            token_elevation: false,
            ..InfoRequest::everything()
        }
        .token();
        assert!(inspect_process(0, &request).is_empty());
    }
}
