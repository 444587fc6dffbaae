//! Privilege attribute decoding and the privilege-name cache

use crate::core::types::PrivilegeStatus;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

pub const SE_PRIVILEGE_ENABLED_BY_DEFAULT: u32 = 0x0000_0001;
pub const SE_PRIVILEGE_ENABLED: u32 = 0x0000_0002;
pub const SE_PRIVILEGE_REMOVED: u32 = 0x0000_0004;
pub const SE_PRIVILEGE_USED_FOR_ACCESS: u32 = 0x8000_0000;

/// Maps a privilege attribute bitmask to its status.
///
/// Returns `None` for removed privileges, which are not reported at all.
pub fn privilege_status(attributes: u32) -> Option<PrivilegeStatus> {
    if attributes & SE_PRIVILEGE_REMOVED != 0 {
        return None;
    }
    let enabled = attributes & SE_PRIVILEGE_ENABLED != 0;
    let by_default = attributes & SE_PRIVILEGE_ENABLED_BY_DEFAULT != 0;
    Some(match (enabled, by_default) {
        (true, true) => PrivilegeStatus::DefaultEnabled,
        (true, false) => PrivilegeStatus::Enabled,
        (false, _) => PrivilegeStatus::Disabled,
    })
}

/// Packs a LUID into the cache key
pub fn luid_key(low_part: u32, high_part: i32) -> u64 {
    (u64::from(high_part as u32) << 32) | u64::from(low_part)
}

/// Turns a privilege LUID into its programmatic name (`SeDebugPrivilege`, ...)
pub trait PrivilegeResolver: Send + Sync {
    fn resolve(&self, luid: u64) -> Option<String>;
}

impl<F> PrivilegeResolver for F
where
    F: Fn(u64) -> Option<String> + Send + Sync,
{
    fn resolve(&self, luid: u64) -> Option<String> {
        self(luid)
    }
}

/// Thread-safe LUID → name cache in front of an expensive resolver.
///
/// A LUID is resolved at most once per cache; the write lock is held across
/// the resolver call so concurrent first lookups of the same LUID do not
/// both reach it. Failed lookups are not cached.
pub struct PrivilegeNameCache<R> {
    resolver: R,
    names: RwLock<HashMap<u64, String>>,
}

impl<R: PrivilegeResolver> PrivilegeNameCache<R> {
    pub fn new(resolver: R) -> Self {
        PrivilegeNameCache {
            resolver,
            names: RwLock::new(HashMap::new()),
        }
    }

    /// Name for `luid`, resolving and caching it on first use
    pub fn name(&self, luid: u64) -> Option<String> {
        if let Some(name) = self.read_cached(luid) {
            return Some(name);
        }

        let mut names = match self.names.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(name) = names.get(&luid) {
            return Some(name.clone());
        }
        let resolved = self.resolver.resolve(luid)?;
        trace!("resolved privilege luid 0x{:X} to {}", luid, resolved);
        names.insert(luid, resolved.clone());
        Some(resolved)
    }

    /// Name for `luid`, or a hex placeholder when it cannot be resolved
    pub fn name_or_placeholder(&self, luid: u64) -> String {
        self.name(luid)
            .unwrap_or_else(|| format!("LUID 0x{:X}", luid))
    }

    pub fn len(&self) -> usize {
        match self.names.read() {
            Ok(names) => names.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.names.write() {
            Ok(mut names) => names.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    fn read_cached(&self, luid: u64) -> Option<String> {
        let names = match self.names.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        names.get(&luid).cloned()
    }
}
