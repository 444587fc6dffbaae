//! Assembles a [`SecurityProfile`] from the individual token queries

use super::groups::elevation_verdict;
use crate::core::types::{
    GroupEntry, IntegrityLevel, PrivilegeEntry, ProcResult, SecurityProfile, TokenRequest,
};
use tracing::debug;

/// The per-token queries a profile is built from.
///
/// Each query can fail on its own; a failure only blanks that field.
pub trait TokenSource {
    fn integrity(&self) -> ProcResult<IntegrityLevel>;
    fn user(&self) -> ProcResult<String>;
    fn privileges(&self) -> ProcResult<Vec<PrivilegeEntry>>;
    fn groups(&self, resolve_names: bool) -> ProcResult<Vec<GroupEntry>>;
}

/// Runs the queries `request` needs against `source` and collects the results.
///
/// Integrity and groups are also queried when only elevation was asked for,
/// but are reported only when requested themselves.
pub fn build_profile<T: TokenSource + ?Sized>(
    source: &T,
    request: &TokenRequest,
) -> SecurityProfile {
    let mut profile = SecurityProfile::default();

    let integrity = if request.needs_integrity() {
        source.integrity().unwrap_or_else(|e| {
            debug!("integrity level unavailable: {}", e);
            IntegrityLevel::Unknown
        })
    } else {
        IntegrityLevel::Unknown
    };
    if request.integrity {
        profile.integrity = integrity;
    }

    if request.user {
        profile.user = source
            .user()
            .map_err(|e| debug!("token user unavailable: {}", e))
            .ok();
    }

    if request.privileges {
        profile.privileges = source
            .privileges()
            .map_err(|e| debug!("token privileges unavailable: {}", e))
            .ok();
        profile.privilege_count = profile.privileges.as_ref().map_or(0, Vec::len);
    }

    let groups = if request.needs_groups() {
        source
            .groups(request.resolve_group_names)
            .map_err(|e| debug!("token groups unavailable: {}", e))
            .ok()
    } else {
        None
    };

    if request.elevation {
        profile.elevation = Some(elevation_verdict(integrity, groups.as_deref()));
    }

    if request.groups {
        profile.group_count = groups.as_ref().map_or(0, Vec::len);
        profile.groups = groups;
    }

    profile
}

/// Profile for a process whose token could not be opened at all.
///
/// Nothing is readable, so elevation fails open the same way unreadable
/// groups do.
pub fn unopenable_profile(request: &TokenRequest) -> SecurityProfile {
    SecurityProfile {
        elevation: request
            .elevation
            .then(|| elevation_verdict(IntegrityLevel::Unknown, None)),
        ..SecurityProfile::default()
    }
}
