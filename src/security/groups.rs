//! Token group attribute decoding and the elevation verdict

use crate::core::types::{Elevation, GroupAttribute, GroupEntry, IntegrityLevel};

pub const SE_GROUP_MANDATORY: u32 = 0x0000_0001;
pub const SE_GROUP_ENABLED_BY_DEFAULT: u32 = 0x0000_0002;
pub const SE_GROUP_ENABLED: u32 = 0x0000_0004;
pub const SE_GROUP_OWNER: u32 = 0x0000_0008;
pub const SE_GROUP_USE_FOR_DENY_ONLY: u32 = 0x0000_0010;
pub const SE_GROUP_INTEGRITY: u32 = 0x0000_0020;
pub const SE_GROUP_INTEGRITY_ENABLED: u32 = 0x0000_0040;
pub const SE_GROUP_RESOURCE: u32 = 0x2000_0000;
pub const SE_GROUP_LOGON_ID: u32 = 0xC000_0000;

/// Well-known SID of the builtin Administrators alias
pub const ADMINISTRATORS_SID: &str = "S-1-5-32-544";

const ATTRIBUTE_FLAGS: [(u32, GroupAttribute); 9] = [
    (SE_GROUP_MANDATORY, GroupAttribute::Mandatory),
    (SE_GROUP_ENABLED_BY_DEFAULT, GroupAttribute::EnabledByDefault),
    (SE_GROUP_ENABLED, GroupAttribute::Enabled),
    (SE_GROUP_OWNER, GroupAttribute::Owner),
    (SE_GROUP_USE_FOR_DENY_ONLY, GroupAttribute::DenyOnly),
    (SE_GROUP_INTEGRITY, GroupAttribute::IntegrityFlag),
    (SE_GROUP_INTEGRITY_ENABLED, GroupAttribute::IntegrityEnabled),
    (SE_GROUP_RESOURCE, GroupAttribute::Resource),
    (SE_GROUP_LOGON_ID, GroupAttribute::LogonId),
];

/// Decodes a group attribute bitmask into named flags.
///
/// A zero bitmask decodes to the single synthetic `Disabled` flag.
/// Multi-bit flags (`LogonId`) are only reported when all their bits are set.
pub fn decode_group_attributes(raw: u32) -> Vec<GroupAttribute> {
    if raw == 0 {
        return vec![GroupAttribute::Disabled];
    }
    ATTRIBUTE_FLAGS
        .iter()
        .filter(|(mask, _)| raw & mask == *mask)
        .map(|(_, flag)| *flag)
        .collect()
}

/// Builds a group entry from its SID, optional account name and raw attributes
pub fn group_entry(sid: String, account: Option<String>, raw_attributes: u32) -> GroupEntry {
    GroupEntry {
        sid,
        account,
        raw_attributes,
        attributes: decode_group_attributes(raw_attributes),
    }
}

/// Whether the group grants its rights: enabled (or enabled by default) and not deny-only
pub fn is_effective(group: &GroupEntry) -> bool {
    let enabled = group.raw_attributes & (SE_GROUP_ENABLED | SE_GROUP_ENABLED_BY_DEFAULT) != 0;
    enabled && group.raw_attributes & SE_GROUP_USE_FOR_DENY_ONLY == 0
}

/// Decides whether a process runs elevated.
///
/// Elevated means integrity at least High *and* an effective Administrators
/// membership; either alone is not enough, since a high-integrity token can
/// carry a stripped or deny-only Administrators group. When the group list
/// could not be read at all the verdict is `Indeterminate`, which callers
/// treat as elevated.
pub fn elevation_verdict(integrity: IntegrityLevel, groups: Option<&[GroupEntry]>) -> Elevation {
    let groups = match groups {
        Some(groups) => groups,
        None => return Elevation::Indeterminate,
    };
    if integrity < IntegrityLevel::High {
        return Elevation::NotElevated;
    }
    let admin_effective = groups
        .iter()
        .any(|group| group.sid == ADMINISTRATORS_SID && is_effective(group));
    if admin_effective {
        Elevation::Elevated
    } else {
        Elevation::NotElevated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(raw: u32) -> GroupEntry {
        group_entry(ADMINISTRATORS_SID.to_string(), None, raw)
    }

    fn everyone() -> GroupEntry {
        group_entry(
            "S-1-1-0".to_string(),
            Some("\\Everyone".to_string()),
            SE_GROUP_MANDATORY | SE_GROUP_ENABLED_BY_DEFAULT | SE_GROUP_ENABLED,
        )
    }

    #[test]
    fn test_zero_bitmask_is_disabled() {
        assert_eq!(decode_group_attributes(0), vec![GroupAttribute::Disabled]);
    }

    #[test]
    fn test_decode_common_bitmasks() {
        assert_eq!(
            decode_group_attributes(0x7),
            vec![
                GroupAttribute::Mandatory,
                GroupAttribute::EnabledByDefault,
                GroupAttribute::Enabled
            ]
        );
        assert_eq!(
            decode_group_attributes(SE_GROUP_USE_FOR_DENY_ONLY),
            vec![GroupAttribute::DenyOnly]
        );
        assert_eq!(
            decode_group_attributes(SE_GROUP_INTEGRITY | SE_GROUP_INTEGRITY_ENABLED),
            vec![GroupAttribute::IntegrityFlag, GroupAttribute::IntegrityEnabled]
        );
        // logon session SID: 0xC0000007
        let logon = decode_group_attributes(SE_GROUP_LOGON_ID | 0x7);
        assert!(logon.contains(&GroupAttribute::LogonId));
        assert!(!logon.contains(&GroupAttribute::Resource));
        // only one of the two logon bits set
        assert!(!decode_group_attributes(0x8000_0000).contains(&GroupAttribute::LogonId));
    }

    #[test]
    fn test_elevation_truth_table() {
        let enabled = SE_GROUP_MANDATORY | SE_GROUP_ENABLED_BY_DEFAULT | SE_GROUP_ENABLED;

        let groups = [everyone(), admin(enabled)];
        assert_eq!(
            elevation_verdict(IntegrityLevel::High, Some(&groups)),
            Elevation::Elevated
        );

        let groups = [everyone(), admin(0)];
        assert_eq!(
            elevation_verdict(IntegrityLevel::High, Some(&groups)),
            Elevation::NotElevated
        );

        let groups = [everyone(), admin(enabled)];
        assert_eq!(
            elevation_verdict(IntegrityLevel::Medium, Some(&groups)),
            Elevation::NotElevated
        );

        let verdict = elevation_verdict(IntegrityLevel::Medium, None);
        assert_eq!(verdict, Elevation::Indeterminate);
        assert!(verdict.is_elevated());
    }

    #[test]
    fn test_deny_only_admin_is_not_elevated() {
        let groups = [admin(SE_GROUP_ENABLED | SE_GROUP_USE_FOR_DENY_ONLY)];
        assert_eq!(
            elevation_verdict(IntegrityLevel::High, Some(&groups)),
            Elevation::NotElevated
        );
    }

    #[test]
    fn test_enabled_by_default_alone_counts() {
        let groups = [admin(SE_GROUP_ENABLED_BY_DEFAULT)];
        assert_eq!(
            elevation_verdict(IntegrityLevel::System, Some(&groups)),
            Elevation::Elevated
        );
    }

    #[test]
    fn test_missing_admin_group_is_not_elevated() {
        let groups = [everyone()];
        assert_eq!(
            elevation_verdict(IntegrityLevel::High, Some(&groups)),
            Elevation::NotElevated
        );
        assert_eq!(
            elevation_verdict(IntegrityLevel::High, Some(&[])),
            Elevation::NotElevated
        );
    }

    #[test]
    fn test_unknown_integrity_is_not_elevated() {
        let groups = [admin(SE_GROUP_ENABLED)];
        assert_eq!(
            elevation_verdict(IntegrityLevel::Unknown, Some(&groups)),
            Elevation::NotElevated
        );
    }
}
