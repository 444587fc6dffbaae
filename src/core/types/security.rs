//! Security posture types derived from a process token

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mandatory integrity level of a token.
///
/// Variant order is the trust order, with the two sentinels sorting below
/// every real level so that `>= High` comparisons never succeed on them.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityLevel {
    /// The level could not be determined.
    #[default]
    Unknown,
    /// Sentinel: same level as the calling process. Never produced by classification.
    Same,
    Untrusted,
    Low,
    Medium,
    High,
    System,
    ProtectedProcess,
}

impl IntegrityLevel {
    /// Classifies the last sub-authority (RID) of a mandatory label SID
    pub fn from_rid(rid: u32) -> Self {
        match rid {
            0..=0x0FFF => IntegrityLevel::Untrusted,
            0x1000..=0x1FFF => IntegrityLevel::Low,
            0x2000..=0x2FFF => IntegrityLevel::Medium,
            0x3000..=0x3FFF => IntegrityLevel::High,
            0x4000..=0x4FFF => IntegrityLevel::System,
            _ => IntegrityLevel::ProtectedProcess,
        }
    }

    /// Whether this is an actual classified level rather than a sentinel
    pub fn is_known(&self) -> bool {
        !matches!(self, IntegrityLevel::Unknown | IntegrityLevel::Same)
    }
}

impl fmt::Display for IntegrityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntegrityLevel::Unknown => "Unknown",
            IntegrityLevel::Same => "Same",
            IntegrityLevel::Untrusted => "Untrusted",
            IntegrityLevel::Low => "Low",
            IntegrityLevel::Medium => "Medium",
            IntegrityLevel::High => "High",
            IntegrityLevel::System => "System",
            IntegrityLevel::ProtectedProcess => "Protected Process",
        };
        f.write_str(s)
    }
}

/// Status of one privilege held by a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeStatus {
    Disabled,
    DefaultEnabled,
    Enabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeEntry {
    pub name: String,
    pub status: PrivilegeStatus,
}

/// Named flag decoded from a group's attribute bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupAttribute {
    Mandatory,
    EnabledByDefault,
    Enabled,
    Owner,
    DenyOnly,
    IntegrityFlag,
    IntegrityEnabled,
    Resource,
    LogonId,
    /// Synthetic flag for an all-zero bitmask.
    Disabled,
}

impl fmt::Display for GroupAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One group membership of a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    /// Textual SID, always available.
    pub sid: String,
    /// `domain\name` when the account lookup succeeded and was requested.
    pub account: Option<String>,
    pub raw_attributes: u32,
    pub attributes: Vec<GroupAttribute>,
}

impl GroupEntry {
    /// Resolved account name, or the textual SID when unresolved
    pub fn display_name(&self) -> &str {
        self.account.as_deref().unwrap_or(&self.sid)
    }
}

/// Elevation verdict for a process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Elevation {
    Elevated,
    NotElevated,
    /// Group membership could not be read.
    #[default]
    Indeterminate,
}

impl Elevation {
    /// Collapses the verdict to a boolean; indeterminate counts as elevated.
    pub fn is_elevated(&self) -> bool {
        !matches!(self, Elevation::NotElevated)
    }
}

/// Token-derived security posture of one process. Every field is
/// independently optional and left absent when it could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityProfile {
    pub integrity: IntegrityLevel,
    pub user: Option<String>,
    pub elevation: Option<Elevation>,
    pub privileges: Option<Vec<PrivilegeEntry>>,
    pub privilege_count: usize,
    pub groups: Option<Vec<GroupEntry>>,
    pub group_count: usize,
}

impl SecurityProfile {
    /// Whether nothing at all could be read from the token
    pub fn is_empty(&self) -> bool {
        *self == SecurityProfile::default()
    }
}
