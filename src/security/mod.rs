//! Security token inspection
//!
//! Integrity level, privileges, group membership and the elevation verdict.
//! The decoding and verdict logic is platform independent; the live token
//! queries in `inspector` are Windows only.

pub mod groups;
pub mod integrity;
pub mod privileges;
pub mod profile;

#[cfg(windows)]
pub mod inspector;

pub use groups::{decode_group_attributes, elevation_verdict, ADMINISTRATORS_SID};
pub use integrity::{classify_label, classify_label_string};
pub use privileges::{privilege_status, PrivilegeNameCache, PrivilegeResolver};
pub use profile::{build_profile, unopenable_profile, TokenSource};

#[cfg(windows)]
pub use inspector::{inspect_process, TokenInspector, PRIVILEGE_NAMES};
