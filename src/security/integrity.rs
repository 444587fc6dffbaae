//! Mandatory integrity label classification

use crate::core::types::IntegrityLevel;

/// Identifier authority of mandatory label SIDs (`S-1-16-*`)
pub const MANDATORY_LABEL_AUTHORITY: u64 = 16;

/// Classifies a mandatory label SID by its last sub-authority (the RID).
///
/// A label without sub-authorities classifies as `Unknown`.
pub fn classify_label(sub_authorities: &[u32]) -> IntegrityLevel {
    match sub_authorities.last() {
        Some(&rid) => IntegrityLevel::from_rid(rid),
        None => IntegrityLevel::Unknown,
    }
}

/// Parses a label SID in string form (`S-1-16-12288`) and classifies it
pub fn classify_label_string(sid: &str) -> IntegrityLevel {
    let mut parts = sid.split('-');
    if parts.next() != Some("S") || parts.next() != Some("1") {
        return IntegrityLevel::Unknown;
    }
    match parts.next().and_then(|authority| authority.parse::<u64>().ok()) {
        Some(MANDATORY_LABEL_AUTHORITY) => {}
        _ => return IntegrityLevel::Unknown,
    }
    let rids: Option<Vec<u32>> = parts.map(|rid| rid.parse::<u32>().ok()).collect();
    rids.map(|rids| classify_label(&rids))
        .unwrap_or(IntegrityLevel::Unknown)
}
