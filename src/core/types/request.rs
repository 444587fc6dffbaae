//! Selection of the optional fields a query should populate

use serde::{Deserialize, Serialize};

/// Which optional fields the aggregator must fill in.
///
/// Identity, parent, name, threads and enumeration order are always
/// populated; everything here is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRequest {
    pub start_time: bool,
    pub session_id: bool,
    pub path: bool,
    pub command_line: bool,
    /// One extra per-process query; the most expensive optional field.
    pub modules: bool,
    pub file_metadata: bool,
    pub token_integrity: bool,
    pub token_user: bool,
    pub token_elevation: bool,
    pub token_privileges: bool,
    pub token_groups: bool,
    /// Resolve group SIDs to account names (slow) instead of textual SIDs only.
    pub resolve_group_names: bool,
}

impl InfoRequest {
    /// Only the always-present fields
    pub const fn basic() -> Self {
        InfoRequest {
            start_time: false,
            session_id: false,
            path: false,
            command_line: false,
            modules: false,
            file_metadata: false,
            token_integrity: false,
            token_user: false,
            token_elevation: false,
            token_privileges: false,
            token_groups: false,
            resolve_group_names: false,
        }
    }

    /// Every optional field
    pub const fn everything() -> Self {
        InfoRequest {
            start_time: true,
            session_id: true,
            path: true,
            command_line: true,
            modules: true,
            file_metadata: true,
            token_integrity: true,
            token_user: true,
            token_elevation: true,
            token_privileges: true,
            token_groups: true,
            resolve_group_names: true,
        }
    }

    /// Every optional field except module enumeration
    pub const fn everything_except_modules() -> Self {
        InfoRequest {
            modules: false,
            ..Self::everything()
        }
    }

    pub fn with_modules(mut self, modules: bool) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_group_names(mut self, resolve: bool) -> Self {
        self.resolve_group_names = resolve;
        self
    }

    /// The token-level subset of this request
    pub fn token(&self) -> TokenRequest {
        TokenRequest {
            integrity: self.token_integrity,
            user: self.token_user,
            elevation: self.token_elevation,
            privileges: self.token_privileges,
            groups: self.token_groups,
            resolve_group_names: self.resolve_group_names,
        }
    }

    /// Whether any token field was requested at all
    pub fn wants_token(&self) -> bool {
        self.token().any()
    }
}

impl Default for InfoRequest {
    fn default() -> Self {
        Self::everything_except_modules()
    }
}

/// Token fields requested by an [`InfoRequest`].
///
/// Elevation is derived from the integrity level and the group list, so
/// requesting it makes those two queries run even when they are not reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenRequest {
    pub integrity: bool,
    pub user: bool,
    pub elevation: bool,
    pub privileges: bool,
    pub groups: bool,
    pub resolve_group_names: bool,
}

impl TokenRequest {
    pub fn any(&self) -> bool {
        self.integrity || self.user || self.elevation || self.privileges || self.groups
    }

    /// Whether the mandatory label has to be queried
    pub fn needs_integrity(&self) -> bool {
        self.integrity || self.elevation
    }

    /// Whether the group list has to be queried
    pub fn needs_groups(&self) -> bool {
        self.groups || self.elevation
    }
}
