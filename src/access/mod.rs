//! Coarse scope-based access control.

mod control;
mod identity;
mod resolver;

pub use control::{authorize, AccessControl, CredentialSource};
pub use identity::{Identity, Organization, Role, TokenScope};
pub use resolver::{InvalidTokenPolicy, Resolution, ScopeResolver, TokenDecoder};

#[cfg(test)]
pub(crate) use resolver::tests::StubDecoder;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access level a requester holds or a route expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessScope {
    #[serde(rename = "public")]
    Public,
    #[serde(rename = "auth:user")]
    User,
    #[serde(rename = "auth:user:admin")]
    UserAdmin,
    #[serde(rename = "auth:admin:moderator")]
    AdminModerator,
    #[serde(rename = "auth:admin:maintainer")]
    AdminMaintainer,
    #[serde(rename = "auth:api-key")]
    ApiKey,
}

impl AccessScope {
    pub const ALL: [AccessScope; 6] = [
        AccessScope::Public,
        AccessScope::User,
        AccessScope::UserAdmin,
        AccessScope::AdminModerator,
        AccessScope::AdminMaintainer,
        AccessScope::ApiKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessScope::Public => "public",
            AccessScope::User => "auth:user",
            AccessScope::UserAdmin => "auth:user:admin",
            AccessScope::AdminModerator => "auth:admin:moderator",
            AccessScope::AdminMaintainer => "auth:admin:maintainer",
            AccessScope::ApiKey => "auth:api-key",
        }
    }

    /// Scope granted to a token bearing `role`, if the role is recognized.
    pub fn for_role(role: &Role) -> Option<Self> {
        match role {
            Role::User => Some(AccessScope::User),
            Role::Admin => Some(AccessScope::UserAdmin),
            Role::AdminModerator => Some(AccessScope::AdminModerator),
            Role::AdminMaintainer => Some(AccessScope::AdminMaintainer),
            Role::Unrecognized => None,
        }
    }
}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessScope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| format!("unknown access scope: {s}"))
    }
}

/// What the resolver concluded about a request's credentials.
///
/// `Unknown` only ever comes out of resolution; routes cannot expect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedScope {
    Scope(AccessScope),
    Unknown,
}

impl ResolvedScope {
    pub const PUBLIC: ResolvedScope = ResolvedScope::Scope(AccessScope::Public);

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedScope::Scope(scope) => scope.as_str(),
            ResolvedScope::Unknown => "unknown",
        }
    }
}

impl From<AccessScope> for ResolvedScope {
    fn from(scope: AccessScope) -> Self {
        ResolvedScope::Scope(scope)
    }
}

impl fmt::Display for ResolvedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scopes a route admits. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSet(Vec<AccessScope>);

impl ScopeSet {
    /// Returns `None` for an empty list.
    pub fn new(scopes: impl IntoIterator<Item = AccessScope>) -> Option<Self> {
        let mut deduped: Vec<AccessScope> = Vec::new();
        for scope in scopes {
            if !deduped.contains(&scope) {
                deduped.push(scope);
            }
        }
        (!deduped.is_empty()).then_some(Self(deduped))
    }

    pub fn contains(&self, scope: AccessScope) -> bool {
        self.0.contains(&scope)
    }

    pub fn scopes(&self) -> &[AccessScope] {
        &self.0
    }
}

impl Default for ScopeSet {
    fn default() -> Self {
        Self(vec![AccessScope::User])
    }
}
