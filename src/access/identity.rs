//! Identity payload carried by bearer tokens.

use serde::{Deserialize, Serialize};

/// Role claimed by a token. Unrecognized values still decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "admin:moderator")]
    AdminModerator,
    #[serde(rename = "admin:maintainer")]
    AdminMaintainer,
    #[serde(other, rename = "unrecognized")]
    Unrecognized,
}

/// Purpose the token was minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    Verify,
    Access,
    Refresh,
    Debug,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: i64,
    #[serde(default, alias = "dwhId", skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Decoded caller identity, attached to the request when access is granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub role: Role,
    pub scope: TokenScope,
    #[serde(default, alias = "company", skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,
}
