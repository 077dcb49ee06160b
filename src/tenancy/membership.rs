//! # User-Tenant Membership
//!
//! Maps user identities to tenants with a role.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::tenant::TenantId;

/// Opaque user identity (the session subject)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role a user holds within a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages everything, including users
    Admin,
    /// Manages settings and enrollment, but not users
    Operator,
    /// Read-only access
    User,
}

impl Role {
    /// Returns string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn is_operator_or_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Operator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            "user" => Ok(Role::User),
            other => Err(other.to_string()),
        }
    }
}

/// A user's membership in one tenant. Unique per (user, tenant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Role,
    /// At most one membership per user carries this flag.
    pub is_default: bool,
}

/// Per-user record outside of any tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    /// Transitional global-admin flag. Only consulted while no hoster tenant
    /// has been designated.
    #[serde(default)]
    pub legacy_super_admin: bool,
}

impl UserRecord {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            legacy_super_admin: false,
        }
    }
}
