//! # Tenant Model
//!
//! Core types for the tenant directory.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric tenant identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(TenantId)
    }
}

/// Sub-location within a tenant that enrollment tokens can be pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub i64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Core tenant model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique tenant identifier
    pub id: TenantId,
    /// Human readable description
    pub description: String,
    /// Tenant selected when nothing else is known about the caller
    pub is_default: bool,
    /// The operator-of-operators tenant. At most one tenant carries this flag.
    pub is_hoster_tenant: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Create a new tenant record
    pub fn new(id: TenantId, description: impl Into<String>, is_default: bool) -> Self {
        Self {
            id,
            description: description.into(),
            is_default,
            is_hoster_tenant: false,
            created_at: Utc::now(),
        }
    }
}

/// Request to create a new tenant
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenantRequest {
    /// Tenant description
    pub description: String,
    /// Mark as the default tenant
    #[serde(default)]
    pub is_default: bool,
}
