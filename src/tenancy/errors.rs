//! # Directory Errors
//!
//! Error types for tenant and membership operations.

use thiserror::Error;

use super::membership::UserId;
use super::tenant::TenantId;
use crate::persistence::PersistenceError;

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Directory errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Tenant not found: {0}")]
    TenantNotFound(TenantId),

    #[error("User {user} is not a member of tenant {tenant}")]
    MembershipNotFound { user: UserId, tenant: TenantId },

    #[error("User {user} is already assigned to tenant {tenant}")]
    MembershipExists { user: UserId, tenant: TenantId },

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("No default tenant exists to designate as hoster")]
    NoDefaultTenant,

    /// Stored state breaks a single-flag invariant. Never repaired automatically.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl DirectoryError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            DirectoryError::TenantNotFound(_) => 404,
            DirectoryError::MembershipNotFound { .. } => 404,
            DirectoryError::MembershipExists { .. } => 409,
            DirectoryError::InvalidRole(_) => 400,
            DirectoryError::NoDefaultTenant => 409,
            DirectoryError::InvariantViolation(_) => 500,
            DirectoryError::Persistence(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            DirectoryError::MembershipNotFound { .. } => "MEMBERSHIP_NOT_FOUND",
            DirectoryError::MembershipExists { .. } => "MEMBERSHIP_EXISTS",
            DirectoryError::InvalidRole(_) => "INVALID_ROLE",
            DirectoryError::NoDefaultTenant => "NO_DEFAULT_TENANT",
            DirectoryError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            DirectoryError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}
