//! # Access Errors
//!
//! Denials produced by the access gates.

use thiserror::Error;

use crate::tenancy::DirectoryError;

/// Why an authenticated caller was turned away.
///
/// `key()` is the stable message key a localization layer translates;
/// `message()` is the built-in English text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    NoAccess,
    AdminRequired,
    OperatorRequired,
    HosterAdminRequired,
}

impl DenialReason {
    pub fn key(&self) -> &'static str {
        match self {
            DenialReason::NoAccess => "tenants.no_access",
            DenialReason::AdminRequired => "tenants.admin_required",
            DenialReason::OperatorRequired => "tenants.operator_required",
            DenialReason::HosterAdminRequired => "tenants.hoster_admin_required",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::NoAccess => "You do not have access to this tenant",
            DenialReason::AdminRequired => "This action requires the admin role in this tenant",
            DenialReason::OperatorRequired => {
                "This action requires the operator or admin role in this tenant"
            }
            DenialReason::HosterAdminRequired => {
                "This action requires the admin role in the hoster tenant"
            }
        }
    }
}

/// Access gate failures
#[derive(Debug, Error)]
pub enum AccessDenial {
    /// No session. Recoverable by logging in.
    #[error("Authentication required")]
    AuthenticationMissing,

    #[error("{}", .0.message())]
    Denied(DenialReason),

    #[error("Invalid tenant identifier: {0}")]
    MalformedTenant(String),

    /// Admin-gated routes always need an explicit tenant
    #[error("A tenant must be selected")]
    TenantRequired,

    #[error("Authorization lookup failed: {0}")]
    Internal(#[from] DirectoryError),
}

impl AccessDenial {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AccessDenial::AuthenticationMissing => 303,
            AccessDenial::Denied(_) => 403,
            AccessDenial::MalformedTenant(_) => 400,
            AccessDenial::TenantRequired => 400,
            AccessDenial::Internal(_) => 500,
        }
    }

    /// Message key for localization
    pub fn message_key(&self) -> &'static str {
        match self {
            AccessDenial::AuthenticationMissing => "auth.login_required",
            AccessDenial::Denied(reason) => reason.key(),
            AccessDenial::MalformedTenant(_) => "tenants.invalid_tenant_id",
            AccessDenial::TenantRequired => "tenants.tenant_required",
            AccessDenial::Internal(_) => "errors.internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_mapping() {
        let denial = AccessDenial::Denied(DenialReason::OperatorRequired);
        assert_eq!(denial.status_code(), 403);
        assert_eq!(denial.message_key(), "tenants.operator_required");
        assert!(denial.to_string().contains("operator"));

        assert_eq!(AccessDenial::MalformedTenant("x".into()).status_code(), 400);
        assert_eq!(AccessDenial::AuthenticationMissing.status_code(), 303);
    }
}
