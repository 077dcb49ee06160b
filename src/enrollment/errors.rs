//! # Enrollment Errors

use thiserror::Error;

use super::token::TokenState;
use crate::bootstrap::BootstrapError;
use crate::persistence::PersistenceError;
use crate::tenancy::TenantId;

/// Result type for enrollment operations
pub type EnrollmentResult<T> = Result<T, EnrollmentError>;

/// Enrollment token store errors
#[derive(Debug, Error)]
pub enum EnrollmentError {
    /// Unknown token. Carries no detail so lookups by value reveal nothing.
    #[error("invalid token")]
    NotFound,

    /// Found, but not redeemable
    #[error("{}", .0.reason())]
    Invalid(TokenState),

    #[error("Invalid input: {0}")]
    MalformedInput(String),

    #[error("Tenant not found: {0}")]
    TenantNotFound(TenantId),

    /// Token value collision or similar broken guarantee
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl EnrollmentError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            EnrollmentError::NotFound => 404,
            EnrollmentError::Invalid(_) => 403,
            EnrollmentError::MalformedInput(_) => 400,
            EnrollmentError::TenantNotFound(_) => 404,
            EnrollmentError::InvariantViolation(_) => 500,
            EnrollmentError::Persistence(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            EnrollmentError::NotFound => "TOKEN_NOT_FOUND",
            EnrollmentError::Invalid(TokenState::Inactive) => "TOKEN_INACTIVE",
            EnrollmentError::Invalid(TokenState::Expired) => "TOKEN_EXPIRED",
            EnrollmentError::Invalid(_) => "TOKEN_EXHAUSTED",
            EnrollmentError::MalformedInput(_) => "MALFORMED_INPUT",
            EnrollmentError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            EnrollmentError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            EnrollmentError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}

/// Failures on the unauthenticated redemption path
#[derive(Debug, Error)]
pub enum RedemptionError {
    #[error("missing token")]
    MissingToken,

    #[error(transparent)]
    Token(#[from] EnrollmentError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}

impl RedemptionError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            RedemptionError::MissingToken => 400,
            RedemptionError::Token(e) => e.status_code(),
            RedemptionError::Bootstrap(e) => e.status_code(),
        }
    }

    /// Plain-text body for the agent. Server faults never echo internals.
    pub fn public_message(&self) -> String {
        match self {
            RedemptionError::MissingToken => "missing token".to_string(),
            RedemptionError::Token(EnrollmentError::NotFound) => "invalid token".to_string(),
            RedemptionError::Token(EnrollmentError::Invalid(state)) => state.reason().to_string(),
            RedemptionError::Token(_) => "internal error".to_string(),
            RedemptionError::Bootstrap(e) => e.public_message().to_string(),
        }
    }
}
