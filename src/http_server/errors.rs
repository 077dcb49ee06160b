//! # HTTP Error Responses
//!
//! Admin endpoints answer with a JSON error body; the redemption endpoint
//! answers with plain text only.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::authz::AccessDenial;
use crate::bootstrap::BootstrapError;
use crate::enrollment::{EnrollmentError, RedemptionError};
use crate::tenancy::DirectoryError;

/// Header carrying the message key of a 403 denial
pub const DENIAL_REASON_HEADER: &str = "x-denial-reason";

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub status: u16,
}

/// Errors surfaced by admin handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Directory(e) => e.status_code(),
            ApiError::Enrollment(e) => e.status_code(),
            ApiError::Bootstrap(e) => e.status_code(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Directory(e) => e.error_code(),
            ApiError::Enrollment(e) => e.error_code(),
            ApiError::Bootstrap(e) => e.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_from(self.status_code());
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }

        // Server faults keep their detail in the log
        let error = match &self {
            ApiError::Bootstrap(e) => e.public_message().to_string(),
            _ if status.is_server_error() => "internal error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error,
            code: self.error_code(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

/// Response for a request stopped at an access gate
pub fn denial_response(denial: &AccessDenial, login_path: &str, requested: &str) -> Response {
    match denial {
        AccessDenial::AuthenticationMissing => {
            let target = format!("{}?next={}", login_path, urlencoding::encode(requested));
            Redirect::to(&target).into_response()
        }
        AccessDenial::Internal(e) => {
            tracing::error!(error = %e, "authorization lookup failed");
            let body = ErrorResponse {
                error: "internal error".to_string(),
                code: e.error_code(),
                status: 500,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
        other => {
            let status = status_from(other.status_code());
            let body = ErrorResponse {
                error: other.to_string(),
                code: other.message_key(),
                status: status.as_u16(),
            };
            let mut response = (status, Json(body)).into_response();
            if let AccessDenial::Denied(reason) = other {
                response
                    .headers_mut()
                    .insert(DENIAL_REASON_HEADER, HeaderValue::from_static(reason.key()));
            }
            response
        }
    }
}

/// Plain-text response for the agent-facing redemption endpoint
pub fn redemption_error_response(err: &RedemptionError) -> Response {
    let status = status_from(err.status_code());
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        err.public_message(),
    )
        .into_response()
}

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::DenialReason;
    use crate::enrollment::TokenState;
    use crate::tenancy::TenantId;

    #[test]
    fn test_unauthenticated_redirects_to_login() {
        let response = denial_response(&AccessDenial::AuthenticationMissing, "/login", "/tenant/2/members");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?next=%2Ftenant%2F2%2Fmembers"
        );
    }

    #[test]
    fn test_denied_carries_reason_header() {
        let denial = AccessDenial::Denied(DenialReason::AdminRequired);
        let response = denial_response(&denial, "/login", "/");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[DENIAL_REASON_HEADER], "tenants.admin_required");
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(
            ApiError::from(DirectoryError::TenantNotFound(TenantId(9))).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BadRequest("max_uses".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_redemption_errors_are_plain_text() {
        let err = RedemptionError::from(EnrollmentError::Invalid(TokenState::Expired));
        let response = redemption_error_response(&err);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    }
}
