//! # Enrollment Routes
//!
//! Token management for tenant operators and admins, and the public
//! redemption endpoint agents call with nothing but a token value.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Form, Json, Router,
};
use serde::{Deserialize, Serialize};

use super::errors::{redemption_error_response, ApiError};
use super::middleware::require_operator_or_admin;
use super::state::ConsoleState;
use super::tenant_routes::scoped_tenant;
use crate::authz::RequestScope;
use crate::bootstrap::{Platform, BUNDLE_CONTENT_TYPE};
use crate::enrollment::{
    parse_expiry_date, EnrollmentError, EnrollmentToken, NewEnrollmentToken, TokenId,
};
use crate::tenancy::{SiteId, TenantId};

/// Token management, operators and admins of the addressed tenant
pub fn token_admin_routes(state: ConsoleState) -> Router<ConsoleState> {
    Router::new()
        .route(
            "/tenant/:tenant/enrollment-tokens",
            get(list_tokens).post(create_token),
        )
        .route(
            "/tenant/:tenant/enrollment-tokens/:id",
            axum::routing::delete(delete_token),
        )
        .route("/tenant/:tenant/enrollment-tokens/:id/toggle", post(toggle_token))
        .route(
            "/tenant/:tenant/enrollment-tokens/:id/install-command",
            get(install_command),
        )
        .route("/tenant/:tenant/enrollment-tokens/:id/config", get(download_config))
        .route("/tenant/:tenant/enrollment-tokens/:id/installer", get(download_installer))
        .route_layer(middleware::from_fn_with_state(state, require_operator_or_admin))
}

/// Unauthenticated redemption
pub fn redemption_routes() -> Router<ConsoleState> {
    Router::new()
        .route("/api/enroll/:token/config", get(redeem_by_path))
        .route("/api/enroll/config", get(redeem_by_query))
}

// ==================
// Form parsing
// ==================

/// Token creation form as submitted by the console UI
#[derive(Debug, Default, Deserialize)]
pub struct TokenForm {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub max_uses: String,
    #[serde(default)]
    pub site_id: String,
    #[serde(default)]
    pub expires_at: String,
}

impl TokenForm {
    /// Validate the form into creation parameters for `tenant_id`
    pub fn parse(&self, tenant_id: TenantId) -> Result<NewEnrollmentToken, EnrollmentError> {
        let max_uses = match self.max_uses.trim() {
            "" => 0,
            raw => raw.parse::<u32>().map_err(|_| {
                EnrollmentError::MalformedInput(format!(
                    "max_uses must be a non-negative integer, got '{}'",
                    raw
                ))
            })?,
        };

        let site_id = match self.site_id.trim() {
            "" => None,
            raw => {
                let id = raw.parse::<i64>().map_err(|_| {
                    EnrollmentError::MalformedInput(format!("invalid site_id '{}'", raw))
                })?;
                (id > 0).then_some(SiteId(id))
            }
        };

        let expires_at = match self.expires_at.trim() {
            "" => None,
            raw => Some(parse_expiry_date(raw).ok_or_else(|| {
                EnrollmentError::MalformedInput(format!(
                    "expires_at must be a YYYY-MM-DD date, got '{}'",
                    raw
                ))
            })?),
        };

        Ok(NewEnrollmentToken {
            tenant_id,
            site_id,
            description: self.description.trim().to_string(),
            max_uses,
            expires_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenPath {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct PlatformQuery {
    platform: Option<String>,
}

impl PlatformQuery {
    fn platform(&self) -> Platform {
        Platform::parse_or_default(self.platform.as_deref())
    }
}

/// Token addressed by the path, owned by the scoped tenant
fn scoped_token(
    state: &ConsoleState,
    scope: &RequestScope,
    path: &TokenPath,
) -> Result<EnrollmentToken, ApiError> {
    let tenant_id = scoped_tenant(scope)?;
    let id = path
        .id
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("invalid token id '{}'", path.id)))?;
    Ok(state.tokens.get_for_tenant(tenant_id, TokenId(id))?)
}

// ==================
// Admin handlers
// ==================

async fn list_tokens(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
) -> Result<Json<Vec<EnrollmentToken>>, ApiError> {
    let tenant_id = scoped_tenant(&scope)?;
    Ok(Json(state.tokens.list(tenant_id)))
}

async fn create_token(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Form(form): Form<TokenForm>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = scoped_tenant(&scope)?;
    let token = state.tokens.create(form.parse(tenant_id)?)?;
    Ok((StatusCode::CREATED, Json(token)))
}

/// Requested state; anything but `true` deactivates
#[derive(Debug, Default, Deserialize)]
struct ToggleForm {
    #[serde(default)]
    active: String,
}

async fn toggle_token(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Path(path): Path<TokenPath>,
    Form(form): Form<ToggleForm>,
) -> Result<Json<EnrollmentToken>, ApiError> {
    let token = scoped_token(&state, &scope, &path)?;
    let active = form.active.trim() == "true";
    Ok(Json(state.tokens.toggle(token.id, active)?))
}

async fn delete_token(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Path(path): Path<TokenPath>,
) -> Result<impl IntoResponse, ApiError> {
    let token = scoped_token(&state, &scope, &path)?;
    state.tokens.delete(token.id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct InstallCommandResponse {
    platform: Platform,
    label: &'static str,
    command: String,
}

async fn install_command(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Path(path): Path<TokenPath>,
    Query(query): Query<PlatformQuery>,
) -> Result<Json<InstallCommandResponse>, ApiError> {
    let token = scoped_token(&state, &scope, &path)?;
    let platform = query.platform();
    Ok(Json(InstallCommandResponse {
        platform,
        label: platform.label(),
        command: state.generator.install_command(&token, platform),
    }))
}

/// Pre-rendered bundle for manual deployment. Does not count as a redemption.
async fn download_config(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Path(path): Path<TokenPath>,
    Query(query): Query<PlatformQuery>,
) -> Result<Response, ApiError> {
    let token = scoped_token(&state, &scope, &path)?;
    let ca_certificate = state.secrets.ca_certificate()?;
    let bundle = state.generator.bundle(&token, query.platform(), &ca_certificate)?;
    Ok((
        [
            (header::CONTENT_TYPE, BUNDLE_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, bundle.content_disposition()),
        ],
        bundle.bytes,
    )
        .into_response())
}

async fn download_installer(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Path(path): Path<TokenPath>,
    Query(query): Query<PlatformQuery>,
) -> Result<Response, ApiError> {
    let token = scoped_token(&state, &scope, &path)?;
    let script = state.generator.installer_script(&token, query.platform());
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, script.content_disposition()),
        ],
        script.content,
    )
        .into_response())
}

// ==================
// Redemption
// ==================

#[derive(Debug, Default, Deserialize)]
struct RedeemQuery {
    token: Option<String>,
    platform: Option<String>,
}

async fn redeem_by_path(
    State(state): State<ConsoleState>,
    Path(token): Path<String>,
    Query(query): Query<PlatformQuery>,
) -> Response {
    redeem(&state, &token, query.platform())
}

async fn redeem_by_query(State(state): State<ConsoleState>, Query(query): Query<RedeemQuery>) -> Response {
    let platform = Platform::parse_or_default(query.platform.as_deref());
    redeem(&state, query.token.as_deref().unwrap_or_default(), platform)
}

fn redeem(state: &ConsoleState, value: &str, platform: Platform) -> Response {
    match state.redemption.redeem(value, platform) {
        Ok(redemption) => {
            let bundle = redemption.bundle;
            (
                [
                    (header::CONTENT_TYPE, BUNDLE_CONTENT_TYPE.to_string()),
                    (header::CONTENT_DISPOSITION, bundle.content_disposition()),
                ],
                bundle.bytes,
            )
                .into_response()
        }
        Err(err) => redemption_error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(max_uses: &str, site_id: &str, expires_at: &str) -> TokenForm {
        TokenForm {
            description: "  rollout ".to_string(),
            max_uses: max_uses.to_string(),
            site_id: site_id.to_string(),
            expires_at: expires_at.to_string(),
        }
    }

    #[test]
    fn test_form_defaults() {
        let parsed = form("", "", "").parse(TenantId(2)).unwrap();
        assert_eq!(parsed.max_uses, 0);
        assert_eq!(parsed.site_id, None);
        assert_eq!(parsed.expires_at, None);
        assert_eq!(parsed.description, "rollout");
    }

    #[test]
    fn test_form_values() {
        let parsed = form("5", "3", "2030-01-31").parse(TenantId(2)).unwrap();
        assert_eq!(parsed.max_uses, 5);
        assert_eq!(parsed.site_id, Some(SiteId(3)));
        assert_eq!(
            parsed.expires_at.map(|d| d.to_rfc3339()).as_deref(),
            Some("2030-01-31T00:00:00+00:00")
        );
        assert_eq!(form("", "0", "").parse(TenantId(2)).unwrap().site_id, None);
        assert_eq!(form("", "-4", "").parse(TenantId(2)).unwrap().site_id, None);
    }

    #[test]
    fn test_form_rejects_garbage() {
        for bad in [form("-1", "", ""), form("ten", "", ""), form("", "x", ""), form("", "", "31.01.2030")] {
            let err = bad.parse(TenantId(2)).unwrap_err();
            assert!(matches!(err, EnrollmentError::MalformedInput(_)));
            assert_eq!(err.status_code(), 400);
        }
    }
}
