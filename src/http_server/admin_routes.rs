//! # Global Admin Routes
//!
//! Deployment-wide administration, open to admins of the hoster tenant.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::errors::ApiError;
use super::middleware::require_hoster_admin;
use super::state::ConsoleState;
use crate::authz::RequestScope;
use crate::tenancy::{CreateTenantRequest, Tenant, TenantId, UserId};

pub fn admin_routes(state: ConsoleState) -> Router<ConsoleState> {
    Router::new()
        .route("/admin/tenants", get(list_tenants).post(create_tenant))
        .route("/admin/tenants/:target/hoster", post(designate_hoster))
        .route("/admin/users/:user/legacy-super-admin", post(set_legacy_flag))
        .route("/admin/enrollment-tokens/purge", post(purge_tokens))
        .route_layer(middleware::from_fn_with_state(state, require_hoster_admin))
}

async fn list_tenants(State(state): State<ConsoleState>) -> Json<Vec<Tenant>> {
    Json(state.directory.list_tenants())
}

async fn create_tenant(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Json(request): Json<CreateTenantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let description = request.description.trim();
    if description.is_empty() {
        return Err(ApiError::BadRequest("description cannot be empty".to_string()));
    }
    let tenant = state.directory.create_tenant(description, request.is_default)?;
    tracing::info!(tenant_id = %tenant.id, by = %scope.user, "tenant created");
    Ok((StatusCode::CREATED, Json(tenant)))
}

async fn designate_hoster(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Path(target): Path<String>,
) -> Result<Json<Tenant>, ApiError> {
    let tenant_id = target
        .parse::<TenantId>()
        .map_err(|_| ApiError::BadRequest(format!("invalid tenant id '{}'", target)))?;
    state.directory.set_hoster_tenant(tenant_id)?;
    tracing::info!(tenant_id = %tenant_id, by = %scope.user, "hoster tenant transferred");
    Ok(Json(state.directory.get_tenant(tenant_id)?))
}

#[derive(Debug, Deserialize)]
struct LegacyFlagRequest {
    enabled: bool,
}

async fn set_legacy_flag(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Path(user): Path<String>,
    Json(request): Json<LegacyFlagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = UserId::new(user);
    state.directory.set_legacy_super_admin(&user, request.enabled)?;
    tracing::warn!(
        user = %user,
        enabled = request.enabled,
        by = %scope.user,
        "legacy super admin flag changed"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct PurgeResponse {
    removed: usize,
}

async fn purge_tokens(State(state): State<ConsoleState>) -> Result<Json<PurgeResponse>, ApiError> {
    let removed = state.tokens.purge_inert(Utc::now())?;
    Ok(Json(PurgeResponse { removed }))
}
