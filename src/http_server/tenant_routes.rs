//! # Tenant Routes
//!
//! Tenant selection for any member, and membership management for tenant
//! admins and hoster admins.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use super::errors::ApiError;
use super::middleware::{require_tenant_access, require_tenant_or_hoster_admin};
use super::state::ConsoleState;
use crate::authz::RequestScope;
use crate::tenancy::{DirectoryError, Membership, Role, TenantId, TenantMembership, UserId};

/// Routes open to any member of the addressed tenant
pub fn tenant_access_routes(state: ConsoleState) -> Router<ConsoleState> {
    Router::new()
        .route("/tenants", get(list_my_tenants))
        .route("/tenant/:tenant/me", get(my_access))
        .route("/tenant/:tenant/default", post(set_my_default))
        .route_layer(middleware::from_fn_with_state(state, require_tenant_access))
}

/// Membership management. Hoster admins can seed the first admin of a new
/// tenant.
pub fn member_routes(state: ConsoleState) -> Router<ConsoleState> {
    Router::new()
        .route("/tenant/:tenant/members", get(list_members).post(add_member))
        .route("/tenant/:tenant/members/:user/role", post(change_role))
        .route("/tenant/:tenant/members/:user", axum::routing::delete(remove_member))
        .route_layer(middleware::from_fn_with_state(state, require_tenant_or_hoster_admin))
}

/// Tenant the gate resolved for this request
pub(crate) fn scoped_tenant(scope: &RequestScope) -> Result<TenantId, ApiError> {
    scope
        .tenant
        .ok_or_else(|| ApiError::BadRequest("a tenant must be selected".to_string()))
}

fn parse_role(raw: &str) -> Result<Role, ApiError> {
    raw.parse::<Role>()
        .map_err(|_| ApiError::from(DirectoryError::InvalidRole(raw.to_string())))
}

// ==================
// Tenant selection
// ==================

#[derive(Debug, Serialize)]
struct MyTenantsResponse {
    tenants: Vec<TenantMembership>,
    default_tenant: Option<TenantId>,
    is_hoster_admin: bool,
}

async fn list_my_tenants(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
) -> Result<impl IntoResponse, ApiError> {
    let tenants = state.directory.tenants_for(&scope.user);
    let default_tenant = state.directory.default_tenant_for(&scope.user).map(|t| t.id);
    let is_hoster_admin = state.resolver.is_hoster_admin(&scope.user)?;

    Ok(Json(MyTenantsResponse {
        tenants,
        default_tenant,
        is_hoster_admin,
    }))
}

/// Booleans the UI renders conditional elements from
#[derive(Debug, Serialize)]
struct AccessSummary {
    user: UserId,
    tenant: Option<TenantId>,
    role: Option<Role>,
    is_admin: bool,
    is_operator_or_admin: bool,
    is_hoster_admin: bool,
}

async fn my_access(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
) -> Result<impl IntoResponse, ApiError> {
    let role = scope
        .tenant
        .and_then(|tenant_id| state.resolver.role_of(&scope.user, tenant_id));
    let is_hoster_admin = state.resolver.is_hoster_admin(&scope.user)?;

    Ok(Json(AccessSummary {
        role,
        is_admin: role.is_some_and(|r| r.is_admin()),
        is_operator_or_admin: role.is_some_and(|r| r.is_operator_or_admin()),
        is_hoster_admin,
        tenant: scope.tenant,
        user: scope.user,
    }))
}

async fn set_my_default(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = scoped_tenant(&scope)?;
    state.directory.set_default_tenant(&scope.user, tenant_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================
// Members
// ==================

#[derive(Debug, Deserialize)]
struct AddMemberRequest {
    user_id: String,
    role: String,
    #[serde(default)]
    is_default: bool,
}

#[derive(Debug, Deserialize)]
struct ChangeRoleRequest {
    role: String,
}

#[derive(Debug, Deserialize)]
struct MemberPath {
    user: String,
}

async fn list_members(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
) -> Result<Json<Vec<Membership>>, ApiError> {
    let tenant_id = scoped_tenant(&scope)?;
    Ok(Json(state.directory.members_of(tenant_id)?))
}

async fn add_member(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Json(request): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = scoped_tenant(&scope)?;
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id cannot be empty".to_string()));
    }
    let role = parse_role(&request.role)?;
    let user = UserId::new(user_id);

    // Defaults in other tenants are not this tenant's to clear
    let is_default = request.is_default && state.directory.tenants_for(&user).is_empty();
    let membership = state.directory.assign_user(&user, tenant_id, role, is_default)?;
    tracing::info!(
        tenant_id = %tenant_id,
        user = user_id,
        role = role.as_str(),
        by = %scope.user,
        "user assigned to tenant"
    );
    Ok((StatusCode::CREATED, Json(membership)))
}

async fn change_role(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Path(path): Path<MemberPath>,
    Json(request): Json<ChangeRoleRequest>,
) -> Result<Json<Membership>, ApiError> {
    let tenant_id = scoped_tenant(&scope)?;
    let role = parse_role(&request.role)?;
    let membership = state
        .directory
        .update_role(&UserId::new(path.user), tenant_id, role)?;
    tracing::info!(
        tenant_id = %tenant_id,
        user = %membership.user_id,
        role = role.as_str(),
        by = %scope.user,
        "member role changed"
    );
    Ok(Json(membership))
}

async fn remove_member(
    State(state): State<ConsoleState>,
    Extension(scope): Extension<RequestScope>,
    Path(path): Path<MemberPath>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = scoped_tenant(&scope)?;
    let user = UserId::new(path.user);
    state.directory.remove_user(&user, tenant_id)?;
    tracing::info!(tenant_id = %tenant_id, user = %user, by = %scope.user, "user removed from tenant");
    Ok(StatusCode::NO_CONTENT)
}
