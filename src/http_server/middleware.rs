//! # Access Middleware
//!
//! axum adapters for the access gates. Each one identifies the caller
//! from the session, reads the `:tenant` path parameter when the route has
//! one, and on success attaches the [`RequestScope`] to the request
//! extensions for handlers to pick up.
//!
//! Apply with `route_layer` so path parameters are already matched.

use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};

use super::errors::denial_response;
use super::state::ConsoleState;
use crate::authz::{AccessDenial, Gate, RequestScope};

/// Name of the tenant path parameter
pub const TENANT_PARAM: &str = "tenant";

type PathParams = Option<Path<HashMap<String, String>>>;

async fn enforce(
    gate: Gate,
    state: &ConsoleState,
    params: PathParams,
    mut request: Request,
    next: Next,
) -> Response {
    let user = state.sessions.identify(request.headers());
    let tenant = params
        .as_ref()
        .and_then(|Path(params)| params.get(TENANT_PARAM))
        .map(String::as_str);

    match gate.check(&state.resolver, user.clone(), tenant) {
        Ok(scope) => {
            request.extensions_mut().insert::<RequestScope>(scope);
            next.run(request).await
        }
        Err(denial) => {
            if let AccessDenial::Denied(reason) = &denial {
                tracing::info!(
                    user = user.as_ref().map(|u| u.as_str()).unwrap_or_default(),
                    tenant = tenant.unwrap_or_default(),
                    reason = reason.key(),
                    "access denied"
                );
            }
            let requested = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            denial_response(&denial, &state.login_path, requested)
        }
    }
}

/// Any membership in the addressed tenant
pub async fn require_tenant_access(
    State(state): State<ConsoleState>,
    params: PathParams,
    request: Request,
    next: Next,
) -> Response {
    enforce(Gate::TenantAccess, &state, params, request, next).await
}

/// Operator or admin role in the addressed tenant
pub async fn require_operator_or_admin(
    State(state): State<ConsoleState>,
    params: PathParams,
    request: Request,
    next: Next,
) -> Response {
    enforce(Gate::TenantOperatorOrAdmin, &state, params, request, next).await
}

/// Admin role in the hoster tenant
pub async fn require_hoster_admin(
    State(state): State<ConsoleState>,
    params: PathParams,
    request: Request,
    next: Next,
) -> Response {
    enforce(Gate::HosterAdmin, &state, params, request, next).await
}

/// Admin role in the addressed tenant, or hoster admin
pub async fn require_tenant_or_hoster_admin(
    State(state): State<ConsoleState>,
    params: PathParams,
    request: Request,
    next: Next,
) -> Response {
    enforce(Gate::TenantOrHosterAdmin, &state, params, request, next).await
}
