//! # Access Gates
//!
//! The request-entry checks. Each is a synchronous, single-shot decision
//! that either yields the [`RequestScope`] handlers run under, or a typed
//! [`AccessDenial`]. The axum adapters live in `http_server::middleware`.

use serde::Serialize;

use super::errors::{AccessDenial, DenialReason};
use super::resolver::{AuthorizationResolver, GlobalAuthority};
use crate::tenancy::{TenantId, UserId};

/// Tenant parameter value meaning "no tenant selected"
pub const NO_TENANT_SELECTED: &str = "-1";

/// Identity and tenant resolved at request entry, attached to request
/// extensions for downstream handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestScope {
    pub user: UserId,
    pub tenant: Option<TenantId>,
}

/// Request-entry gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Any membership in the addressed tenant; tenant-agnostic when none is addressed
    TenantAccess,
    /// Admin role in the addressed tenant
    TenantAdmin,
    /// Operator or admin role in the addressed tenant
    TenantOperatorOrAdmin,
    /// Admin role in the hoster tenant, whatever tenant the URL names
    HosterAdmin,
    /// Admin role in the addressed tenant, or hoster admin
    TenantOrHosterAdmin,
}

impl Gate {
    /// Run the gate.
    ///
    /// `tenant_param` is the raw tenant identifier from the request, if any.
    pub fn check(
        self,
        resolver: &AuthorizationResolver,
        user: Option<UserId>,
        tenant_param: Option<&str>,
    ) -> Result<RequestScope, AccessDenial> {
        let user = user.ok_or(AccessDenial::AuthenticationMissing)?;

        match self {
            Gate::TenantAccess => {
                let tenant = match tenant_param.map(str::trim) {
                    None | Some("") | Some(NO_TENANT_SELECTED) => None,
                    Some(raw) => Some(parse_tenant(raw)?),
                };
                if let Some(tenant_id) = tenant {
                    if !resolver.has_access(&user, tenant_id) {
                        return Err(AccessDenial::Denied(DenialReason::NoAccess));
                    }
                }
                Ok(RequestScope { user, tenant })
            }
            Gate::TenantAdmin => {
                let tenant_id = required_tenant(tenant_param)?;
                if !resolver.is_admin(&user, tenant_id) {
                    return Err(AccessDenial::Denied(DenialReason::AdminRequired));
                }
                Ok(RequestScope {
                    user,
                    tenant: Some(tenant_id),
                })
            }
            Gate::TenantOperatorOrAdmin => {
                let tenant_id = required_tenant(tenant_param)?;
                if !resolver.is_operator_or_admin(&user, tenant_id) {
                    return Err(AccessDenial::Denied(DenialReason::OperatorRequired));
                }
                Ok(RequestScope {
                    user,
                    tenant: Some(tenant_id),
                })
            }
            Gate::HosterAdmin => match resolver.global_authority(&user)? {
                GlobalAuthority::HosterAdmin { hoster } => Ok(RequestScope {
                    user,
                    tenant: Some(hoster),
                }),
                GlobalAuthority::LegacySuperAdmin => Ok(RequestScope { user, tenant: None }),
                GlobalAuthority::None => {
                    Err(AccessDenial::Denied(DenialReason::HosterAdminRequired))
                }
            },
            Gate::TenantOrHosterAdmin => {
                let tenant_id = required_tenant(tenant_param)?;
                if !resolver.is_admin(&user, tenant_id) && !resolver.is_hoster_admin(&user)? {
                    return Err(AccessDenial::Denied(DenialReason::AdminRequired));
                }
                Ok(RequestScope {
                    user,
                    tenant: Some(tenant_id),
                })
            }
        }
    }
}

fn parse_tenant(raw: &str) -> Result<TenantId, AccessDenial> {
    raw.parse::<TenantId>()
        .map_err(|_| AccessDenial::MalformedTenant(raw.to_string()))
}

fn required_tenant(tenant_param: Option<&str>) -> Result<TenantId, AccessDenial> {
    match tenant_param.map(str::trim) {
        None | Some("") => Err(AccessDenial::TenantRequired),
        Some(raw) => parse_tenant(raw),
    }
}
