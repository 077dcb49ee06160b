//! # Authorization Resolver
//!
//! Read-only role and hoster-admin questions over the tenant directory.
//!
//! Global authority is never read from a stored bit by callers. It is
//! computed by [`AuthorizationResolver::global_authority`]: the hoster-tenant
//! derivation is authoritative whenever a hoster tenant exists, and the legacy
//! `legacy_super_admin` flag is consulted only while none has been designated.

use std::sync::Arc;

use serde::Serialize;

use crate::tenancy::{DirectoryResult, Role, TenantDirectory, TenantId, UserId};

/// How a user's global authority was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum GlobalAuthority {
    /// Admin of the designated hoster tenant
    HosterAdmin { hoster: TenantId },
    /// Transitional: granted by the legacy flag because no hoster tenant exists
    LegacySuperAdmin,
    /// No global authority
    None,
}

impl GlobalAuthority {
    pub fn is_granted(&self) -> bool {
        !matches!(self, GlobalAuthority::None)
    }
}

/// Answers membership, role and hoster-admin queries
#[derive(Debug, Clone)]
pub struct AuthorizationResolver {
    directory: Arc<TenantDirectory>,
}

impl AuthorizationResolver {
    pub fn new(directory: Arc<TenantDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Arc<TenantDirectory> {
        &self.directory
    }

    /// Role of the user in the tenant, `None` means no access
    pub fn role_of(&self, user: &UserId, tenant_id: TenantId) -> Option<Role> {
        self.directory.membership(user, tenant_id).map(|m| m.role)
    }

    /// True iff a membership exists, whatever the role
    pub fn has_access(&self, user: &UserId, tenant_id: TenantId) -> bool {
        self.role_of(user, tenant_id).is_some()
    }

    pub fn is_admin(&self, user: &UserId, tenant_id: TenantId) -> bool {
        self.role_of(user, tenant_id)
            .map(|role| role.is_admin())
            .unwrap_or(false)
    }

    pub fn is_operator_or_admin(&self, user: &UserId, tenant_id: TenantId) -> bool {
        self.role_of(user, tenant_id)
            .map(|role| role.is_operator_or_admin())
            .unwrap_or(false)
    }

    /// Decide the user's global authority.
    ///
    /// Fails only if the directory holds more than one hoster tenant.
    pub fn global_authority(&self, user: &UserId) -> DirectoryResult<GlobalAuthority> {
        let legacy = self.directory.legacy_super_admin(user);

        match self.directory.hoster_tenant()? {
            Some(hoster) => {
                let derived = self.is_admin(user, hoster.id);
                if legacy && !derived {
                    tracing::warn!(
                        user = %user,
                        hoster_tenant = %hoster.id,
                        "legacy super-admin flag ignored: user is not admin of the hoster tenant"
                    );
                }
                if derived {
                    Ok(GlobalAuthority::HosterAdmin { hoster: hoster.id })
                } else {
                    Ok(GlobalAuthority::None)
                }
            }
            None if legacy => {
                tracing::warn!(
                    user = %user,
                    "hoster-admin granted through legacy super-admin flag: no hoster tenant designated"
                );
                Ok(GlobalAuthority::LegacySuperAdmin)
            }
            None => Ok(GlobalAuthority::None),
        }
    }

    pub fn is_hoster_admin(&self, user: &UserId) -> DirectoryResult<bool> {
        self.global_authority(user).map(|authority| authority.is_granted())
    }
}
