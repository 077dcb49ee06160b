//! # Tenant Directory
//!
//! Storage and retrieval of tenants, memberships and user records.
//!
//! Every write runs under one exclusive lock: the closure mutates a copy of the
//! state, the copy is persisted, and only then swapped in. The single-flag
//! invariants (one hoster tenant, one default tenant per user) are therefore
//! maintained by a clear-then-set that no concurrent writer can interleave with.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};

use super::errors::{DirectoryError, DirectoryResult};
use super::membership::{Membership, Role, UserId, UserRecord};
use super::tenant::{Tenant, TenantId};
use crate::persistence::SnapshotFile;

/// Snapshot file name inside the data directory
pub const DIRECTORY_SNAPSHOT: &str = "tenants.json";

/// A tenant as seen by one of its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantMembership {
    pub tenant: Tenant,
    pub role: Role,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
struct DirectoryState {
    next_tenant_id: i64,
    tenants: BTreeMap<TenantId, Tenant>,
    memberships: BTreeMap<(UserId, TenantId), Membership>,
    users: BTreeMap<UserId, UserRecord>,
}

/// On-disk form of the directory
#[derive(Debug, Default, Serialize, Deserialize)]
struct DirectorySnapshot {
    next_tenant_id: i64,
    tenants: Vec<Tenant>,
    memberships: Vec<Membership>,
    users: Vec<UserRecord>,
}

impl From<&DirectoryState> for DirectorySnapshot {
    fn from(state: &DirectoryState) -> Self {
        Self {
            next_tenant_id: state.next_tenant_id,
            tenants: state.tenants.values().cloned().collect(),
            memberships: state.memberships.values().cloned().collect(),
            users: state.users.values().cloned().collect(),
        }
    }
}

impl From<DirectorySnapshot> for DirectoryState {
    fn from(snapshot: DirectorySnapshot) -> Self {
        let max_id = snapshot.tenants.iter().map(|t| t.id.0).max().unwrap_or(0);
        Self {
            next_tenant_id: snapshot.next_tenant_id.max(max_id),
            tenants: snapshot.tenants.into_iter().map(|t| (t.id, t)).collect(),
            memberships: snapshot
                .memberships
                .into_iter()
                .map(|m| ((m.user_id.clone(), m.tenant_id), m))
                .collect(),
            users: snapshot.users.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }
}

impl DirectoryState {
    fn tenant(&self, tenant_id: TenantId) -> DirectoryResult<&Tenant> {
        self.tenants
            .get(&tenant_id)
            .ok_or(DirectoryError::TenantNotFound(tenant_id))
    }

    fn membership_mut(&mut self, user: &UserId, tenant_id: TenantId) -> DirectoryResult<&mut Membership> {
        self.memberships
            .get_mut(&(user.clone(), tenant_id))
            .ok_or_else(|| DirectoryError::MembershipNotFound {
                user: user.clone(),
                tenant: tenant_id,
            })
    }

    fn clear_user_defaults(&mut self, user: &UserId) {
        for membership in self.memberships.values_mut() {
            if &membership.user_id == user {
                membership.is_default = false;
            }
        }
    }

    fn hoster_tenants(&self) -> Vec<&Tenant> {
        self.tenants.values().filter(|t| t.is_hoster_tenant).collect()
    }

    fn ensure_user(&mut self, user: &UserId) {
        self.users
            .entry(user.clone())
            .or_insert_with(|| UserRecord::new(user.clone()));
    }
}

/// Tenant, membership and user store
#[derive(Debug)]
pub struct TenantDirectory {
    state: RwLock<DirectoryState>,
    snapshot: Option<SnapshotFile>,
}

impl TenantDirectory {
    /// Create a memory-only directory
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
            snapshot: None,
        }
    }

    /// Open a directory persisted under `data_dir`, or memory-only when `None`
    pub fn open(data_dir: Option<&Path>) -> DirectoryResult<Self> {
        let Some(dir) = data_dir else {
            return Ok(Self::new());
        };

        let snapshot = SnapshotFile::new(dir.join(DIRECTORY_SNAPSHOT));
        let state = snapshot
            .load::<DirectorySnapshot>()?
            .map(DirectoryState::from)
            .unwrap_or_default();

        Ok(Self {
            state: RwLock::new(state),
            snapshot: Some(snapshot),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, DirectoryState> {
        // Writers only swap in fully built states, so a poisoned lock still
        // guards a consistent value.
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit<R>(
        &self,
        op: impl FnOnce(&mut DirectoryState) -> DirectoryResult<R>,
    ) -> DirectoryResult<R> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        let out = op(&mut next)?;
        if let Some(snapshot) = &self.snapshot {
            snapshot.store(&DirectorySnapshot::from(&next))?;
        }
        *guard = next;
        Ok(out)
    }

    // ==================
    // Tenants
    // ==================

    /// Create a tenant. A new default tenant takes the flag from the previous one.
    pub fn create_tenant(&self, description: &str, is_default: bool) -> DirectoryResult<Tenant> {
        self.commit(|state| {
            state.next_tenant_id += 1;
            let tenant = Tenant::new(TenantId(state.next_tenant_id), description, is_default);
            if is_default {
                for other in state.tenants.values_mut() {
                    other.is_default = false;
                }
            }
            state.tenants.insert(tenant.id, tenant.clone());
            Ok(tenant)
        })
    }

    /// Get tenant by ID
    pub fn get_tenant(&self, tenant_id: TenantId) -> DirectoryResult<Tenant> {
        self.read().tenant(tenant_id).cloned()
    }

    pub fn tenant_exists(&self, tenant_id: TenantId) -> bool {
        self.read().tenants.contains_key(&tenant_id)
    }

    /// List all tenants ordered by ID
    pub fn list_tenants(&self) -> Vec<Tenant> {
        self.read().tenants.values().cloned().collect()
    }

    /// Get the tenant flagged as default
    pub fn default_tenant(&self) -> Option<Tenant> {
        self.read().tenants.values().find(|t| t.is_default).cloned()
    }

    /// Resolve the hoster tenant, `None` if none has been designated.
    ///
    /// More than one flagged tenant is reported, never repaired.
    pub fn hoster_tenant(&self) -> DirectoryResult<Option<Tenant>> {
        let state = self.read();
        match state.hoster_tenants().as_slice() {
            [] => Ok(None),
            [hoster] => Ok(Some((*hoster).clone())),
            many => {
                let ids: Vec<String> = many.iter().map(|t| t.id.to_string()).collect();
                tracing::error!(tenants = %ids.join(","), "multiple tenants flagged as hoster");
                Err(DirectoryError::InvariantViolation(format!(
                    "{} tenants flagged as hoster: {}",
                    many.len(),
                    ids.join(", ")
                )))
            }
        }
    }

    pub fn is_hoster_tenant(&self, tenant_id: TenantId) -> DirectoryResult<bool> {
        self.read().tenant(tenant_id).map(|t| t.is_hoster_tenant)
    }

    /// Move the hoster flag to `tenant_id` (clear all, then set one)
    pub fn set_hoster_tenant(&self, tenant_id: TenantId) -> DirectoryResult<()> {
        self.commit(|state| {
            state.tenant(tenant_id)?;
            for tenant in state.tenants.values_mut() {
                tenant.is_hoster_tenant = tenant.id == tenant_id;
            }
            Ok(())
        })?;
        tracing::info!(tenant_id = %tenant_id, "hoster tenant designated");
        Ok(())
    }

    /// Designate the default tenant as hoster if no hoster exists yet
    pub fn ensure_hoster_tenant(&self) -> DirectoryResult<Tenant> {
        self.commit(|state| {
            if let [hoster] = state.hoster_tenants().as_slice() {
                return Ok((*hoster).clone());
            }
            if state.hoster_tenants().len() > 1 {
                return Err(DirectoryError::InvariantViolation(
                    "multiple tenants flagged as hoster".to_string(),
                ));
            }

            let default_id = state
                .tenants
                .values()
                .find(|t| t.is_default)
                .map(|t| t.id)
                .ok_or(DirectoryError::NoDefaultTenant)?;

            let tenant = state
                .tenants
                .get_mut(&default_id)
                .ok_or(DirectoryError::TenantNotFound(default_id))?;
            tenant.is_hoster_tenant = true;
            Ok(tenant.clone())
        })
    }

    // ==================
    // Memberships
    // ==================

    /// Assign a user to a tenant
    pub fn assign_user(
        &self,
        user: &UserId,
        tenant_id: TenantId,
        role: Role,
        is_default: bool,
    ) -> DirectoryResult<Membership> {
        self.commit(|state| {
            state.tenant(tenant_id)?;
            let key = (user.clone(), tenant_id);
            if state.memberships.contains_key(&key) {
                return Err(DirectoryError::MembershipExists {
                    user: user.clone(),
                    tenant: tenant_id,
                });
            }

            if is_default {
                state.clear_user_defaults(user);
            }
            state.ensure_user(user);

            let membership = Membership {
                user_id: user.clone(),
                tenant_id,
                role,
                is_default,
            };
            state.memberships.insert(key, membership.clone());
            Ok(membership)
        })
    }

    /// Remove a user from a tenant
    pub fn remove_user(&self, user: &UserId, tenant_id: TenantId) -> DirectoryResult<()> {
        self.commit(|state| {
            state
                .memberships
                .remove(&(user.clone(), tenant_id))
                .map(|_| ())
                .ok_or_else(|| DirectoryError::MembershipNotFound {
                    user: user.clone(),
                    tenant: tenant_id,
                })
        })
    }

    /// Change the role of a user within a tenant
    pub fn update_role(&self, user: &UserId, tenant_id: TenantId, role: Role) -> DirectoryResult<Membership> {
        self.commit(|state| {
            let membership = state.membership_mut(user, tenant_id)?;
            membership.role = role;
            Ok(membership.clone())
        })
    }

    /// Make `tenant_id` the user's default tenant (clear all, then set one)
    pub fn set_default_tenant(&self, user: &UserId, tenant_id: TenantId) -> DirectoryResult<()> {
        self.commit(|state| {
            state.membership_mut(user, tenant_id)?;
            state.clear_user_defaults(user);
            state.membership_mut(user, tenant_id)?.is_default = true;
            Ok(())
        })
    }

    /// The user's flagged default tenant, else the first one they belong to
    pub fn default_tenant_for(&self, user: &UserId) -> Option<Tenant> {
        let state = self.read();
        let mut memberships = state.memberships.values().filter(|m| &m.user_id == user);
        let chosen = memberships
            .clone()
            .find(|m| m.is_default)
            .or_else(|| memberships.next())?;
        state.tenants.get(&chosen.tenant_id).cloned()
    }

    /// Look up one membership
    pub fn membership(&self, user: &UserId, tenant_id: TenantId) -> Option<Membership> {
        self.read().memberships.get(&(user.clone(), tenant_id)).cloned()
    }

    /// All tenants a user belongs to, with their role in each
    pub fn tenants_for(&self, user: &UserId) -> Vec<TenantMembership> {
        let state = self.read();
        state
            .memberships
            .values()
            .filter(|m| &m.user_id == user)
            .filter_map(|m| {
                state.tenants.get(&m.tenant_id).map(|tenant| TenantMembership {
                    tenant: tenant.clone(),
                    role: m.role,
                    is_default: m.is_default,
                })
            })
            .collect()
    }

    /// All tenants where the user holds the admin role
    pub fn tenants_where_admin(&self, user: &UserId) -> Vec<Tenant> {
        self.tenants_for(user)
            .into_iter()
            .filter(|tm| tm.role.is_admin())
            .map(|tm| tm.tenant)
            .collect()
    }

    /// All memberships of a tenant
    pub fn members_of(&self, tenant_id: TenantId) -> DirectoryResult<Vec<Membership>> {
        let state = self.read();
        state.tenant(tenant_id)?;
        Ok(state
            .memberships
            .values()
            .filter(|m| m.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    // ==================
    // Users
    // ==================

    /// Transitional global-admin flag
    pub fn legacy_super_admin(&self, user: &UserId) -> bool {
        self.read()
            .users
            .get(user)
            .map(|u| u.legacy_super_admin)
            .unwrap_or(false)
    }

    pub fn set_legacy_super_admin(&self, user: &UserId, value: bool) -> DirectoryResult<()> {
        self.commit(|state| {
            state.ensure_user(user);
            if let Some(record) = state.users.get_mut(user) {
                record.legacy_super_admin = value;
            }
            Ok(())
        })
    }
}

impl Default for TenantDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn alice() -> UserId {
        UserId::new("alice")
    }

    #[test]
    fn test_tenant_crud() {
        let directory = TenantDirectory::new();
        let first = directory.create_tenant("Hoster", true).unwrap();
        let second = directory.create_tenant("Customer", false).unwrap();

        assert_eq!(first.id, TenantId(1));
        assert_eq!(second.id, TenantId(2));
        assert_eq!(directory.list_tenants().len(), 2);
        assert_eq!(directory.default_tenant().unwrap().id, first.id);
        assert!(matches!(
            directory.get_tenant(TenantId(99)),
            Err(DirectoryError::TenantNotFound(TenantId(99)))
        ));
    }

    #[test]
    fn test_set_hoster_moves_flag() {
        let directory = TenantDirectory::new();
        let a = directory.create_tenant("A", true).unwrap();
        let b = directory.create_tenant("B", false).unwrap();

        directory.set_hoster_tenant(a.id).unwrap();
        directory.set_hoster_tenant(b.id).unwrap();

        assert!(!directory.is_hoster_tenant(a.id).unwrap());
        assert!(directory.is_hoster_tenant(b.id).unwrap());
        assert_eq!(directory.hoster_tenant().unwrap().unwrap().id, b.id);
    }

    #[test]
    fn test_set_hoster_unknown_tenant_keeps_state() {
        let directory = TenantDirectory::new();
        let a = directory.create_tenant("A", true).unwrap();
        directory.set_hoster_tenant(a.id).unwrap();

        assert!(directory.set_hoster_tenant(TenantId(42)).is_err());
        assert_eq!(directory.hoster_tenant().unwrap().unwrap().id, a.id);
    }

    #[test]
    fn test_concurrent_set_hoster_keeps_single_flag() {
        let directory = Arc::new(TenantDirectory::new());
        let ids: Vec<TenantId> = (0..8)
            .map(|i| directory.create_tenant(&format!("t{}", i), i == 0).unwrap().id)
            .collect();

        let handles: Vec<_> = ids
            .iter()
            .cycle()
            .take(64)
            .map(|id| {
                let directory = directory.clone();
                let id = *id;
                thread::spawn(move || {
                    directory.set_hoster_tenant(id).unwrap();
                    let flagged = directory
                        .list_tenants()
                        .iter()
                        .filter(|t| t.is_hoster_tenant)
                        .count();
                    assert_eq!(flagged, 1);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(directory.hoster_tenant().unwrap().is_some());
    }

    #[test]
    fn test_ensure_hoster_uses_default_tenant() {
        let directory = TenantDirectory::new();
        directory.create_tenant("Other", false).unwrap();
        let default = directory.create_tenant("Default", true).unwrap();

        let hoster = directory.ensure_hoster_tenant().unwrap();
        assert_eq!(hoster.id, default.id);

        // Idempotent once designated
        let other = directory.create_tenant("Later default", true).unwrap();
        assert_eq!(directory.ensure_hoster_tenant().unwrap().id, default.id);
        assert!(!directory.is_hoster_tenant(other.id).unwrap());
    }

    #[test]
    fn test_ensure_hoster_without_default_fails() {
        let directory = TenantDirectory::new();
        directory.create_tenant("Other", false).unwrap();
        assert!(matches!(
            directory.ensure_hoster_tenant(),
            Err(DirectoryError::NoDefaultTenant)
        ));
    }

    #[test]
    fn test_assign_and_duplicate() {
        let directory = TenantDirectory::new();
        let t = directory.create_tenant("A", true).unwrap();

        directory.assign_user(&alice(), t.id, Role::Operator, false).unwrap();
        let dup = directory.assign_user(&alice(), t.id, Role::Admin, false);
        assert!(matches!(dup, Err(DirectoryError::MembershipExists { .. })));

        assert_eq!(directory.membership(&alice(), t.id).unwrap().role, Role::Operator);
        assert!(directory
            .assign_user(&alice(), TenantId(77), Role::User, false)
            .is_err());
    }

    #[test]
    fn test_single_default_membership_per_user() {
        let directory = TenantDirectory::new();
        let a = directory.create_tenant("A", true).unwrap();
        let b = directory.create_tenant("B", false).unwrap();
        let c = directory.create_tenant("C", false).unwrap();

        directory.assign_user(&alice(), a.id, Role::User, true).unwrap();
        directory.assign_user(&alice(), b.id, Role::User, true).unwrap();
        directory.assign_user(&alice(), c.id, Role::User, false).unwrap();
        directory.set_default_tenant(&alice(), c.id).unwrap();

        let defaults: Vec<_> = directory
            .tenants_for(&alice())
            .into_iter()
            .filter(|tm| tm.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].tenant.id, c.id);
        assert_eq!(directory.default_tenant_for(&alice()).unwrap().id, c.id);
    }

    #[test]
    fn test_default_tenant_falls_back_to_first_membership() {
        let directory = TenantDirectory::new();
        let a = directory.create_tenant("A", true).unwrap();
        let b = directory.create_tenant("B", false).unwrap();
        directory.assign_user(&alice(), b.id, Role::User, false).unwrap();
        directory.assign_user(&alice(), a.id, Role::User, false).unwrap();

        assert_eq!(directory.default_tenant_for(&alice()).unwrap().id, a.id);
        assert!(directory.default_tenant_for(&UserId::new("nobody")).is_none());
    }

    #[test]
    fn test_set_default_requires_membership() {
        let directory = TenantDirectory::new();
        let a = directory.create_tenant("A", true).unwrap();
        assert!(matches!(
            directory.set_default_tenant(&alice(), a.id),
            Err(DirectoryError::MembershipNotFound { .. })
        ));
    }

    #[test]
    fn test_update_and_remove() {
        let directory = TenantDirectory::new();
        let a = directory.create_tenant("A", true).unwrap();
        directory.assign_user(&alice(), a.id, Role::User, false).unwrap();

        directory.update_role(&alice(), a.id, Role::Admin).unwrap();
        assert_eq!(directory.tenants_where_admin(&alice()).len(), 1);
        assert_eq!(directory.members_of(a.id).unwrap().len(), 1);

        directory.remove_user(&alice(), a.id).unwrap();
        assert!(directory.membership(&alice(), a.id).is_none());
        assert!(directory.remove_user(&alice(), a.id).is_err());
    }

    #[test]
    fn test_legacy_flag() {
        let directory = TenantDirectory::new();
        assert!(!directory.legacy_super_admin(&alice()));
        directory.set_legacy_super_admin(&alice(), true).unwrap();
        assert!(directory.legacy_super_admin(&alice()));
    }

    #[test]
    fn test_persisted_directory_reopens() {
        let dir = TempDir::new().unwrap();
        {
            let directory = TenantDirectory::open(Some(dir.path())).unwrap();
            let t = directory.create_tenant("Hoster", true).unwrap();
            directory.set_hoster_tenant(t.id).unwrap();
            directory.assign_user(&alice(), t.id, Role::Admin, true).unwrap();
        }

        let reopened = TenantDirectory::open(Some(dir.path())).unwrap();
        let hoster = reopened.hoster_tenant().unwrap().unwrap();
        assert_eq!(reopened.membership(&alice(), hoster.id).unwrap().role, Role::Admin);

        let next = reopened.create_tenant("Next", false).unwrap();
        assert_eq!(next.id, TenantId(2));
    }
}
