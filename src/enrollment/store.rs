//! # Enrollment Token Store
//!
//! Tenant-scoped token storage with a value index for redemption.
//!
//! The value index is keyed by the SHA-256 digest of the token value, and the
//! candidate found through it is confirmed with a constant-time comparison.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::errors::{EnrollmentError, EnrollmentResult};
use super::token::{
    fingerprint, generate_token_value, token_digest, EnrollmentToken, NewEnrollmentToken,
    TokenId, TokenState,
};
use crate::persistence::SnapshotFile;
use crate::tenancy::{TenantDirectory, TenantId};

/// Snapshot file name inside the data directory
pub const TOKEN_SNAPSHOT: &str = "enrollment_tokens.json";

#[derive(Debug, Clone, Default)]
struct TokenTable {
    next_id: i64,
    tokens: BTreeMap<TokenId, EnrollmentToken>,
    by_digest: HashMap<[u8; 32], TokenId>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenSnapshot {
    next_id: i64,
    tokens: Vec<EnrollmentToken>,
}

impl From<&TokenTable> for TokenSnapshot {
    fn from(table: &TokenTable) -> Self {
        Self {
            next_id: table.next_id,
            tokens: table.tokens.values().cloned().collect(),
        }
    }
}

impl From<TokenSnapshot> for TokenTable {
    fn from(snapshot: TokenSnapshot) -> Self {
        let max_id = snapshot.tokens.iter().map(|t| t.id.0).max().unwrap_or(0);
        let mut table = TokenTable {
            next_id: snapshot.next_id.max(max_id),
            ..TokenTable::default()
        };
        for token in snapshot.tokens {
            table.by_digest.insert(token_digest(&token.token), token.id);
            table.tokens.insert(token.id, token);
        }
        table
    }
}

impl TokenTable {
    fn get_mut(&mut self, id: TokenId) -> EnrollmentResult<&mut EnrollmentToken> {
        self.tokens.get_mut(&id).ok_or(EnrollmentError::NotFound)
    }
}

/// Enrollment token store
#[derive(Debug)]
pub struct TokenStore {
    directory: Arc<TenantDirectory>,
    table: RwLock<TokenTable>,
    snapshot: Option<SnapshotFile>,
}

impl TokenStore {
    /// Create a memory-only store
    pub fn new(directory: Arc<TenantDirectory>) -> Self {
        Self {
            directory,
            table: RwLock::new(TokenTable::default()),
            snapshot: None,
        }
    }

    /// Open a store persisted under `data_dir`, or memory-only when `None`
    pub fn open(directory: Arc<TenantDirectory>, data_dir: Option<&Path>) -> EnrollmentResult<Self> {
        let Some(dir) = data_dir else {
            return Ok(Self::new(directory));
        };

        let snapshot = SnapshotFile::new(dir.join(TOKEN_SNAPSHOT));
        let table = snapshot
            .load::<TokenSnapshot>()?
            .map(TokenTable::from)
            .unwrap_or_default();

        Ok(Self {
            directory,
            table: RwLock::new(table),
            snapshot: Some(snapshot),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, TokenTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit<R>(&self, op: impl FnOnce(&mut TokenTable) -> EnrollmentResult<R>) -> EnrollmentResult<R> {
        let mut guard = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        let out = op(&mut next)?;
        if let Some(snapshot) = &self.snapshot {
            snapshot.store(&TokenSnapshot::from(&next))?;
        }
        *guard = next;
        Ok(out)
    }

    /// Issue a new token with a fresh random value
    pub fn create(&self, new: NewEnrollmentToken) -> EnrollmentResult<EnrollmentToken> {
        self.create_with_value(new, generate_token_value())
    }

    pub(crate) fn create_with_value(
        &self,
        new: NewEnrollmentToken,
        value: String,
    ) -> EnrollmentResult<EnrollmentToken> {
        if !self.directory.tenant_exists(new.tenant_id) {
            return Err(EnrollmentError::TenantNotFound(new.tenant_id));
        }

        let digest = token_digest(&value);
        let token = self.commit(|table| {
            if table.by_digest.contains_key(&digest) {
                tracing::error!(
                    token_fp = %fingerprint(&value),
                    tenant_id = %new.tenant_id,
                    "enrollment token value collision"
                );
                return Err(EnrollmentError::InvariantViolation(
                    "generated enrollment token value already exists".to_string(),
                ));
            }

            table.next_id += 1;
            let token = EnrollmentToken {
                id: TokenId(table.next_id),
                tenant_id: new.tenant_id,
                site_id: new.site_id,
                token: value.clone(),
                description: new.description,
                active: true,
                max_uses: new.max_uses,
                current_uses: 0,
                expires_at: new.expires_at,
                created_at: Utc::now(),
            };
            table.by_digest.insert(digest, token.id);
            table.tokens.insert(token.id, token.clone());
            Ok(token)
        })?;

        tracing::info!(
            token_id = %token.id,
            tenant_id = %token.tenant_id,
            token_fp = %token.fingerprint(),
            max_uses = token.max_uses,
            "enrollment token created"
        );
        Ok(token)
    }

    /// All tokens of a tenant, oldest first
    pub fn list(&self, tenant_id: TenantId) -> Vec<EnrollmentToken> {
        self.read()
            .tokens
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    pub fn get_by_id(&self, id: TokenId) -> EnrollmentResult<EnrollmentToken> {
        self.read()
            .tokens
            .get(&id)
            .cloned()
            .ok_or(EnrollmentError::NotFound)
    }

    /// Get a token only if it belongs to `tenant_id`
    pub fn get_for_tenant(&self, tenant_id: TenantId, id: TokenId) -> EnrollmentResult<EnrollmentToken> {
        self.get_by_id(id)
            .ok()
            .filter(|t| t.tenant_id == tenant_id)
            .ok_or(EnrollmentError::NotFound)
    }

    /// Look a token up by its value. Unknown values yield a bare `NotFound`.
    pub fn get_by_value(&self, value: &str) -> EnrollmentResult<EnrollmentToken> {
        let table = self.read();
        let candidate = table
            .by_digest
            .get(&token_digest(value))
            .and_then(|id| table.tokens.get(id));

        match candidate {
            Some(token) if bool::from(token.token.as_bytes().ct_eq(value.as_bytes())) => {
                Ok(token.clone())
            }
            _ => Err(EnrollmentError::NotFound),
        }
    }

    pub fn toggle(&self, id: TokenId, active: bool) -> EnrollmentResult<EnrollmentToken> {
        let token = self.commit(|table| {
            let token = table.get_mut(id)?;
            token.active = active;
            Ok(token.clone())
        })?;
        tracing::info!(token_id = %id, tenant_id = %token.tenant_id, active, "enrollment token toggled");
        Ok(token)
    }

    pub fn delete(&self, id: TokenId) -> EnrollmentResult<()> {
        let token = self.commit(|table| {
            let token = table.tokens.remove(&id).ok_or(EnrollmentError::NotFound)?;
            table.by_digest.remove(&token_digest(&token.token));
            Ok(token)
        })?;
        tracing::info!(token_id = %id, tenant_id = %token.tenant_id, "enrollment token deleted");
        Ok(())
    }

    /// Find a token by value and require it to be redeemable at `now`
    pub fn validate(&self, value: &str, now: DateTime<Utc>) -> EnrollmentResult<EnrollmentToken> {
        let token = self.get_by_value(value).inspect_err(|_| {
            tracing::warn!(token_fp = %fingerprint(value), "redemption of unknown enrollment token");
        })?;

        match token.state_at(now) {
            TokenState::Valid => Ok(token),
            state => {
                tracing::warn!(
                    token_id = %token.id,
                    tenant_id = %token.tenant_id,
                    token_fp = %token.fingerprint(),
                    reason = state.reason(),
                    current_uses = token.current_uses,
                    max_uses = token.max_uses,
                    "enrollment token rejected"
                );
                Err(EnrollmentError::Invalid(state))
            }
        }
    }

    /// Count one successful redemption.
    ///
    /// With `exact` the increment only happens while the token is still
    /// redeemable; otherwise `max_uses` is a soft ceiling under concurrent
    /// redemptions.
    pub fn record_redemption(&self, id: TokenId, exact: bool) -> EnrollmentResult<u32> {
        self.commit(|table| {
            let token = table.get_mut(id)?;
            if exact {
                match token.state_at(Utc::now()) {
                    TokenState::Valid => {}
                    state => return Err(EnrollmentError::Invalid(state)),
                }
            }
            token.current_uses = token.current_uses.saturating_add(1);
            Ok(token.current_uses)
        })
    }

    /// Remove expired and exhausted tokens, returning how many were removed
    pub fn purge_inert(&self, now: DateTime<Utc>) -> EnrollmentResult<usize> {
        let removed = self.commit(|table| {
            let inert: Vec<EnrollmentToken> = table
                .tokens
                .values()
                .filter(|t| t.is_inert(now))
                .cloned()
                .collect();
            for token in &inert {
                table.tokens.remove(&token.id);
                table.by_digest.remove(&token_digest(&token.token));
            }
            Ok(inert.len())
        })?;
        tracing::info!(removed, "purged inert enrollment tokens");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn setup() -> (Arc<TenantDirectory>, TokenStore, TenantId, TenantId) {
        let directory = Arc::new(TenantDirectory::new());
        let a = directory.create_tenant("A", true).unwrap().id;
        let b = directory.create_tenant("B", false).unwrap().id;
        let store = TokenStore::new(directory.clone());
        (directory, store, a, b)
    }

    fn new_token(tenant_id: TenantId, max_uses: u32) -> NewEnrollmentToken {
        NewEnrollmentToken {
            tenant_id,
            site_id: None,
            description: "rollout".to_string(),
            max_uses,
            expires_at: None,
        }
    }

    #[test]
    fn test_create_list_get() {
        let (_, store, a, b) = setup();
        let t1 = store.create(new_token(a, 0)).unwrap();
        store.create(new_token(a, 5)).unwrap();
        store.create(new_token(b, 0)).unwrap();

        assert!(t1.active);
        assert_eq!(t1.current_uses, 0);
        assert_eq!(store.list(a).len(), 2);
        assert_eq!(store.list(b).len(), 1);
        assert_eq!(store.get_by_id(t1.id).unwrap(), t1);
        assert_eq!(store.get_by_value(&t1.token).unwrap().id, t1.id);
    }

    #[test]
    fn test_create_for_unknown_tenant() {
        let (_, store, _, _) = setup();
        assert!(matches!(
            store.create(new_token(TenantId(99), 0)),
            Err(EnrollmentError::TenantNotFound(TenantId(99)))
        ));
    }

    #[test]
    fn test_value_collision_is_fatal() {
        let (_, store, a, b) = setup();
        store
            .create_with_value(new_token(a, 0), "fixed-value".to_string())
            .unwrap();
        let err = store
            .create_with_value(new_token(b, 0), "fixed-value".to_string())
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::InvariantViolation(_)));
        assert!(store.list(b).is_empty());
    }

    #[test]
    fn test_get_for_tenant_hides_other_tenants() {
        let (_, store, a, b) = setup();
        let t = store.create(new_token(a, 0)).unwrap();
        assert!(store.get_for_tenant(a, t.id).is_ok());
        assert!(matches!(
            store.get_for_tenant(b, t.id),
            Err(EnrollmentError::NotFound)
        ));
    }

    #[test]
    fn test_unknown_value_is_constant_shape() {
        let (_, store, a, _) = setup();
        let t = store.create(new_token(a, 0)).unwrap();

        let unknown = store.get_by_value("never-issued").unwrap_err();
        let near_miss = store.get_by_value(&format!("{}x", t.token)).unwrap_err();
        assert!(matches!(unknown, EnrollmentError::NotFound));
        assert_eq!(unknown.to_string(), near_miss.to_string());
        assert_eq!(unknown.to_string(), "invalid token");
    }

    #[test]
    fn test_toggle_and_delete() {
        let (_, store, a, _) = setup();
        let t = store.create(new_token(a, 0)).unwrap();

        assert!(!store.toggle(t.id, false).unwrap().active);
        assert!(matches!(
            store.validate(&t.token, Utc::now()),
            Err(EnrollmentError::Invalid(TokenState::Inactive))
        ));
        assert!(store.toggle(t.id, true).unwrap().active);

        store.delete(t.id).unwrap();
        assert!(matches!(store.get_by_value(&t.token), Err(EnrollmentError::NotFound)));
        assert!(matches!(store.delete(t.id), Err(EnrollmentError::NotFound)));
    }

    #[test]
    fn test_sequential_redemptions_respect_max_uses() {
        let (_, store, a, _) = setup();
        let t = store.create(new_token(a, 3)).unwrap();
        let now = Utc::now();

        for expected in 1..=3 {
            let valid = store.validate(&t.token, now).unwrap();
            assert_eq!(store.record_redemption(valid.id, false).unwrap(), expected);
        }
        assert!(matches!(
            store.validate(&t.token, now),
            Err(EnrollmentError::Invalid(TokenState::Exhausted))
        ));
    }

    #[test]
    fn test_exact_limit_refuses_overshoot() {
        let (_, store, a, _) = setup();
        let t = store.create(new_token(a, 1)).unwrap();

        // Two racing redemptions both validated before either recorded
        let first = store.validate(&t.token, Utc::now()).unwrap();
        let second = store.validate(&t.token, Utc::now()).unwrap();

        assert_eq!(store.record_redemption(first.id, true).unwrap(), 1);
        assert!(matches!(
            store.record_redemption(second.id, true),
            Err(EnrollmentError::Invalid(TokenState::Exhausted))
        ));
        // Soft ceiling tolerates the overshoot
        assert_eq!(store.record_redemption(second.id, false).unwrap(), 2);
    }

    #[test]
    fn test_exact_limit_rechecks_deactivation() {
        let (_, store, a, _) = setup();
        let t = store.create(new_token(a, 5)).unwrap();

        // Deactivated between validation and the increment
        let validated = store.validate(&t.token, Utc::now()).unwrap();
        store.toggle(t.id, false).unwrap();

        assert!(matches!(
            store.record_redemption(validated.id, true),
            Err(EnrollmentError::Invalid(TokenState::Inactive))
        ));
        assert_eq!(store.get_by_id(t.id).unwrap().current_uses, 0);
    }

    #[test]
    fn test_expired_token_rejected() {
        let (_, store, a, _) = setup();
        let mut new = new_token(a, 0);
        new.expires_at = Some(Utc::now() - Duration::days(1));
        let t = store.create(new).unwrap();
        assert!(matches!(
            store.validate(&t.token, Utc::now()),
            Err(EnrollmentError::Invalid(TokenState::Expired))
        ));
    }

    #[test]
    fn test_purge_inert() {
        let (_, store, a, _) = setup();
        let now = Utc::now();
        let live = store.create(new_token(a, 0)).unwrap();
        let exhausted = store.create(new_token(a, 1)).unwrap();
        store.record_redemption(exhausted.id, false).unwrap();
        let mut expired = new_token(a, 0);
        expired.expires_at = Some(now - Duration::hours(1));
        let expired = store.create(expired).unwrap();

        assert_eq!(store.purge_inert(now).unwrap(), 2);
        assert!(store.get_by_id(live.id).is_ok());
        assert!(store.get_by_value(&expired.token).is_err());
    }

    #[test]
    fn test_persisted_store_reopens() {
        let dir = TempDir::new().unwrap();
        let directory = Arc::new(TenantDirectory::open(Some(dir.path())).unwrap());
        let tenant = directory.create_tenant("A", true).unwrap().id;

        let value = {
            let store = TokenStore::open(directory.clone(), Some(dir.path())).unwrap();
            let t = store.create(new_token(tenant, 2)).unwrap();
            store.record_redemption(t.id, false).unwrap();
            t.token
        };

        let reopened = TokenStore::open(directory, Some(dir.path())).unwrap();
        let t = reopened.get_by_value(&value).unwrap();
        assert_eq!(t.current_uses, 1);
        assert_eq!(reopened.create(new_token(tenant, 0)).unwrap().id, TokenId(2));
    }
}
