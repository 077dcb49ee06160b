//! # Token Redemption
//!
//! The unauthenticated path an agent takes to exchange a token value for its
//! bootstrap bundle. Usage is only counted once the bundle is fully assembled,
//! so a failure while reading secrets or packing the archive leaves the
//! agent's retry headroom untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::errors::RedemptionError;
use super::store::TokenStore;
use super::token::EnrollmentToken;
use crate::bootstrap::{BootstrapGenerator, ConfigBundle, Platform, SecretsReader};

/// Outcome of a successful redemption
#[derive(Debug, Clone)]
pub struct Redemption {
    pub token: EnrollmentToken,
    pub bundle: ConfigBundle,
}

/// Redemption service
pub struct RedemptionService {
    store: Arc<TokenStore>,
    generator: Arc<BootstrapGenerator>,
    secrets: Arc<dyn SecretsReader>,
    exact_usage_limit: bool,
}

impl RedemptionService {
    pub fn new(
        store: Arc<TokenStore>,
        generator: Arc<BootstrapGenerator>,
        secrets: Arc<dyn SecretsReader>,
        exact_usage_limit: bool,
    ) -> Self {
        Self {
            store,
            generator,
            secrets,
            exact_usage_limit,
        }
    }

    /// Redeem `value` now
    pub fn redeem(&self, value: &str, platform: Platform) -> Result<Redemption, RedemptionError> {
        self.redeem_at(value, platform, Utc::now())
    }

    /// Redeem `value` with validity evaluated at `now`
    pub fn redeem_at(
        &self,
        value: &str,
        platform: Platform,
        now: DateTime<Utc>,
    ) -> Result<Redemption, RedemptionError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RedemptionError::MissingToken);
        }

        let mut token = self.store.validate(value, now)?;
        let ca_certificate = self.secrets.ca_certificate()?;
        let bundle = self.generator.bundle(&token, platform, &ca_certificate)?;

        token.current_uses = self.store.record_redemption(token.id, self.exact_usage_limit)?;

        tracing::info!(
            token_id = %token.id,
            tenant_id = %token.tenant_id,
            token_fp = %token.fingerprint(),
            platform = platform.as_str(),
            current_uses = token.current_uses,
            max_uses = token.max_uses,
            "enrollment token redeemed"
        );

        Ok(Redemption { token, bundle })
    }
}

impl std::fmt::Debug for RedemptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedemptionService")
            .field("exact_usage_limit", &self.exact_usage_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{BootstrapError, StaticSecrets};
    use crate::enrollment::{EnrollmentError, NewEnrollmentToken, TokenState};
    use crate::tenancy::{TenantDirectory, TenantId};

    struct BrokenSecrets;

    impl SecretsReader for BrokenSecrets {
        fn ca_certificate(&self) -> Result<Vec<u8>, BootstrapError> {
            Err(BootstrapError::SecretUnavailable {
                path: "missing/ca.cer".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    fn setup(secrets: Arc<dyn SecretsReader>) -> (Arc<TokenStore>, RedemptionService, TenantId) {
        let directory = Arc::new(TenantDirectory::new());
        let tenant = directory.create_tenant("A", true).unwrap().id;
        let store = Arc::new(TokenStore::new(directory));
        let generator = Arc::new(BootstrapGenerator::new(
            "tls://nats:4433",
            "fleet.example.com",
            "https://fleet.example.com",
            "https://releases.example.com/agent/latest",
        ));
        let service = RedemptionService::new(store.clone(), generator, secrets, false);
        (store, service, tenant)
    }

    fn issue(store: &TokenStore, tenant: TenantId, max_uses: u32) -> EnrollmentToken {
        store
            .create(NewEnrollmentToken {
                tenant_id: tenant,
                site_id: None,
                description: "rollout".to_string(),
                max_uses,
                expires_at: None,
            })
            .unwrap()
    }

    #[test]
    fn test_redeem_counts_usage() {
        let (store, service, tenant) = setup(Arc::new(StaticSecrets::new(b"CA".to_vec())));
        let token = issue(&store, tenant, 2);

        let redemption = service.redeem(&token.token, Platform::Linux).unwrap();
        assert_eq!(redemption.token.current_uses, 1);
        assert!(redemption.bundle.file_name.ends_with(".tar.gz"));
        assert_eq!(store.get_by_id(token.id).unwrap().current_uses, 1);
    }

    #[test]
    fn test_missing_and_unknown_token() {
        let (_, service, _) = setup(Arc::new(StaticSecrets::new(b"CA".to_vec())));
        assert!(matches!(
            service.redeem("  ", Platform::Linux),
            Err(RedemptionError::MissingToken)
        ));
        assert!(matches!(
            service.redeem("nope", Platform::Linux),
            Err(RedemptionError::Token(EnrollmentError::NotFound))
        ));
    }

    #[test]
    fn test_exhausted_after_limit() {
        let (store, service, tenant) = setup(Arc::new(StaticSecrets::new(b"CA".to_vec())));
        let token = issue(&store, tenant, 1);

        service.redeem(&token.token, Platform::Windows).unwrap();
        let err = service.redeem(&token.token, Platform::Windows).unwrap_err();
        assert!(matches!(
            err,
            RedemptionError::Token(EnrollmentError::Invalid(TokenState::Exhausted))
        ));
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_secret_failure_does_not_consume_usage() {
        let (store, service, tenant) = setup(Arc::new(BrokenSecrets));
        let token = issue(&store, tenant, 1);

        let err = service.redeem(&token.token, Platform::Linux).unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(store.get_by_id(token.id).unwrap().current_uses, 0);
    }
}
