//! Shared handler state

use std::sync::Arc;

use thiserror::Error;

use crate::authz::{AuthorizationResolver, SessionKeys};
use crate::bootstrap::{BootstrapGenerator, FileSecretsReader, SecretsReader};
use crate::config::ConsoleConfig;
use crate::enrollment::{EnrollmentError, RedemptionService, TokenStore};
use crate::tenancy::{DirectoryError, TenantDirectory};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to open tenant directory: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Failed to open enrollment token store: {0}")]
    Enrollment(#[from] EnrollmentError),
}

/// Everything handlers and gates reach. Cheap to clone.
#[derive(Clone)]
pub struct ConsoleState {
    pub directory: Arc<TenantDirectory>,
    pub resolver: Arc<AuthorizationResolver>,
    pub tokens: Arc<TokenStore>,
    pub generator: Arc<BootstrapGenerator>,
    pub secrets: Arc<dyn SecretsReader>,
    pub redemption: Arc<RedemptionService>,
    pub sessions: Arc<SessionKeys>,
    pub login_path: Arc<str>,
}

impl ConsoleState {
    /// Open the stores named by `config`
    pub fn from_config(config: &ConsoleConfig) -> Result<Self, StateError> {
        let data_dir = config.data_dir.as_deref();
        let directory = Arc::new(TenantDirectory::open(data_dir)?);
        let tokens = Arc::new(TokenStore::open(directory.clone(), data_dir)?);
        let generator = BootstrapGenerator::new(
            &config.broker_url,
            &config.public_domain,
            &config.console_url(),
            &config.agent_release_base_url,
        );
        tracing::info!(
            broker_url = generator.external_broker_url(),
            ca_cert_path = %config.ca_cert_path.display(),
            "bootstrap generator ready"
        );

        Ok(Self::assemble(
            directory,
            tokens,
            generator,
            Arc::new(FileSecretsReader::new(&config.ca_cert_path)),
            SessionKeys::new(config.session_secret.as_bytes()),
            &config.login_path,
            config.enrollment.exact_usage_limit,
        ))
    }

    /// Wire already-open components together
    pub fn assemble(
        directory: Arc<TenantDirectory>,
        tokens: Arc<TokenStore>,
        generator: BootstrapGenerator,
        secrets: Arc<dyn SecretsReader>,
        sessions: SessionKeys,
        login_path: &str,
        exact_usage_limit: bool,
    ) -> Self {
        let generator = Arc::new(generator);
        let redemption = Arc::new(RedemptionService::new(
            tokens.clone(),
            generator.clone(),
            secrets.clone(),
            exact_usage_limit,
        ));
        Self {
            resolver: Arc::new(AuthorizationResolver::new(directory.clone())),
            directory,
            tokens,
            generator,
            secrets,
            redemption,
            sessions: Arc::new(sessions),
            login_path: Arc::from(login_path),
        }
    }
}
