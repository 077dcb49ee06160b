//! # Bootstrap Module
//!
//! Everything an agent needs to join the fleet, derived from a validated
//! enrollment token: the configuration document, the bundle carrying it
//! with the CA certificate, and the installer that fetches both.
//!
//! Generation is pure. Secrets are read by the caller through a
//! [`SecretsReader`] and passed in.

pub mod agent_config;
pub mod broker;
pub mod bundle;
pub mod errors;
pub mod installer;
pub mod platform;
pub mod secrets;

pub use agent_config::{AgentConfig, AGENT_CONFIG_FILE, CA_CERT_ENTRY};
pub use broker::derive_external_broker_url;
pub use bundle::{ConfigBundle, BUNDLE_CONTENT_TYPE};
pub use errors::BootstrapError;
pub use installer::{InstallPlan, InstallerScript};
pub use platform::Platform;
pub use secrets::{FileSecretsReader, SecretsReader, StaticSecrets};

use crate::enrollment::EnrollmentToken;

/// Bootstrap generator
#[derive(Debug, Clone)]
pub struct BootstrapGenerator {
    external_broker_url: String,
    console_url: String,
    release_base_url: String,
}

impl BootstrapGenerator {
    pub fn new(
        internal_broker_url: &str,
        public_domain: &str,
        console_url: &str,
        release_base_url: &str,
    ) -> Self {
        Self {
            external_broker_url: derive_external_broker_url(internal_broker_url, public_domain),
            console_url: console_url.to_string(),
            release_base_url: release_base_url.to_string(),
        }
    }

    /// Broker address handed to agents
    pub fn external_broker_url(&self) -> &str {
        &self.external_broker_url
    }

    pub fn config_document(&self, token: &EnrollmentToken, platform: Platform) -> String {
        AgentConfig {
            token,
            broker_url: &self.external_broker_url,
            platform,
        }
        .render()
    }

    pub fn bundle(
        &self,
        token: &EnrollmentToken,
        platform: Platform,
        ca_certificate: &[u8],
    ) -> Result<ConfigBundle, BootstrapError> {
        let document = self.config_document(token, platform);
        ConfigBundle::pack(&token.token, &document, ca_certificate)
    }

    pub fn install_plan(&self, token: &EnrollmentToken, platform: Platform) -> InstallPlan {
        InstallPlan::new(platform, &self.console_url, &self.release_base_url, &token.token)
    }

    pub fn install_command(&self, token: &EnrollmentToken, platform: Platform) -> String {
        self.install_plan(token, platform).one_liner()
    }

    pub fn installer_script(&self, token: &EnrollmentToken, platform: Platform) -> InstallerScript {
        self.install_plan(token, platform).script()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::TokenId;
    use crate::tenancy::TenantId;
    use chrono::Utc;

    fn token() -> EnrollmentToken {
        EnrollmentToken {
            id: TokenId(4),
            tenant_id: TenantId(7),
            site_id: None,
            token: "AbCdEfGh-value".to_string(),
            description: String::new(),
            active: true,
            max_uses: 1,
            current_uses: 0,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    fn generator() -> BootstrapGenerator {
        BootstrapGenerator::new(
            "tls://nats:4433",
            "fleet.example.com",
            "https://fleet.example.com",
            "https://releases.example.com",
        )
    }

    #[test]
    fn test_document_uses_external_broker() {
        let doc = generator().config_document(&token(), Platform::Linux);
        assert!(doc.contains("Servers=tls://fleet.example.com:4433\n"));
        assert!(doc.contains("EnrollmentToken=AbCdEfGh-value\n"));
        assert!(doc.contains("TenantID=7\n"));
    }

    #[test]
    fn test_stable_for_identical_inputs() {
        let token = token();
        for platform in Platform::ALL {
            let a = generator().bundle(&token, platform, b"CA").unwrap();
            let b = generator().bundle(&token, platform, b"CA").unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_install_command_and_script() {
        let g = generator();
        let token = token();
        assert!(g
            .install_command(&token, Platform::Linux)
            .contains("/api/enroll/AbCdEfGh-value/config?platform=linux"));
        assert_eq!(g.installer_script(&token, Platform::Windows).file_name, "install.ps1");
    }
}
