//! # Console Configuration
//!
//! JSON configuration file with every field defaulted, validated once at
//! startup through [`ConfigValidator`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config_validator::{format_validation_errors, ConfigValidationError, ConfigValidator};

/// Configuration file used when none is given
pub const DEFAULT_CONFIG_PATH: &str = "./fleet-console.json";

/// Minimum HMAC key length for session tokens
pub const MIN_SESSION_SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration:\n{}", format_validation_errors(.0))]
    Invalid(Vec<ConfigValidationError>),
}

/// Enrollment settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentConfig {
    /// Refuse redemptions past `max_uses` even under concurrent redemption
    #[serde(default)]
    pub exact_usage_limit: bool,
}

/// Console configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory of the JSON stores. Memory-only when absent.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// CA certificate handed to enrolling agents
    #[serde(default = "default_ca_cert_path")]
    pub ca_cert_path: PathBuf,

    /// Broker URL as the console reaches it internally
    #[serde(default = "default_broker_url")]
    pub broker_url: String,

    /// Domain agents use to reach this deployment
    #[serde(default = "default_public_domain")]
    pub public_domain: String,

    /// Base URL in install commands. Defaults to `https://<public_domain>`.
    #[serde(default)]
    pub console_url: Option<String>,

    #[serde(default = "default_agent_release_base_url")]
    pub agent_release_base_url: String,

    #[serde(default)]
    pub session_secret: String,

    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    /// Where unauthenticated browsers are sent
    #[serde(default = "default_login_path")]
    pub login_path: String,

    #[serde(default)]
    pub enrollment: EnrollmentConfig,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1323
}

fn default_ca_cert_path() -> PathBuf {
    PathBuf::from("certificates/ca.cer")
}

fn default_broker_url() -> String {
    "tls://nats:4433".to_string()
}

fn default_public_domain() -> String {
    "localhost".to_string()
}

fn default_agent_release_base_url() -> String {
    "https://downloads.fleet-agent.dev/releases/latest".to_string()
}

fn default_session_ttl_hours() -> i64 {
    12
}

fn default_login_path() -> String {
    "/login".to_string()
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            data_dir: None,
            ca_cert_path: default_ca_cert_path(),
            broker_url: default_broker_url(),
            public_domain: default_public_domain(),
            console_url: None,
            agent_release_base_url: default_agent_release_base_url(),
            session_secret: String::new(),
            session_ttl_hours: default_session_ttl_hours(),
            login_path: default_login_path(),
            enrollment: EnrollmentConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Defaults plus a freshly generated session secret
    pub fn generated() -> Self {
        let mut secret = [0u8; 48];
        OsRng.fill_bytes(&mut secret);
        Self {
            session_secret: URL_SAFE_NO_PAD.encode(secret),
            ..Self::default()
        }
    }

    /// Load and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut v = ConfigValidator::new();
        v.validate_port("port", self.port)
            .validate_non_empty("bind_address", &self.bind_address)
            .validate_non_empty("ca_cert_path", &self.ca_cert_path.to_string_lossy())
            .validate_service_url("broker_url", &self.broker_url)
            .validate_non_empty("public_domain", &self.public_domain)
            .validate_shell_safe("public_domain", &self.public_domain)
            .validate_http_url("agent_release_base_url", &self.agent_release_base_url)
            .validate_shell_safe("agent_release_base_url", &self.agent_release_base_url)
            .validate_secret("session_secret", &self.session_secret, MIN_SESSION_SECRET_BYTES)
            .validate_positive("session_ttl_hours", self.session_ttl_hours)
            .validate_route_path("login_path", &self.login_path);

        if let Some(console_url) = &self.console_url {
            v.validate_http_url("console_url", console_url)
                .validate_shell_safe("console_url", console_url);
        }
        if let Some(data_dir) = &self.data_dir {
            v.validate_is_directory("data_dir", data_dir);
        }
        v.finish().map_err(ConfigError::Invalid)
    }

    /// Base URL agents fetch their bundle from
    pub fn console_url(&self) -> String {
        match &self.console_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", self.public_domain.trim()),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: ConsoleConfig =
            serde_json::from_str(r#"{"public_domain": "fleet.example.com"}"#).unwrap();
        assert_eq!(config.port, 1323);
        assert_eq!(config.broker_url, "tls://nats:4433");
        assert_eq!(config.login_path, "/login");
        assert!(!config.enrollment.exact_usage_limit);
        assert_eq!(config.console_url(), "https://fleet.example.com");
    }

    #[test]
    fn test_default_requires_secret() {
        assert!(matches!(
            ConsoleConfig::default().validate(),
            Err(ConfigError::Invalid(errors)) if errors.len() == 1
        ));
        assert!(ConsoleConfig::generated().validate().is_ok());
    }

    #[test]
    fn test_collects_every_problem() {
        let config = ConsoleConfig {
            port: 0,
            public_domain: String::new(),
            login_path: "login".to_string(),
            ..ConsoleConfig::generated()
        };
        match config.validate() {
            Err(ConfigError::Invalid(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("fleet-console.json");
        let config = ConsoleConfig {
            console_url: Some("https://console.example.com/".to_string()),
            ..ConsoleConfig::generated()
        };
        config.save(&path).unwrap();

        let loaded = ConsoleConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.console_url(), "https://console.example.com");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ConsoleConfig::load(&dir.path().join("nope.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
