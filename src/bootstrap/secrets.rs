//! Server-side secrets consumed by bootstrap generation

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::BootstrapError;

/// Source of the CA certificate handed to enrolling agents
pub trait SecretsReader: Send + Sync {
    fn ca_certificate(&self) -> Result<Vec<u8>, BootstrapError>;
}

/// Reads the CA certificate from disk on every call, so a replaced
/// certificate is picked up without a restart.
#[derive(Debug, Clone)]
pub struct FileSecretsReader {
    ca_cert_path: PathBuf,
}

impl FileSecretsReader {
    pub fn new(ca_cert_path: impl Into<PathBuf>) -> Self {
        Self {
            ca_cert_path: ca_cert_path.into(),
        }
    }

    pub fn ca_cert_path(&self) -> &Path {
        &self.ca_cert_path
    }
}

impl SecretsReader for FileSecretsReader {
    fn ca_certificate(&self) -> Result<Vec<u8>, BootstrapError> {
        fs::read(&self.ca_cert_path).map_err(|source| {
            tracing::error!(
                path = %self.ca_cert_path.display(),
                error = %source,
                "could not read CA certificate"
            );
            BootstrapError::SecretUnavailable {
                path: self.ca_cert_path.clone(),
                source,
            }
        })
    }
}

/// In-memory certificate, for embedding and tests
#[derive(Debug, Clone)]
pub struct StaticSecrets {
    ca_certificate: Vec<u8>,
}

impl StaticSecrets {
    pub fn new(ca_certificate: Vec<u8>) -> Self {
        Self { ca_certificate }
    }
}

impl SecretsReader for StaticSecrets {
    fn ca_certificate(&self) -> Result<Vec<u8>, BootstrapError> {
        Ok(self.ca_certificate.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_reader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ca.cer");
        fs::write(&path, b"-----BEGIN CERTIFICATE-----").unwrap();

        let reader = FileSecretsReader::new(&path);
        assert_eq!(reader.ca_certificate().unwrap(), b"-----BEGIN CERTIFICATE-----");
    }

    #[test]
    fn test_missing_file_is_secret_unavailable() {
        let dir = TempDir::new().unwrap();
        let reader = FileSecretsReader::new(dir.path().join("absent.cer"));
        let err = reader.ca_certificate().unwrap_err();
        assert!(matches!(err, BootstrapError::SecretUnavailable { .. }));
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "could not read CA certificate");
    }
}
