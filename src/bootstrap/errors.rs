//! # Bootstrap Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Bootstrap generation errors. All of them are server faults.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Trust anchor could not be read. Needs an operator, not a retry.
    #[error("Secret unavailable at {}: {source}", .path.display())]
    SecretUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to assemble config bundle: {0}")]
    Archive(#[from] io::Error),
}

impl BootstrapError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        500
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            BootstrapError::SecretUnavailable { .. } => "SECRET_UNAVAILABLE",
            BootstrapError::Archive(_) => "ARCHIVE_ERROR",
        }
    }

    /// Message safe to show outside the deployment
    pub fn public_message(&self) -> &'static str {
        match self {
            BootstrapError::SecretUnavailable { .. } => "could not read CA certificate",
            BootstrapError::Archive(_) => "could not create config bundle",
        }
    }
}
