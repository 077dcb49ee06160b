//! Startup checks for the console configuration.
//!
//! Problems are accumulated rather than returned one at a time, so a broken
//! file can be fixed in a single edit.

use std::path::Path;

use thiserror::Error;
use url::Url;

/// One rejected configuration field
#[derive(Debug, Error)]
#[error("'{field}': {message} (got {value})")]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub message: String,
}

pub type ValidationResult = Result<(), Vec<ConfigValidationError>>;

/// Chainable field checks
#[derive(Debug, Default)]
pub struct ConfigValidator {
    problems: Vec<ConfigValidationError>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn reject(&mut self, field: &str, value: impl std::fmt::Display, message: impl Into<String>) {
        self.problems.push(ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            message: message.into(),
        });
    }

    pub fn validate_port(&mut self, field: &str, port: u16) -> &mut Self {
        if port == 0 {
            self.reject(field, port, "port 0 cannot be bound");
        }
        self
    }

    pub fn validate_positive(&mut self, field: &str, value: i64) -> &mut Self {
        if value < 1 {
            self.reject(field, value, "must be at least 1");
        }
        self
    }

    pub fn validate_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.reject(field, value, "must not be blank");
        }
        self
    }

    /// Length check that never echoes the secret itself
    pub fn validate_secret(&mut self, field: &str, secret: &str, min_len: usize) -> &mut Self {
        if secret.len() < min_len {
            self.reject(
                field,
                format!("<{} bytes>", secret.len()),
                format!("needs at least {} bytes", min_len),
            );
        }
        self
    }

    pub fn validate_http_url(&mut self, field: &str, value: &str) -> &mut Self {
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => self.reject(field, value, "expected an http:// or https:// URL"),
        }
        self
    }

    /// Any scheme, but a host is required
    pub fn validate_service_url(&mut self, field: &str, value: &str) -> &mut Self {
        match Url::parse(value) {
            Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => {}
            Ok(_) => self.reject(field, value, "URL has no host"),
            Err(e) => self.reject(field, value, format!("not a URL: {}", e)),
        }
        self
    }

    /// Values pasted into quoted sh and PowerShell install commands
    pub fn validate_shell_safe(&mut self, field: &str, value: &str) -> &mut Self {
        let unsafe_char = |c: char| matches!(c, '\'' | '"' | '`' | '$' | '\\') || c.is_whitespace();
        if value.chars().any(unsafe_char) {
            self.reject(field, value, "quotes, '$', '\\' and whitespace are not allowed");
        }
        self
    }

    pub fn validate_route_path(&mut self, field: &str, value: &str) -> &mut Self {
        if !value.starts_with('/') {
            self.reject(field, value, "must be an absolute path starting with '/'");
        }
        self
    }

    /// Missing directories are fine, they are created on first write
    pub fn validate_is_directory(&mut self, field: &str, path: &Path) -> &mut Self {
        if path.exists() && !path.is_dir() {
            self.reject(field, path.display(), "exists but is not a directory");
        }
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.problems.is_empty()
    }

    pub fn finish(self) -> ValidationResult {
        if self.problems.is_empty() {
            Ok(())
        } else {
            Err(self.problems)
        }
    }
}

/// One problem per line, for the startup error message
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    let lines: Vec<String> = errors.iter().map(|e| format!("  * {}", e)).collect();
    lines.join("\n")
}
