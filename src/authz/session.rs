//! # Console Sessions
//!
//! HS256 session tokens identifying the console user.
//!
//! The token travels in the `console_session` cookie or an
//! `Authorization: Bearer` header. Its `sub` claim is the user identity.

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tenancy::UserId;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "console_session";

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User identity
    pub sub: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

#[derive(Debug, Error)]
#[error("Failed to issue session token: {0}")]
pub struct SessionError(#[from] jsonwebtoken::errors::Error);

/// Signing and verification keys for session tokens
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Mint a session token for `user`
    pub fn issue(&self, user: &UserId, ttl: Duration) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verify a token. Forged, expired and malformed tokens yield `None`.
    pub fn verify(&self, token: &str) -> Option<UserId> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation).ok()?;
        if data.claims.sub.is_empty() {
            return None;
        }
        Some(UserId(data.claims.sub))
    }

    /// Resolve the caller's identity from request headers
    pub fn identify(&self, headers: &HeaderMap) -> Option<UserId> {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));

        bearer
            .or_else(|| session_cookie(headers))
            .and_then(|token| self.verify(token.trim()))
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}
