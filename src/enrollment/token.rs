//! # Enrollment Tokens
//!
//! Bearer credentials letting an agent join a tenant (and optionally a site)
//! without prior credentials.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::tenancy::{SiteId, TenantId};

/// Random bytes behind every token value
const TOKEN_ENTROPY_BYTES: usize = 32;

/// Date format accepted for `expires_at` in admin forms
pub const EXPIRY_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub i64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of evaluating a found token at a point in time.
///
/// Evaluated fresh on every redemption attempt; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Valid,
    Inactive,
    Expired,
    Exhausted,
}

impl TokenState {
    /// Terse reason shown to the redeeming agent
    pub fn reason(&self) -> &'static str {
        match self {
            TokenState::Valid => "token is valid",
            TokenState::Inactive => "token is inactive",
            TokenState::Expired => "token has expired",
            TokenState::Exhausted => "token usage limit reached",
        }
    }
}

/// Enrollment token entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentToken {
    pub id: TokenId,
    pub tenant_id: TenantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<SiteId>,
    /// Opaque bearer value
    pub token: String,
    pub description: String,
    pub active: bool,
    /// 0 means unlimited
    pub max_uses: u32,
    /// Only ever incremented, by redemption
    pub current_uses: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EnrollmentToken {
    /// Evaluate the redemption state at `now`.
    ///
    /// Expiry wins over every other condition, then the active flag, then
    /// the usage ceiling.
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.expires_at.is_some_and(|expires_at| expires_at <= now) {
            TokenState::Expired
        } else if !self.active {
            TokenState::Inactive
        } else if self.is_exhausted() {
            TokenState::Exhausted
        } else {
            TokenState::Valid
        }
    }

    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == TokenState::Valid
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses > 0 && self.current_uses >= self.max_uses
    }

    /// Expired or exhausted: can never become redeemable again
    pub fn is_inert(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state_at(now), TokenState::Expired) || self.is_exhausted()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.token)
    }
}

/// Parameters for a new token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollmentToken {
    pub tenant_id: TenantId,
    pub site_id: Option<SiteId>,
    pub description: String,
    pub max_uses: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Fresh token value from the OS CSPRNG
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of a token value, the key of the value index
pub fn token_digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Short, non-reversible identifier of a token value for logs
pub fn fingerprint(value: &str) -> String {
    hex::encode(&token_digest(value)[..6])
}

/// Parse a `YYYY-MM-DD` expiry into midnight UTC of that date
pub fn parse_expiry_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw.trim(), EXPIRY_DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
