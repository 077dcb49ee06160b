//! # Enrollment Module
//!
//! Enrollment tokens and their redemption.
//!
//! ## Components
//!
//! - `token`: Token entity and redemption state
//! - `store`: Tenant-scoped token store with value index
//! - `redemption`: Unauthenticated token-for-bundle exchange
//! - `errors`: Store and redemption errors

pub mod errors;
pub mod redemption;
pub mod store;
pub mod token;

pub use errors::{EnrollmentError, EnrollmentResult, RedemptionError};
pub use redemption::{Redemption, RedemptionService};
pub use store::{TokenStore, TOKEN_SNAPSHOT};
pub use token::{
    fingerprint, generate_token_value, parse_expiry_date, EnrollmentToken, NewEnrollmentToken,
    TokenId, TokenState, EXPIRY_DATE_FORMAT,
};
