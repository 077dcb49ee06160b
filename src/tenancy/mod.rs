//! # Tenancy Module
//!
//! Tenant directory and user-tenant memberships.
//!
//! ## Components
//!
//! - `tenant`: Tenant model and identifiers
//! - `membership`: Roles, memberships and user records
//! - `directory`: Transactional store for all of the above
//! - `errors`: Directory errors

pub mod directory;
pub mod errors;
pub mod membership;
pub mod tenant;

pub use directory::*;
pub use errors::*;
pub use membership::*;
pub use tenant::*;
