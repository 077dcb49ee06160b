//! # Authorization Module
//!
//! Tenant-scoped authorization gating every administrative action.
//!
//! ## Components
//!
//! - `resolver`: Role and hoster-admin queries
//! - `gates`: Request-entry gates
//! - `session`: Session token issue/verification
//! - `errors`: Denial taxonomy

pub mod errors;
pub mod gates;
pub mod resolver;
pub mod session;

pub use errors::{AccessDenial, DenialReason};
pub use gates::{Gate, RequestScope, NO_TENANT_SELECTED};
pub use resolver::{AuthorizationResolver, GlobalAuthority};
pub use session::{SessionKeys, SESSION_COOKIE};
