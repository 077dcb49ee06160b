//! fleet-console - Multi-tenant endpoint fleet console
//!
//! Tenant-scoped authorization for every administrative action, and the
//! enrollment token lifecycle that lets agents bootstrap into a tenant.

pub mod authz;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod config_validator;
pub mod enrollment;
pub mod http_server;
pub mod persistence;
pub mod tenancy;
