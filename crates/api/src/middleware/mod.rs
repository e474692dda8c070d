//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the caller from a JWT Bearer token.
//! - [`rbac::TemplateManager`] -- Requires the `admin` role for template writes.

pub mod auth;
pub mod rbac;
