//! Request handlers.
//!
//! Handlers delegate to [`signoff_core::ApprovalEngine`], publish an
//! [`signoff_events::ApprovalEvent`] for every accepted command and map errors
//! via [`AppError`](crate::error::AppError).

pub mod flows;
pub mod templates;
