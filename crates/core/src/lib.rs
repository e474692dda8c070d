//! Signoff approval engine core.
//!
//! - [`flow`] -- flows, steps, signatures and their status enums.
//! - [`engine`] -- pure initiate/approve/reject/cancel transitions.
//! - [`quorum`] -- step resolution and quorum rules.
//! - [`progress`] -- progress, active approvers and overdue queries.
//! - [`template`] -- flow templates and instantiation.
//! - [`audit`] -- audit entries and the integrity hash chain.
//! - [`store`] -- persistence traits and the in-memory store.
//! - [`service`] -- [`ApprovalEngine`], the concurrency-safe entry point.

pub mod audit;
pub mod engine;
pub mod error;
pub mod flow;
pub mod hashing;
pub mod progress;
pub mod quorum;
pub mod service;
pub mod store;
pub mod template;
pub mod types;

pub use error::CoreError;
pub use service::{ApprovalEngine, CommandOutcome};
