//! Signoff event bus and notification dispatch.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ApprovalEvent`] -- what happened to a flow and who should hear about it.
//! - [`LoggingNotifier`] -- background consumer that records every event as a
//!   structured log line.

pub mod bus;
pub mod notifier;

pub use bus::{ApprovalEvent, EventBus};
pub use notifier::LoggingNotifier;
