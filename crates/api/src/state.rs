use std::sync::Arc;

use signoff_core::ApprovalEngine;
use signoff_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// The approval engine, backed by Postgres or the in-memory store.
    pub engine: Arc<ApprovalEngine>,
    /// Present only when running against Postgres; used by the health check.
    pub pool: Option<signoff_db::DbPool>,
    pub config: Arc<ServerConfig>,
    /// Receives one event per accepted command.
    pub event_bus: Arc<EventBus>,
}
