//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` across the application. The API
//! publishes one [`ApprovalEvent`] after every accepted command; nothing is
//! published for rejected commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signoff_core::flow::{ApprovalFlow, FlowStatus};
use signoff_core::progress::active_approvers;
use signoff_core::types::{EntityId, UserId};
use tokio::sync::broadcast;

/// Event type names.
pub mod event_types {
    pub const INITIATED: &str = "approval_flow.initiated";
    pub const APPROVED: &str = "approval_flow.approved";
    pub const REJECTED: &str = "approval_flow.rejected";
    pub const CANCELLED: &str = "approval_flow.cancelled";
    /// The last required signature landed and the flow is approved.
    pub const COMPLETED: &str = "approval_flow.completed";
}

// ---------------------------------------------------------------------------
// ApprovalEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalEvent {
    /// Dot-separated event name, one of [`event_types`].
    pub event_type: String,
    pub flow_id: EntityId,
    pub document_id: String,
    pub project_id: String,
    pub flow_status: FlowStatus,
    pub actor_id: UserId,
    /// Users to notify: the next active approvers while the flow is open,
    /// the initiator once it has finished.
    pub recipients: Vec<UserId>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ApprovalEvent {
    /// Describe the state `flow` was left in by `actor_id`'s command.
    ///
    /// An `approve` that completes the flow is reported as
    /// [`event_types::COMPLETED`].
    pub fn for_flow(event_type: &str, flow: &ApprovalFlow, actor_id: &str) -> Self {
        let event_type = if event_type == event_types::APPROVED && flow.status == FlowStatus::Approved
        {
            event_types::COMPLETED
        } else {
            event_type
        };
        let recipients = if flow.status.is_terminal() {
            vec![flow.initiated_by.clone()]
        } else {
            active_approvers(flow)
        };
        Self {
            event_type: event_type.to_string(),
            flow_id: flow.id,
            document_id: flow.document_id.clone(),
            project_id: flow.project_id.clone(),
            flow_status: flow.status,
            actor_id: actor_id.to_string(),
            recipients,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// When the buffer is full the oldest unconsumed events are dropped and slow
/// receivers observe `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<ApprovalEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped silently when there are
    /// none.
    pub fn publish(&self, event: ApprovalEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApprovalEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
