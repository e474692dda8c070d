//! Notification dispatch.
//!
//! [`LoggingNotifier`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and emits one structured log line per recipient. It stands in for real
//! delivery channels and shuts down when the bus is dropped.

use tokio::sync::broadcast;

use crate::bus::ApprovalEvent;

pub struct LoggingNotifier;

impl LoggingNotifier {
    /// Run the dispatch loop until the channel closes. Returns the number of
    /// events handled.
    pub async fn run(mut receiver: broadcast::Receiver<ApprovalEvent>) -> u64 {
        let mut handled = 0u64;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::dispatch(&event);
                    handled += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notifier lagged, some events were not dispatched");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(handled, "Event bus closed, notifier shutting down");
                    break;
                }
            }
        }
        handled
    }

    fn dispatch(event: &ApprovalEvent) {
        if event.recipients.is_empty() {
            tracing::debug!(
                event_type = %event.event_type,
                flow_id = %event.flow_id,
                "No recipients for approval event"
            );
            return;
        }
        for recipient in &event.recipients {
            tracing::info!(
                event_type = %event.event_type,
                flow_id = %event.flow_id,
                document_id = %event.document_id,
                status = %event.flow_status,
                actor_id = %event.actor_id,
                recipient = %recipient,
                "Approval notification"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{event_types, EventBus};
    use signoff_core::engine::initiate;
    use signoff_core::flow::{Actor, Approver, FlowDefinition, FlowType, StepDefinition};
    use signoff_core::types::now;

    #[tokio::test]
    async fn notifier_drains_bus_and_stops_on_close() {
        let bus = EventBus::default();
        let handle = tokio::spawn(LoggingNotifier::run(bus.subscribe()));

        let def = FlowDefinition {
            document_id: "doc".into(),
            document_name: "Door schedule".into(),
            project_id: "proj".into(),
            project_name: None,
            template_id: None,
            flow_type: FlowType::Parallel,
            steps: vec![StepDefinition {
                approvers: vec![Approver {
                    id: "a".into(),
                    name: "A".into(),
                    email: "a@studio.test".into(),
                    role: "architect".into(),
                }],
                required_approvals: 1,
            }],
            due_date: None,
            notes: None,
        };
        let flow = initiate(def, &Actor::new("pm", "PM"), now()).unwrap().0;
        bus.publish(ApprovalEvent::for_flow(event_types::INITIATED, &flow, "pm"));
        bus.publish(ApprovalEvent::for_flow(event_types::INITIATED, &flow, "pm"));
        drop(bus);

        assert_eq!(handle.await.unwrap(), 2);
    }
}
