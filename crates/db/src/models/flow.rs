//! Row model for the `approval_flows` table.

use signoff_core::flow::{ApprovalFlow, ApprovalStep, FlowStatus, FlowType};
use signoff_core::store::StoreError;
use signoff_core::types::{EntityId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A flow as stored. Statuses are TEXT columns and steps a JSONB document.
#[derive(Debug, Clone, FromRow)]
pub struct ApprovalFlowRow {
    pub id: EntityId,
    pub document_id: String,
    pub document_name: String,
    pub project_id: String,
    pub project_name: Option<String>,
    pub template_id: Option<EntityId>,
    pub flow_type: String,
    pub status: String,
    pub current_step_number: i32,
    pub steps: Json<Vec<ApprovalStep>>,
    pub initiated_by: String,
    pub initiated_by_name: String,
    pub initiated_at: Timestamp,
    pub due_date: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    pub version: i64,
}

impl TryFrom<ApprovalFlowRow> for ApprovalFlow {
    type Error = StoreError;

    fn try_from(row: ApprovalFlowRow) -> Result<Self, Self::Error> {
        let flow_type: FlowType = row
            .flow_type
            .parse()
            .map_err(|e| StoreError::Backend(format!("flow {}: {e}", row.id)))?;
        let status: FlowStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::Backend(format!("flow {}: {e}", row.id)))?;
        let current_step_number = u32::try_from(row.current_step_number).map_err(|_| {
            StoreError::Backend(format!(
                "flow {}: negative current_step_number {}",
                row.id, row.current_step_number
            ))
        })?;

        Ok(ApprovalFlow {
            id: row.id,
            document_id: row.document_id,
            document_name: row.document_name,
            project_id: row.project_id,
            project_name: row.project_name,
            template_id: row.template_id,
            flow_type,
            status,
            current_step_number,
            steps: row.steps.0,
            initiated_by: row.initiated_by,
            initiated_by_name: row.initiated_by_name,
            initiated_at: row.initiated_at,
            due_date: row.due_date,
            completed_at: row.completed_at,
            cancellation_reason: row.cancellation_reason,
            notes: row.notes,
            version: row.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use signoff_core::flow::{Approver, StepStatus};
    use signoff_core::types::{new_id, now};

    fn row() -> ApprovalFlowRow {
        let step = ApprovalStep::new(
            1,
            vec![Approver {
                id: "a".into(),
                name: "A".into(),
                email: "a@studio.test".into(),
                role: "architect".into(),
            }],
            1,
        );
        ApprovalFlowRow {
            id: new_id(),
            document_id: "doc".into(),
            document_name: "Facade study".into(),
            project_id: "p".into(),
            project_name: None,
            template_id: None,
            flow_type: "sequential".into(),
            status: "in-review".into(),
            current_step_number: 1,
            steps: Json(vec![step]),
            initiated_by: "pm".into(),
            initiated_by_name: "PM".into(),
            initiated_at: now(),
            due_date: None,
            completed_at: None,
            cancellation_reason: None,
            notes: None,
            version: 4,
        }
    }

    #[test]
    fn row_converts_to_domain_flow() {
        let flow = ApprovalFlow::try_from(row()).unwrap();
        assert_eq!(flow.flow_type, FlowType::Sequential);
        assert_eq!(flow.status, FlowStatus::InReview);
        assert_eq!(flow.version, 4);
        assert_eq!(flow.steps[0].status, StepStatus::Pending);
    }

    #[test]
    fn unknown_status_is_a_backend_error() {
        let mut bad = row();
        bad.status = "archived".into();
        assert_matches!(ApprovalFlow::try_from(bad), Err(StoreError::Backend(_)));
    }

    #[test]
    fn negative_step_number_is_a_backend_error() {
        let mut bad = row();
        bad.current_step_number = -1;
        assert_matches!(ApprovalFlow::try_from(bad), Err(StoreError::Backend(_)));
    }
}
