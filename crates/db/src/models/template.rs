//! Row model for the `flow_templates` table.

use signoff_core::flow::FlowType;
use signoff_core::store::StoreError;
use signoff_core::template::{FlowTemplate, StepTemplate};
use signoff_core::types::{EntityId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct FlowTemplateRow {
    pub id: EntityId,
    pub name: String,
    pub document_type: String,
    pub flow_type: String,
    pub steps: Json<Vec<StepTemplate>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<FlowTemplateRow> for FlowTemplate {
    type Error = StoreError;

    fn try_from(row: FlowTemplateRow) -> Result<Self, Self::Error> {
        let flow_type: FlowType = row
            .flow_type
            .parse()
            .map_err(|e| StoreError::Backend(format!("template {}: {e}", row.id)))?;
        Ok(FlowTemplate {
            id: row.id,
            name: row.name,
            document_type: row.document_type,
            flow_type,
            steps: row.steps.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
