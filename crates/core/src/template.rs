//! Flow templates and instantiation.
//!
//! A template is a reusable blueprint of steps and approvers. Flows copy the
//! template's steps at creation time, so editing a template never alters
//! existing flows.

use serde::{Deserialize, Serialize};

use crate::audit::NewAuditEntry;
use crate::engine;
use crate::error::CoreError;
use crate::flow::{Actor, ApprovalFlow, FlowDefinition, FlowType, StepDefinition};
use crate::types::{EntityId, Timestamp};

/// Template steps share the shape of ad-hoc step definitions.
pub type StepTemplate = StepDefinition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowTemplate {
    pub id: EntityId,
    pub name: String,
    pub document_type: String,
    pub flow_type: FlowType,
    pub steps: Vec<StepTemplate>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The document a template is being instantiated for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: String,
    pub document_name: String,
    pub project_id: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub due_date: Option<Timestamp>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Editable fields of a template, as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInput {
    pub name: String,
    pub document_type: String,
    pub flow_type: FlowType,
    pub steps: Vec<StepTemplate>,
}

impl FlowTemplate {
    /// A new template with both timestamps set to `now`.
    pub fn create(id: EntityId, input: TemplateInput, now: Timestamp) -> Self {
        Self {
            id,
            name: input.name,
            document_type: input.document_type,
            flow_type: input.flow_type,
            steps: input.steps,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an edit, keeping `id` and `created_at`.
    pub fn revise(&self, input: TemplateInput, now: Timestamp) -> Self {
        Self {
            updated_at: now,
            ..Self::create(self.id, input, self.created_at)
        }
    }
}

/// Check a template before it is stored.
pub fn validate_template(template: &FlowTemplate) -> Result<(), CoreError> {
    if template.name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Template name must not be empty".to_string(),
        ));
    }
    if template.document_type.trim().is_empty() {
        return Err(CoreError::Validation(
            "Template document_type must not be empty".to_string(),
        ));
    }
    engine::validate_steps(template.flow_type, &template.steps)?;
    Ok(())
}

/// Start a flow for `document` from `template`.
///
/// Malformed templates fail with the same validation errors as
/// [`engine::initiate`].
pub fn from_template(
    template: &FlowTemplate,
    document: DocumentRef,
    initiator: &Actor,
    now: Timestamp,
) -> Result<(ApprovalFlow, NewAuditEntry), CoreError> {
    let definition = FlowDefinition {
        document_id: document.document_id,
        document_name: document.document_name,
        project_id: document.project_id,
        project_name: document.project_name,
        template_id: Some(template.id),
        flow_type: template.flow_type,
        steps: template.steps.clone(),
        due_date: document.due_date,
        notes: document.notes,
    };
    engine::initiate(definition, initiator, now)
}
