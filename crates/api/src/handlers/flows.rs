//! Handlers for approval flows: initiation, signing, rejection, cancellation,
//! the personal inbox and the audit trail.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use signoff_core::audit::{AuditLogEntry, ChainVerification};
use signoff_core::engine::{ApproveCommand, CancelCommand, RejectCommand};
use signoff_core::flow::{ApprovalFlow, FlowDefinition, FlowType, StepDefinition};
use signoff_core::hashing::signature_attestation;
use signoff_core::progress::{self, FlowProgress};
use signoff_core::store::FlowFilter;
use signoff_core::template::DocumentRef;
use signoff_core::types::{self, EntityId, Timestamp, UserId};
use signoff_core::CommandOutcome;
use signoff_events::bus::event_types;
use signoff_events::ApprovalEvent;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /flows`. The initiator is the caller.
#[derive(Debug, Deserialize)]
pub struct CreateFlowRequest {
    pub document_id: String,
    pub document_name: String,
    pub project_id: String,
    pub project_name: Option<String>,
    pub flow_type: FlowType,
    pub steps: Vec<StepDefinition>,
    pub due_date: Option<Timestamp>,
    pub notes: Option<String>,
}

impl From<CreateFlowRequest> for FlowDefinition {
    fn from(req: CreateFlowRequest) -> Self {
        FlowDefinition {
            document_id: req.document_id,
            document_name: req.document_name,
            project_id: req.project_id,
            project_name: req.project_name,
            template_id: None,
            flow_type: req.flow_type,
            steps: req.steps,
            due_date: req.due_date,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FromTemplateRequest {
    pub template_id: EntityId,
    #[serde(flatten)]
    pub document: DocumentRef,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub comments: Option<String>,
    /// Client-supplied attestation. Derived server-side when absent.
    pub signature_proof: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

/// A flow plus the read-only queries evaluated for the caller.
#[derive(Debug, Serialize)]
pub struct FlowView {
    #[serde(flatten)]
    pub flow: ApprovalFlow,
    pub progress: FlowProgress,
    pub active_approvers: Vec<UserId>,
    pub is_overdue: bool,
    /// Whether the requesting user can sign right now.
    pub can_act: bool,
}

impl FlowView {
    pub fn for_user(flow: ApprovalFlow, user_id: &str) -> Self {
        Self {
            progress: progress::compute_progress(&flow),
            active_approvers: progress::active_approvers(&flow),
            is_overdue: progress::is_overdue(&flow, types::now()),
            can_act: progress::can_act(&flow, user_id),
            flow,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub flow: FlowView,
    pub audit_entry: AuditLogEntry,
}

#[derive(Debug, Serialize)]
pub struct AuditTrailResponse {
    pub entries: Vec<AuditLogEntry>,
    pub verification: ChainVerification,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Publish the event for an accepted command and shape the response.
fn publish_outcome(
    state: &AppState,
    event_type: &str,
    outcome: CommandOutcome,
    auth: &AuthUser,
) -> CommandResponse {
    let event = ApprovalEvent::for_flow(event_type, &outcome.flow, &auth.user_id)
        .with_payload(outcome.audit_entry.metadata.clone());
    state.event_bus.publish(event);

    CommandResponse {
        flow: FlowView::for_user(outcome.flow, &auth.user_id),
        audit_entry: outcome.audit_entry,
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// POST /api/v1/flows
///
/// Start an ad-hoc flow. The caller becomes the initiator.
pub async fn create_flow(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateFlowRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.engine.initiate(input.into(), &auth.actor()).await?;
    let data = publish_outcome(&state, event_types::INITIATED, outcome, &auth);
    Ok((StatusCode::CREATED, Json(DataResponse { data })))
}

/// POST /api/v1/flows/from-template
///
/// Start a flow from a stored template for the given document.
pub async fn create_flow_from_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<FromTemplateRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .engine
        .initiate_from_template(input.template_id, input.document, &auth.actor())
        .await?;
    let data = publish_outcome(&state, event_types::INITIATED, outcome, &auth);
    Ok((StatusCode::CREATED, Json(DataResponse { data })))
}

/// POST /api/v1/flows/{flow_id}/steps/{step_id}/approve
pub async fn approve_step(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((flow_id, step_id)): Path<(EntityId, EntityId)>,
    Json(input): Json<ApproveRequest>,
) -> AppResult<impl IntoResponse> {
    let signature_proof = input
        .signature_proof
        .unwrap_or_else(|| signature_attestation(flow_id, step_id, &auth.user_id, types::now()));
    let cmd = ApproveCommand {
        step_id,
        approver: auth.actor(),
        comments: input.comments,
        signature_proof,
    };

    let outcome = state.engine.approve(flow_id, cmd).await?;
    let data = publish_outcome(&state, event_types::APPROVED, outcome, &auth);
    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/flows/{flow_id}/steps/{step_id}/reject
///
/// Reject a step. Rejection is final for the whole flow.
pub async fn reject_step(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((flow_id, step_id)): Path<(EntityId, EntityId)>,
    Json(input): Json<RejectRequest>,
) -> AppResult<impl IntoResponse> {
    let cmd = RejectCommand {
        step_id,
        approver: auth.actor(),
        reason: input.reason,
    };

    let outcome = state.engine.reject(flow_id, cmd).await?;
    let data = publish_outcome(&state, event_types::REJECTED, outcome, &auth);
    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/flows/{flow_id}/cancel
///
/// Withdraw a flow. Only its initiator or an admin may cancel.
pub async fn cancel_flow(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(flow_id): Path<EntityId>,
    Json(input): Json<CancelRequest>,
) -> AppResult<impl IntoResponse> {
    let flow = state.engine.get_flow(flow_id).await?;
    auth.ensure_can_cancel(&flow.initiated_by)?;

    let cmd = CancelCommand {
        actor: auth.actor(),
        reason: input.reason,
    };
    let outcome = state.engine.cancel(flow_id, cmd).await?;
    let data = publish_outcome(&state, event_types::CANCELLED, outcome, &auth);
    Ok(Json(DataResponse { data }))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /api/v1/flows?project_id=&document_id=&status=
pub async fn list_flows(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<FlowFilter>,
) -> AppResult<impl IntoResponse> {
    let flows = state.engine.list_flows(&filter).await?;
    let data: Vec<FlowView> = flows
        .into_iter()
        .map(|f| FlowView::for_user(f, &auth.user_id))
        .collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/flows/inbox
///
/// Open flows the caller can sign right now.
pub async fn inbox(auth: AuthUser, State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let flows = state.engine.list_actionable_for(&auth.user_id).await?;
    let data: Vec<FlowView> = flows
        .into_iter()
        .map(|f| FlowView::for_user(f, &auth.user_id))
        .collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/flows/{flow_id}
pub async fn get_flow(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(flow_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let flow = state.engine.get_flow(flow_id).await?;
    Ok(Json(DataResponse {
        data: FlowView::for_user(flow, &auth.user_id),
    }))
}

/// GET /api/v1/flows/{flow_id}/audit
///
/// The flow's audit trail in sequence order with the result of re-deriving
/// its hash chain.
pub async fn get_audit_trail(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(flow_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let (entries, verification) = state.engine.verified_audit_trail(flow_id).await?;
    Ok(Json(DataResponse {
        data: AuditTrailResponse {
            entries,
            verification,
        },
    }))
}
