//! Approval flow state machine.
//!
//! Pure transitions over an [`ApprovalFlow`]. Each command checks every
//! precondition before touching the flow, so a returned error always leaves
//! the flow exactly as it was. On success the command returns the
//! [`NewAuditEntry`] describing it; persisting flow and entry together is the
//! job of [`crate::service::ApprovalEngine`].

use serde_json::json;

use crate::audit::{AuditAction, NewAuditEntry};
use crate::error::CoreError;
use crate::flow::{
    Actor, ApprovalFlow, ApprovalStep, FlowDefinition, FlowStatus, FlowType, SignatureStatus,
    StepDefinition, StepStatus,
};
use crate::quorum;
use crate::types::{new_id, EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Sign a step.
#[derive(Debug, Clone)]
pub struct ApproveCommand {
    pub step_id: EntityId,
    pub approver: Actor,
    pub comments: Option<String>,
    /// Opaque attestation token stored with the signature.
    pub signature_proof: String,
}

/// Reject a step. The reason becomes part of the legal record.
#[derive(Debug, Clone)]
pub struct RejectCommand {
    pub step_id: EntityId,
    pub approver: Actor,
    pub reason: String,
}

/// Withdraw a flow. Who may cancel is decided by the caller.
#[derive(Debug, Clone)]
pub struct CancelCommand {
    pub actor: Actor,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn require_non_blank(value: &str, field: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Validate step definitions under `flow_type`, returning the effective
/// quorum of each step.
pub fn validate_steps(flow_type: FlowType, steps: &[StepDefinition]) -> Result<Vec<u32>, CoreError> {
    if steps.is_empty() {
        return Err(CoreError::Validation(
            "An approval flow needs at least one step".to_string(),
        ));
    }

    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let number = i + 1;
            for (j, approver) in step.approvers.iter().enumerate() {
                if approver.id.trim().is_empty() {
                    return Err(CoreError::Validation(format!(
                        "Step {number}: approver id must not be empty"
                    )));
                }
                if step.approvers[..j].iter().any(|a| a.id == approver.id) {
                    return Err(CoreError::Validation(format!(
                        "Step {number}: approver '{}' is assigned more than once",
                        approver.id
                    )));
                }
            }
            quorum::effective_quorum(flow_type, step.required_approvals, step.approvers.len())
                .map_err(|e| match e {
                    CoreError::Validation(msg) => {
                        CoreError::Validation(format!("Step {number}: {msg}"))
                    }
                    other => other,
                })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// initiate
// ---------------------------------------------------------------------------

/// Build a new flow from a definition.
///
/// All signatures start `pending`, the flow starts `pending` at step 1.
pub fn initiate(
    definition: FlowDefinition,
    initiator: &Actor,
    now: Timestamp,
) -> Result<(ApprovalFlow, NewAuditEntry), CoreError> {
    require_non_blank(&definition.document_id, "document_id")?;
    require_non_blank(&definition.document_name, "document_name")?;
    require_non_blank(&definition.project_id, "project_id")?;
    require_non_blank(&initiator.id, "initiator id")?;

    let quorums = validate_steps(definition.flow_type, &definition.steps)?;

    let steps: Vec<ApprovalStep> = definition
        .steps
        .into_iter()
        .zip(quorums)
        .zip(1u32..)
        .map(|((step, required), number)| ApprovalStep::new(number, step.approvers, required))
        .collect();

    let flow = ApprovalFlow {
        id: new_id(),
        document_id: definition.document_id,
        document_name: definition.document_name,
        project_id: definition.project_id,
        project_name: definition.project_name,
        template_id: definition.template_id,
        flow_type: definition.flow_type,
        status: FlowStatus::Pending,
        current_step_number: 1,
        steps,
        initiated_by: initiator.id.clone(),
        initiated_by_name: initiator.name.clone(),
        initiated_at: now,
        due_date: definition.due_date,
        completed_at: None,
        cancellation_reason: None,
        notes: definition.notes,
        version: 0,
    };

    let entry = NewAuditEntry::for_flow(
        flow.id,
        AuditAction::Initiate,
        &initiator.id,
        &initiator.name,
        now,
        json!({
            "flow_type": flow.flow_type.as_str(),
            "document_id": flow.document_id,
            "template_id": flow.template_id,
            "step_count": flow.steps.len(),
        }),
    );

    Ok((flow, entry))
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

fn ensure_open(flow: &ApprovalFlow) -> Result<(), CoreError> {
    if flow.status.is_terminal() {
        return Err(CoreError::InvalidState(format!(
            "Flow {} is already {}",
            flow.id, flow.status
        )));
    }
    Ok(())
}

fn locate_step(flow: &ApprovalFlow, step_id: EntityId) -> Result<usize, CoreError> {
    flow.step_index(step_id).ok_or_else(|| CoreError::NotFound {
        entity: "ApprovalStep",
        id: step_id.to_string(),
    })
}

/// Whether `step` currently accepts signatures under the flow's activation
/// policy.
pub fn is_actionable(flow: &ApprovalFlow, step: &ApprovalStep) -> bool {
    if flow.status.is_terminal() || step.status != StepStatus::Pending {
        return false;
    }
    match flow.flow_type {
        FlowType::Sequential => step.step_number == flow.current_step_number,
        FlowType::Parallel | FlowType::Unanimous => true,
    }
}

fn ensure_actionable(flow: &ApprovalFlow, idx: usize) -> Result<(), CoreError> {
    let step = &flow.steps[idx];
    if step.status != StepStatus::Pending {
        return Err(CoreError::StepNotActionable(format!(
            "Step {} is already {}",
            step.step_number,
            step.status.as_str()
        )));
    }
    if !is_actionable(flow, step) {
        return Err(CoreError::StepNotActionable(format!(
            "Step {} is not active; step {} must be resolved first",
            step.step_number, flow.current_step_number
        )));
    }
    Ok(())
}

/// Returns the index of `user_id`'s pending signature on the step.
fn ensure_can_sign(step: &ApprovalStep, user_id: &str) -> Result<usize, CoreError> {
    let sig_idx = step.signature_index(user_id).ok_or_else(|| {
        CoreError::UnauthorizedApprover(format!(
            "User '{user_id}' is not an approver of step {}",
            step.step_number
        ))
    })?;
    let status = step.signatures[sig_idx].status;
    if status != SignatureStatus::Pending {
        return Err(CoreError::DuplicateSignature(format!(
            "User '{user_id}' has already {} step {}",
            status.as_str(),
            step.step_number
        )));
    }
    Ok(sig_idx)
}

/// Shared approve/reject preconditions: open flow, actionable step, assigned
/// approver with a pending signature. Returns `(step_idx, signature_idx)`.
fn check_decision(
    flow: &ApprovalFlow,
    step_id: EntityId,
    user_id: &str,
) -> Result<(usize, usize), CoreError> {
    ensure_open(flow)?;
    let idx = locate_step(flow, step_id)?;
    ensure_actionable(flow, idx)?;
    let sig_idx = ensure_can_sign(&flow.steps[idx], user_id)?;
    Ok((idx, sig_idx))
}

// ---------------------------------------------------------------------------
// Re-evaluation
// ---------------------------------------------------------------------------

fn complete(flow: &mut ApprovalFlow, status: FlowStatus, now: Timestamp) {
    flow.status = status;
    flow.completed_at = Some(now);
}

fn any_signed(flow: &ApprovalFlow) -> bool {
    flow.steps
        .iter()
        .flat_map(|s| s.signatures.iter())
        .any(|s| s.status == SignatureStatus::Signed)
}

/// Recompute flow status after the step at `idx` changed.
fn reevaluate(flow: &mut ApprovalFlow, idx: usize, now: Timestamp) {
    match flow.flow_type {
        FlowType::Sequential => {
            let is_last = idx + 1 == flow.steps.len();
            match flow.steps[idx].status {
                StepStatus::Approved if is_last => complete(flow, FlowStatus::Approved, now),
                StepStatus::Approved => {
                    flow.current_step_number += 1;
                    flow.status = FlowStatus::InReview;
                }
                StepStatus::Rejected => complete(flow, FlowStatus::Rejected, now),
                StepStatus::Pending => flow.status = FlowStatus::InReview,
            }
        }
        FlowType::Parallel | FlowType::Unanimous => {
            if flow.steps.iter().any(|s| s.status == StepStatus::Rejected) {
                complete(flow, FlowStatus::Rejected, now);
            } else if flow.steps.iter().all(|s| s.status == StepStatus::Approved) {
                complete(flow, FlowStatus::Approved, now);
            } else if any_signed(flow) {
                flow.status = FlowStatus::InReview;
            } else {
                flow.status = FlowStatus::Pending;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// approve / reject / cancel
// ---------------------------------------------------------------------------

/// Record a signature on a step and advance the flow.
pub fn approve(
    flow: &mut ApprovalFlow,
    cmd: &ApproveCommand,
    now: Timestamp,
) -> Result<NewAuditEntry, CoreError> {
    let (idx, sig_idx) = check_decision(flow, cmd.step_id, &cmd.approver.id)?;
    require_non_blank(&cmd.signature_proof, "signature_proof")?;

    let step = &mut flow.steps[idx];
    let signature = &mut step.signatures[sig_idx];
    signature.status = SignatureStatus::Signed;
    signature.signed_at = Some(now);
    signature.signature_proof = Some(cmd.signature_proof.clone());

    step.current_approvals = quorum::signed_count(&step.signatures);
    step.status = quorum::resolve_step(step.required_approvals, &step.signatures);
    if let Some(comments) = cmd.comments.as_ref().filter(|c| !c.trim().is_empty()) {
        step.comments = Some(comments.clone());
    }
    let step_number = step.step_number;
    let step_status = step.status;

    reevaluate(flow, idx, now);

    Ok(NewAuditEntry::for_flow(
        flow.id,
        AuditAction::Approve,
        &cmd.approver.id,
        &cmd.approver.name,
        now,
        json!({
            "step_id": cmd.step_id,
            "step_number": step_number,
            "comments": cmd.comments,
            "step_status": step_status.as_str(),
            "flow_status": flow.status.as_str(),
        }),
    ))
}

/// Reject a step, which rejects the whole flow.
pub fn reject(
    flow: &mut ApprovalFlow,
    cmd: &RejectCommand,
    now: Timestamp,
) -> Result<NewAuditEntry, CoreError> {
    let (idx, sig_idx) = check_decision(flow, cmd.step_id, &cmd.approver.id)?;
    require_non_blank(&cmd.reason, "Rejection reason")?;

    let step = &mut flow.steps[idx];
    let signature = &mut step.signatures[sig_idx];
    signature.status = SignatureStatus::Rejected;
    signature.signed_at = Some(now);
    signature.rejection_reason = Some(cmd.reason.clone());

    step.current_approvals = quorum::signed_count(&step.signatures);
    step.status = quorum::resolve_step(step.required_approvals, &step.signatures);
    let step_number = step.step_number;

    reevaluate(flow, idx, now);

    Ok(NewAuditEntry::for_flow(
        flow.id,
        AuditAction::Reject,
        &cmd.approver.id,
        &cmd.approver.name,
        now,
        json!({
            "step_id": cmd.step_id,
            "step_number": step_number,
            "reason": cmd.reason,
        }),
    ))
}

/// Cancel an open flow.
pub fn cancel(
    flow: &mut ApprovalFlow,
    cmd: &CancelCommand,
    now: Timestamp,
) -> Result<NewAuditEntry, CoreError> {
    ensure_open(flow)?;
    require_non_blank(&cmd.reason, "Cancellation reason")?;

    let previous = flow.status;
    flow.cancellation_reason = Some(cmd.reason.clone());
    complete(flow, FlowStatus::Cancelled, now);

    Ok(NewAuditEntry::for_flow(
        flow.id,
        AuditAction::Cancel,
        &cmd.actor.id,
        &cmd.actor.name,
        now,
        json!({
            "reason": cmd.reason,
            "previous_status": previous.as_str(),
            "step_number": flow.current_step_number,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
