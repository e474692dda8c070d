//! Read-only queries over a flow: progress, who can act, overdue checks.

use serde::Serialize;

use crate::engine::is_actionable;
use crate::flow::{ApprovalFlow, FlowStatus, SignatureStatus, StepStatus};
use crate::types::{Timestamp, UserId};

/// Progress summary of a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowProgress {
    pub completed_steps: usize,
    pub total_steps: usize,
    /// `round(100 * completed / total)`, or 0 for a flow without steps.
    pub percentage: u8,
    pub signed_signatures: usize,
    pub total_signatures: usize,
}

/// Count approved steps and signed signatures.
pub fn compute_progress(flow: &ApprovalFlow) -> FlowProgress {
    let total_steps = flow.steps.len();
    let completed_steps = flow
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Approved)
        .count();
    let percentage = if total_steps == 0 {
        0
    } else {
        // Bounded by 100, so the cast cannot truncate.
        ((completed_steps * 200 + total_steps) / (total_steps * 2)) as u8
    };

    let signatures = flow.steps.iter().flat_map(|s| s.signatures.iter());
    let total_signatures = signatures.clone().count();
    let signed_signatures = signatures
        .filter(|s| s.status == SignatureStatus::Signed)
        .count();

    FlowProgress {
        completed_steps,
        total_steps,
        percentage,
        signed_signatures,
        total_signatures,
    }
}

/// Users who can act on the flow right now, without duplicates, in step
/// order.
pub fn active_approvers(flow: &ApprovalFlow) -> Vec<UserId> {
    let mut out: Vec<UserId> = Vec::new();
    for step in flow.steps.iter().filter(|s| is_actionable(flow, s)) {
        for sig in step
            .signatures
            .iter()
            .filter(|s| s.status == SignatureStatus::Pending)
        {
            if !out.contains(&sig.signer_id) {
                out.push(sig.signer_id.clone());
            }
        }
    }
    out
}

/// Whether `user_id` holds a pending signature on some actionable step.
pub fn can_act(flow: &ApprovalFlow, user_id: &str) -> bool {
    flow.steps.iter().any(|step| {
        is_actionable(flow, step)
            && step
                .signature_for(user_id)
                .is_some_and(|s| s.status == SignatureStatus::Pending)
    })
}

/// An open flow whose due date has passed.
pub fn is_overdue(flow: &ApprovalFlow, now: Timestamp) -> bool {
    matches!(flow.status, FlowStatus::Pending | FlowStatus::InReview)
        && flow.due_date.is_some_and(|due| due < now)
}
