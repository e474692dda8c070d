//! Quorum evaluation.
//!
//! Pure functions deciding a step's resolution from its quorum and signature
//! set, and the quorum a step must carry under a given flow policy.

use crate::error::CoreError;
use crate::flow::{FlowType, Signature, SignatureStatus, StepStatus};

/// Number of signatures with status `signed`.
pub fn signed_count(signatures: &[Signature]) -> u32 {
    let n = signatures
        .iter()
        .filter(|s| s.status == SignatureStatus::Signed)
        .count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Resolve a step from its signatures.
///
/// A single rejection rejects the step. Otherwise the step is approved once
/// the signed count reaches `required_approvals`.
pub fn resolve_step(required_approvals: u32, signatures: &[Signature]) -> StepStatus {
    if signatures
        .iter()
        .any(|s| s.status == SignatureStatus::Rejected)
    {
        return StepStatus::Rejected;
    }
    if signed_count(signatures) >= required_approvals {
        StepStatus::Approved
    } else {
        StepStatus::Pending
    }
}

/// The quorum a step actually runs with.
///
/// `unanimous` flows ignore the requested value and require every approver.
/// Other policies require `1 <= requested <= approver_count`.
pub fn effective_quorum(
    flow_type: FlowType,
    requested: u32,
    approver_count: usize,
) -> Result<u32, CoreError> {
    if approver_count == 0 {
        return Err(CoreError::Validation(
            "A step must have at least one approver".to_string(),
        ));
    }
    let count = u32::try_from(approver_count).map_err(|_| {
        CoreError::Validation(format!("Too many approvers on one step: {approver_count}"))
    })?;

    match flow_type {
        FlowType::Unanimous => Ok(count),
        FlowType::Sequential | FlowType::Parallel => {
            if requested < 1 || requested > count {
                Err(CoreError::Validation(format!(
                    "required_approvals must be between 1 and {count}, got {requested}"
                )))
            } else {
                Ok(requested)
            }
        }
    }
}
