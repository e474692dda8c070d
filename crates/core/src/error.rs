/// Domain error shared by the engine, the stores and the API layer.
///
/// Every variant is caller-recoverable. Commands that fail with any of these
/// leave the flow and its audit trail untouched.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Command attempted against a terminal (or otherwise unsuitable) flow.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Activation-policy violation: wrong step for a sequential flow, or the
    /// step is already resolved.
    #[error("Step not actionable: {0}")]
    StepNotActionable(String),

    /// The actor is not one of the step's assigned approvers.
    #[error("Unauthorized approver: {0}")]
    UnauthorizedApprover(String),

    /// The actor already recorded a decision on the step.
    #[error("Duplicate signature: {0}")]
    DuplicateSignature(String),

    /// Optimistic-concurrency retries were exhausted.
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// The backing store is unavailable or failed.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
