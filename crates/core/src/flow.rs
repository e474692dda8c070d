//! Approval flow data model.
//!
//! An [`ApprovalFlow`] is one instantiated approval process for a document.
//! It owns an ordered list of [`ApprovalStep`]s; each step owns exactly one
//! [`Signature`] per assigned [`Approver`]. Statuses are tagged enums so the
//! state machine in [`crate::engine`] matches them exhaustively.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{new_id, EntityId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Step-advancement policy of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    /// One step at a time, in order.
    Sequential,
    /// All pending steps accept signatures at once.
    Parallel,
    /// Parallel activation with every step's quorum forced to its full
    /// approver count.
    Unanimous,
}

/// Lifecycle status of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    Cancelled,
}

/// Resolution status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

/// Decision status of a single approver's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStatus {
    Pending,
    Signed,
    Rejected,
}

impl FlowType {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowType::Sequential => "sequential",
            FlowType::Parallel => "parallel",
            FlowType::Unanimous => "unanimous",
        }
    }
}

impl FlowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowStatus::Pending => "pending",
            FlowStatus::InReview => "in-review",
            FlowStatus::Approved => "approved",
            FlowStatus::Rejected => "rejected",
            FlowStatus::Cancelled => "cancelled",
        }
    }

    /// `true` once the flow can no longer change.
    pub fn is_terminal(self) -> bool {
        match self {
            FlowStatus::Pending | FlowStatus::InReview => false,
            FlowStatus::Approved | FlowStatus::Rejected | FlowStatus::Cancelled => true,
        }
    }
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Approved => "approved",
            StepStatus::Rejected => "rejected",
        }
    }
}

impl SignatureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureStatus::Pending => "pending",
            SignatureStatus::Signed => "signed",
            SignatureStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for FlowType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(FlowType::Sequential),
            "parallel" => Ok(FlowType::Parallel),
            "unanimous" => Ok(FlowType::Unanimous),
            other => Err(CoreError::Validation(format!(
                "Invalid flow type '{other}'. Must be one of: sequential, parallel, unanimous"
            ))),
        }
    }
}

impl FromStr for FlowStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FlowStatus::Pending),
            "in-review" => Ok(FlowStatus::InReview),
            "approved" => Ok(FlowStatus::Approved),
            "rejected" => Ok(FlowStatus::Rejected),
            "cancelled" => Ok(FlowStatus::Cancelled),
            other => Err(CoreError::Validation(format!(
                "Invalid flow status '{other}'. Must be one of: \
                 pending, in-review, approved, rejected, cancelled"
            ))),
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// An approver assigned to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// The user issuing a command. Supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Signature / Step / Flow
// ---------------------------------------------------------------------------

/// One approver's decision on a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub id: EntityId,
    pub signer_id: UserId,
    pub signer_name: String,
    pub signer_role: String,
    pub signer_email: String,
    pub status: SignatureStatus,
    pub signed_at: Option<Timestamp>,
    pub signature_proof: Option<String>,
    pub rejection_reason: Option<String>,
}

impl Signature {
    /// A fresh, undecided signature slot for `approver`.
    pub fn pending_for(approver: &Approver) -> Self {
        Self {
            id: new_id(),
            signer_id: approver.id.clone(),
            signer_name: approver.name.clone(),
            signer_role: approver.role.clone(),
            signer_email: approver.email.clone(),
            status: SignatureStatus::Pending,
            signed_at: None,
            signature_proof: None,
            rejection_reason: None,
        }
    }
}

/// One stage of a flow with its own approver set and quorum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: EntityId,
    /// 1-based; always equals the step's index in the flow plus one.
    pub step_number: u32,
    pub approvers: Vec<Approver>,
    pub required_approvals: u32,
    pub current_approvals: u32,
    pub status: StepStatus,
    pub signatures: Vec<Signature>,
    pub comments: Option<String>,
}

impl ApprovalStep {
    /// Build a step with one pending signature per approver.
    ///
    /// The quorum is taken as given; callers validate it first.
    pub fn new(step_number: u32, approvers: Vec<Approver>, required_approvals: u32) -> Self {
        let signatures = approvers.iter().map(Signature::pending_for).collect();
        Self {
            id: new_id(),
            step_number,
            approvers,
            required_approvals,
            current_approvals: 0,
            status: StepStatus::Pending,
            signatures,
            comments: None,
        }
    }

    pub fn approver_ids(&self) -> impl Iterator<Item = &str> {
        self.approvers.iter().map(|a| a.id.as_str())
    }

    pub fn is_assigned(&self, user_id: &str) -> bool {
        self.approver_ids().any(|id| id == user_id)
    }

    pub fn signature_for(&self, user_id: &str) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.signer_id == user_id)
    }

    pub(crate) fn signature_index(&self, user_id: &str) -> Option<usize> {
        self.signatures.iter().position(|s| s.signer_id == user_id)
    }
}

/// One instantiated approval process for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalFlow {
    pub id: EntityId,
    pub document_id: String,
    pub document_name: String,
    pub project_id: String,
    pub project_name: Option<String>,
    pub template_id: Option<EntityId>,
    pub flow_type: FlowType,
    pub status: FlowStatus,
    /// 1-based; meaningful only while the flow is open.
    pub current_step_number: u32,
    pub steps: Vec<ApprovalStep>,
    pub initiated_by: UserId,
    pub initiated_by_name: String,
    pub initiated_at: Timestamp,
    pub due_date: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    /// Optimistic-concurrency counter, bumped by the store on every write.
    #[serde(default)]
    pub version: i64,
}

impl ApprovalFlow {
    pub(crate) fn step_index(&self, step_id: EntityId) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }
}

// ---------------------------------------------------------------------------
// Definitions (input to `engine::initiate`)
// ---------------------------------------------------------------------------

/// Requested shape of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub approvers: Vec<Approver>,
    pub required_approvals: u32,
}

/// Everything needed to start a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub document_id: String,
    pub document_name: String,
    pub project_id: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub template_id: Option<EntityId>,
    pub flow_type: FlowType,
    pub steps: Vec<StepDefinition>,
    #[serde(default)]
    pub due_date: Option<Timestamp>,
    #[serde(default)]
    pub notes: Option<String>,
}
