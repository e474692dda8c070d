//! Audit trail model and integrity hash chain.
//!
//! Every accepted command produces one [`NewAuditEntry`]. The store seals it
//! into an [`AuditLogEntry`] by assigning the next per-entity sequence number
//! and chaining its hash to the previous entry of the same entity, which makes
//! after-the-fact edits detectable with [`verify_chain`].

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::hashing;
use crate::types::{new_id, EntityId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// Entity types
// ---------------------------------------------------------------------------

/// Known entity types recorded in the audit trail.
pub mod entity_types {
    pub const APPROVAL_FLOW: &str = "approval_flow";
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The command an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Initiate,
    Approve,
    Reject,
    Cancel,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Initiate => "initiate",
            AuditAction::Approve => "approve",
            AuditAction::Reject => "reject",
            AuditAction::Cancel => "cancel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initiate" => Some(AuditAction::Initiate),
            "approve" => Some(AuditAction::Approve),
            "reject" => Some(AuditAction::Reject),
            "cancel" => Some(AuditAction::Cancel),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// An audit entry that has not yet been appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub entity_type: String,
    pub entity_id: String,
    pub action: AuditAction,
    pub actor_id: UserId,
    pub actor_name: String,
    pub timestamp: Timestamp,
    pub metadata: serde_json::Value,
}

impl NewAuditEntry {
    /// Entry for a command against an approval flow.
    pub fn for_flow(
        flow_id: EntityId,
        action: AuditAction,
        actor_id: &str,
        actor_name: &str,
        timestamp: Timestamp,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            entity_type: entity_types::APPROVAL_FLOW.to_string(),
            entity_id: flow_id.to_string(),
            action,
            actor_id: actor_id.to_string(),
            actor_name: actor_name.to_string(),
            timestamp,
            metadata,
        }
    }

    /// Seal the entry as the `sequence`-th entry of its entity's trail.
    ///
    /// `prev_hash` is the integrity hash of the previous entry, or `None` for
    /// the first entry.
    pub fn seal(self, sequence: i64, prev_hash: Option<&str>) -> AuditLogEntry {
        let mut entry = AuditLogEntry {
            id: new_id(),
            sequence,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            action: self.action,
            actor_id: self.actor_id,
            actor_name: self.actor_name,
            timestamp: self.timestamp,
            metadata: self.metadata,
            prev_hash: prev_hash.map(str::to_string),
            integrity_hash: String::new(),
        };
        entry.integrity_hash = compute_integrity_hash(prev_hash, &entry.canonical_data());
        entry
    }
}

/// An appended, immutable audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: EntityId,
    /// 1-based position within the entity's trail.
    pub sequence: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub action: AuditAction,
    pub actor_id: UserId,
    pub actor_name: String,
    pub timestamp: Timestamp,
    pub metadata: serde_json::Value,
    pub prev_hash: Option<String>,
    pub integrity_hash: String,
}

impl AuditLogEntry {
    /// Canonical string form of the hashed content.
    ///
    /// `serde_json::Value` objects keep their keys sorted, so the metadata
    /// renders identically after a round trip through JSONB.
    fn canonical_data(&self) -> String {
        serde_json::json!({
            "id": self.id,
            "sequence": self.sequence,
            "entity_type": self.entity_type,
            "entity_id": self.entity_id,
            "action": self.action.as_str(),
            "actor_id": self.actor_id,
            "actor_name": self.actor_name,
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            "metadata": self.metadata,
        })
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Integrity hash computation
// ---------------------------------------------------------------------------

/// Known seed value for the first entry in each chain.
const CHAIN_SEED: &str = "SIGNOFF_AUDIT_CHAIN_SEED_V1";

/// Compute the SHA-256 integrity hash for an audit log entry.
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry_data: &str) -> String {
    let prev = prev_hash.unwrap_or(CHAIN_SEED);
    let combined = format!("{prev}|{entry_data}");
    hashing::sha256_hex(combined.as_bytes())
}

/// Outcome of re-deriving a trail's hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub valid: bool,
    pub entries_checked: usize,
    /// Sequence number of the first entry whose link or hash does not match.
    pub first_broken_sequence: Option<i64>,
}

/// Verify a single entity's trail, given in insertion order.
pub fn verify_chain(entries: &[AuditLogEntry]) -> ChainVerification {
    let mut prev: Option<&str> = None;
    for (i, entry) in entries.iter().enumerate() {
        let expected_sequence = i64::try_from(i).unwrap_or(i64::MAX).saturating_add(1);
        let linked = entry.prev_hash.as_deref() == prev && entry.sequence == expected_sequence;
        let recomputed = compute_integrity_hash(prev, &entry.canonical_data());
        if !linked || recomputed != entry.integrity_hash {
            return ChainVerification {
                valid: false,
                entries_checked: i + 1,
                first_broken_sequence: Some(entry.sequence),
            };
        }
        prev = Some(entry.integrity_hash.as_str());
    }
    ChainVerification {
        valid: true,
        entries_checked: entries.len(),
        first_broken_sequence: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
