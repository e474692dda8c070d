//! Row model for the append-only `audit_log_entries` table.
//!
//! No `updated_at`: rows are never modified after insert.

use signoff_core::audit::{AuditAction, AuditLogEntry};
use signoff_core::store::StoreError;
use signoff_core::types::{EntityId, Timestamp};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct AuditEntryRow {
    pub id: EntityId,
    pub entity_type: String,
    pub entity_id: String,
    pub sequence: i64,
    pub action: String,
    pub actor_id: String,
    pub actor_name: String,
    pub timestamp: Timestamp,
    pub metadata: serde_json::Value,
    pub prev_hash: Option<String>,
    pub integrity_hash: String,
}

/// Tail of an entity's chain, used to seal the next entry.
#[derive(Debug, Clone, FromRow)]
pub struct ChainTail {
    pub sequence: i64,
    pub integrity_hash: String,
}

impl TryFrom<AuditEntryRow> for AuditLogEntry {
    type Error = StoreError;

    fn try_from(row: AuditEntryRow) -> Result<Self, Self::Error> {
        let action = AuditAction::parse(&row.action).ok_or_else(|| {
            StoreError::Backend(format!(
                "audit entry {}: unknown action '{}'",
                row.id, row.action
            ))
        })?;
        Ok(AuditLogEntry {
            id: row.id,
            sequence: row.sequence,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            action,
            actor_id: row.actor_id,
            actor_name: row.actor_name,
            timestamp: row.timestamp,
            metadata: row.metadata,
            prev_hash: row.prev_hash,
            integrity_hash: row.integrity_hash,
        })
    }
}
