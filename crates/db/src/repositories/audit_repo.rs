//! Repository for the `audit_log_entries` table.
//!
//! Insert and read only. The table itself rejects UPDATE and DELETE.

use signoff_core::audit::AuditLogEntry;
use sqlx::{PgConnection, PgPool};

use crate::models::audit::{AuditEntryRow, ChainTail};

/// Column list for `audit_log_entries` SELECT and INSERT queries.
const COLUMNS: &str = "\
    id, entity_type, entity_id, sequence, action, actor_id, actor_name, \
    timestamp, metadata, prev_hash, integrity_hash";

pub struct AuditRepo;

impl AuditRepo {
    /// Serialize appends to one entity's chain until the transaction ends.
    pub async fn lock_chain(conn: &mut PgConnection, entity_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(entity_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Sequence and hash of the entity's most recent entry.
    pub async fn chain_tail(
        conn: &mut PgConnection,
        entity_id: &str,
    ) -> Result<Option<ChainTail>, sqlx::Error> {
        sqlx::query_as::<_, ChainTail>(
            "SELECT sequence, integrity_hash FROM audit_log_entries \
             WHERE entity_id = $1 ORDER BY sequence DESC LIMIT 1",
        )
        .bind(entity_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn insert(conn: &mut PgConnection, entry: &AuditLogEntry) -> Result<(), sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_log_entries ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        sqlx::query(&query)
            .bind(entry.id)
            .bind(&entry.entity_type)
            .bind(&entry.entity_id)
            .bind(entry.sequence)
            .bind(entry.action.as_str())
            .bind(&entry.actor_id)
            .bind(&entry.actor_name)
            .bind(entry.timestamp)
            .bind(&entry.metadata)
            .bind(&entry.prev_hash)
            .bind(&entry.integrity_hash)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// All entries for an entity in chain order.
    pub async fn list_for(pool: &PgPool, entity_id: &str) -> Result<Vec<AuditEntryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_log_entries \
             WHERE entity_id = $1 ORDER BY sequence ASC"
        );
        sqlx::query_as::<_, AuditEntryRow>(&query)
            .bind(entity_id)
            .fetch_all(pool)
            .await
    }
}
