//! Postgres implementation of the `signoff_core` store traits.
//!
//! Flow writes and their audit appends share one transaction. Appends take a
//! transaction-scoped advisory lock on the entity id so concurrent writers in
//! different processes cannot fork a chain.

use async_trait::async_trait;
use signoff_core::audit::{AuditLogEntry, NewAuditEntry};
use signoff_core::flow::ApprovalFlow;
use signoff_core::store::{AuditTrail, FlowFilter, FlowStore, StoreError, TemplateStore};
use signoff_core::template::FlowTemplate;
use signoff_core::types::EntityId;
use sqlx::PgConnection;

use crate::repositories::{AuditRepo, FlowRepo, TemplateRepo};
use crate::DbPool;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map a sqlx error into a [`StoreError`].
///
/// Unique violations (SQLSTATE 23505) become `AlreadyExists`; everything else
/// is a backend failure.
fn classify_sqlx_error(entity: &'static str, id: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::AlreadyExists {
                entity,
                id: id.to_string(),
            };
        }
    }
    tracing::error!(error = %err, entity, id, "Database error");
    StoreError::Backend(err.to_string())
}

fn backend(err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, "Database error");
    StoreError::Backend(err.to_string())
}

/// Seal `entry` onto its chain and insert it, inside the caller's
/// transaction.
async fn append_in_tx(
    conn: &mut PgConnection,
    entry: NewAuditEntry,
) -> Result<AuditLogEntry, StoreError> {
    AuditRepo::lock_chain(&mut *conn, &entry.entity_id)
        .await
        .map_err(backend)?;
    let tail = AuditRepo::chain_tail(&mut *conn, &entry.entity_id)
        .await
        .map_err(backend)?;
    let (sequence, prev) = match tail {
        Some(t) => (t.sequence + 1, Some(t.integrity_hash)),
        None => (1, None),
    };
    let sealed = entry.seal(sequence, prev.as_deref());
    AuditRepo::insert(&mut *conn, &sealed)
        .await
        .map_err(|e| classify_sqlx_error("AuditLogEntry", &sealed.id.to_string(), e))?;
    Ok(sealed)
}

#[async_trait]
impl FlowStore for PgStore {
    async fn insert_flow(
        &self,
        flow: ApprovalFlow,
        entry: NewAuditEntry,
    ) -> Result<(ApprovalFlow, AuditLogEntry), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        FlowRepo::insert(&mut *tx, &flow)
            .await
            .map_err(|e| classify_sqlx_error("ApprovalFlow", &flow.id.to_string(), e))?;
        let sealed = append_in_tx(&mut *tx, entry).await?;
        tx.commit().await.map_err(backend)?;
        Ok((flow, sealed))
    }

    async fn get_flow(&self, flow_id: EntityId) -> Result<ApprovalFlow, StoreError> {
        let row = FlowRepo::find_by_id(&self.pool, flow_id)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "ApprovalFlow",
                id: flow_id.to_string(),
            })?;
        ApprovalFlow::try_from(row)
    }

    async fn update_flow(
        &self,
        mut flow: ApprovalFlow,
        expected_version: i64,
        entry: NewAuditEntry,
    ) -> Result<(ApprovalFlow, AuditLogEntry), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let updated = FlowRepo::update_versioned(&mut *tx, &flow, expected_version)
            .await
            .map_err(backend)?;
        if updated == 0 {
            let exists = FlowRepo::exists(&mut *tx, flow.id).await.map_err(backend)?;
            // Dropping `tx` rolls back.
            return Err(if exists {
                StoreError::VersionConflict {
                    flow_id: flow.id,
                    expected_version,
                }
            } else {
                StoreError::NotFound {
                    entity: "ApprovalFlow",
                    id: flow.id.to_string(),
                }
            });
        }
        flow.version = expected_version + 1;
        let sealed = append_in_tx(&mut *tx, entry).await?;
        tx.commit().await.map_err(backend)?;
        Ok((flow, sealed))
    }

    async fn list_flows(&self, filter: &FlowFilter) -> Result<Vec<ApprovalFlow>, StoreError> {
        FlowRepo::list(&self.pool, filter)
            .await
            .map_err(backend)?
            .into_iter()
            .map(ApprovalFlow::try_from)
            .collect()
    }
}

#[async_trait]
impl AuditTrail for PgStore {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let sealed = append_in_tx(&mut *tx, entry).await?;
        tx.commit().await.map_err(backend)?;
        Ok(sealed)
    }

    async fn list_for(&self, entity_id: &str) -> Result<Vec<AuditLogEntry>, StoreError> {
        AuditRepo::list_for(&self.pool, entity_id)
            .await
            .map_err(backend)?
            .into_iter()
            .map(AuditLogEntry::try_from)
            .collect()
    }
}

#[async_trait]
impl TemplateStore for PgStore {
    async fn get_template(&self, template_id: EntityId) -> Result<FlowTemplate, StoreError> {
        let row = TemplateRepo::find_by_id(&self.pool, template_id)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "FlowTemplate",
                id: template_id.to_string(),
            })?;
        FlowTemplate::try_from(row)
    }

    async fn list_templates(&self) -> Result<Vec<FlowTemplate>, StoreError> {
        TemplateRepo::list(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(FlowTemplate::try_from)
            .collect()
    }

    async fn insert_template(&self, template: FlowTemplate) -> Result<FlowTemplate, StoreError> {
        TemplateRepo::insert(&self.pool, &template)
            .await
            .map_err(|e| classify_sqlx_error("FlowTemplate", &template.id.to_string(), e))?;
        Ok(template)
    }

    async fn update_template(&self, template: FlowTemplate) -> Result<FlowTemplate, StoreError> {
        let found = TemplateRepo::update(&self.pool, &template)
            .await
            .map_err(backend)?;
        if !found {
            return Err(StoreError::NotFound {
                entity: "FlowTemplate",
                id: template.id.to_string(),
            });
        }
        Ok(template)
    }
}
