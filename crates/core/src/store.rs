//! Persistence seams.
//!
//! The engine talks to storage only through these traits. [`MemoryStore`]
//! implements all three for tests and database-less deployments; the
//! Postgres implementation lives in `signoff-db`.
//!
//! ## Atomicity
//!
//! [`FlowStore::insert_flow`] and [`FlowStore::update_flow`] write the flow and
//! append its audit entry in one transaction: either both land or neither
//! does.
//!
//! ## Optimistic concurrency
//!
//! `update_flow` succeeds only while the stored version still equals
//! `expected_version`, and stores the flow with `expected_version + 1`.
//! Otherwise it returns [`StoreError::VersionConflict`] and writes nothing.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::audit::{AuditLogEntry, NewAuditEntry};
use crate::error::CoreError;
use crate::flow::{ApprovalFlow, FlowStatus};
use crate::template::FlowTemplate;
use crate::types::EntityId;

/// Errors returned by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// The flow was modified since it was read.
    #[error("version conflict on flow {flow_id}: expected version {expected_version}")]
    VersionConflict {
        flow_id: EntityId,
        expected_version: i64,
    },

    /// Connection, serialization or other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            StoreError::AlreadyExists { .. } => CoreError::Validation(err.to_string()),
            StoreError::VersionConflict { .. } => CoreError::ConcurrencyConflict(err.to_string()),
            StoreError::Backend(msg) => CoreError::Storage(msg),
        }
    }
}

/// Optional filters for [`FlowStore::list_flows`]. Unset fields match all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FlowFilter {
    pub project_id: Option<String>,
    pub document_id: Option<String>,
    pub status: Option<FlowStatus>,
}

impl FlowFilter {
    pub fn matches(&self, flow: &ApprovalFlow) -> bool {
        self.project_id.as_ref().map_or(true, |p| *p == flow.project_id)
            && self.document_id.as_ref().map_or(true, |d| *d == flow.document_id)
            && self.status.map_or(true, |s| s == flow.status)
    }
}

#[async_trait]
pub trait FlowStore: Send + Sync + 'static {
    /// Store a new flow together with its `initiate` entry.
    async fn insert_flow(
        &self,
        flow: ApprovalFlow,
        entry: NewAuditEntry,
    ) -> Result<(ApprovalFlow, AuditLogEntry), StoreError>;

    async fn get_flow(&self, flow_id: EntityId) -> Result<ApprovalFlow, StoreError>;

    /// Replace a flow if its stored version is `expected_version`, appending
    /// `entry` in the same transaction. Returns the flow as stored.
    async fn update_flow(
        &self,
        flow: ApprovalFlow,
        expected_version: i64,
        entry: NewAuditEntry,
    ) -> Result<(ApprovalFlow, AuditLogEntry), StoreError>;

    /// Flows matching `filter`, newest first.
    async fn list_flows(&self, filter: &FlowFilter) -> Result<Vec<ApprovalFlow>, StoreError>;
}

/// Append-only audit trail: no update, no delete.
#[async_trait]
pub trait AuditTrail: Send + Sync + 'static {
    /// Seal `entry` into its entity's chain and store it.
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, StoreError>;

    /// All entries for `entity_id`, in insertion order.
    async fn list_for(&self, entity_id: &str) -> Result<Vec<AuditLogEntry>, StoreError>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync + 'static {
    async fn get_template(&self, template_id: EntityId) -> Result<FlowTemplate, StoreError>;

    /// All templates ordered by name.
    async fn list_templates(&self) -> Result<Vec<FlowTemplate>, StoreError>;

    async fn insert_template(&self, template: FlowTemplate) -> Result<FlowTemplate, StoreError>;

    async fn update_template(&self, template: FlowTemplate) -> Result<FlowTemplate, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    flows: HashMap<EntityId, ApprovalFlow>,
    audit: HashMap<String, Vec<AuditLogEntry>>,
    templates: HashMap<EntityId, FlowTemplate>,
}

impl MemoryState {
    fn append(&mut self, entry: NewAuditEntry) -> AuditLogEntry {
        let trail = self.audit.entry(entry.entity_id.clone()).or_default();
        let prev = trail.last().map(|e| e.integrity_hash.clone());
        let sequence = i64::try_from(trail.len()).unwrap_or(i64::MAX).saturating_add(1);
        let sealed = entry.seal(sequence, prev.as_deref());
        trail.push(sealed.clone());
        sealed
    }
}

/// Process-local store guarded by a single `RwLock`, so a flow write and its
/// audit append are always observed together.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowStore for MemoryStore {
    async fn insert_flow(
        &self,
        flow: ApprovalFlow,
        entry: NewAuditEntry,
    ) -> Result<(ApprovalFlow, AuditLogEntry), StoreError> {
        let mut state = self.state.write().await;
        if state.flows.contains_key(&flow.id) {
            return Err(StoreError::AlreadyExists {
                entity: "ApprovalFlow",
                id: flow.id.to_string(),
            });
        }
        let sealed = state.append(entry);
        state.flows.insert(flow.id, flow.clone());
        Ok((flow, sealed))
    }

    async fn get_flow(&self, flow_id: EntityId) -> Result<ApprovalFlow, StoreError> {
        self.state
            .read()
            .await
            .flows
            .get(&flow_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "ApprovalFlow",
                id: flow_id.to_string(),
            })
    }

    async fn update_flow(
        &self,
        mut flow: ApprovalFlow,
        expected_version: i64,
        entry: NewAuditEntry,
    ) -> Result<(ApprovalFlow, AuditLogEntry), StoreError> {
        let mut state = self.state.write().await;
        let stored_version = state
            .flows
            .get(&flow.id)
            .map(|f| f.version)
            .ok_or_else(|| StoreError::NotFound {
                entity: "ApprovalFlow",
                id: flow.id.to_string(),
            })?;
        if stored_version != expected_version {
            return Err(StoreError::VersionConflict {
                flow_id: flow.id,
                expected_version,
            });
        }
        flow.version = expected_version + 1;
        let sealed = state.append(entry);
        state.flows.insert(flow.id, flow.clone());
        Ok((flow, sealed))
    }

    async fn list_flows(&self, filter: &FlowFilter) -> Result<Vec<ApprovalFlow>, StoreError> {
        let state = self.state.read().await;
        let mut flows: Vec<ApprovalFlow> = state
            .flows
            .values()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect();
        flows.sort_by(|a, b| b.initiated_at.cmp(&a.initiated_at).then(b.id.cmp(&a.id)));
        Ok(flows)
    }
}

#[async_trait]
impl AuditTrail for MemoryStore {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, StoreError> {
        Ok(self.state.write().await.append(entry))
    }

    async fn list_for(&self, entity_id: &str) -> Result<Vec<AuditLogEntry>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .audit
            .get(entity_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn get_template(&self, template_id: EntityId) -> Result<FlowTemplate, StoreError> {
        self.state
            .read()
            .await
            .templates
            .get(&template_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "FlowTemplate",
                id: template_id.to_string(),
            })
    }

    async fn list_templates(&self) -> Result<Vec<FlowTemplate>, StoreError> {
        let mut templates: Vec<FlowTemplate> =
            self.state.read().await.templates.values().cloned().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(templates)
    }

    async fn insert_template(&self, template: FlowTemplate) -> Result<FlowTemplate, StoreError> {
        let mut state = self.state.write().await;
        if state.templates.contains_key(&template.id) {
            return Err(StoreError::AlreadyExists {
                entity: "FlowTemplate",
                id: template.id.to_string(),
            });
        }
        state.templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn update_template(&self, template: FlowTemplate) -> Result<FlowTemplate, StoreError> {
        let mut state = self.state.write().await;
        match state.templates.get_mut(&template.id) {
            Some(slot) => {
                *slot = template.clone();
                Ok(template)
            }
            None => Err(StoreError::NotFound {
                entity: "FlowTemplate",
                id: template.id.to_string(),
            }),
        }
    }
}
