//! Shared-state approval engine.
//!
//! [`ApprovalEngine`] wires the pure transitions in [`crate::engine`] to the
//! store traits. Commands against one flow run one at a time behind a per-flow
//! async mutex; commands against different flows run in parallel. The store's
//! version check covers writers in other processes: on a conflict the command
//! is re-read and re-applied up to `max_conflict_retries` times.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::audit::{self, AuditLogEntry, ChainVerification, NewAuditEntry};
use crate::engine::{self, ApproveCommand, CancelCommand, RejectCommand};
use crate::error::CoreError;
use crate::flow::{Actor, ApprovalFlow, FlowDefinition};
use crate::progress;
use crate::store::{AuditTrail, FlowFilter, FlowStore, MemoryStore, StoreError, TemplateStore};
use crate::template::{self, DocumentRef, FlowTemplate, TemplateInput};
use crate::types::{new_id, now, EntityId, Timestamp};

pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Result of an accepted command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub flow: ApprovalFlow,
    pub audit_entry: AuditLogEntry,
}

pub struct ApprovalEngine {
    flows: Arc<dyn FlowStore>,
    audit: Arc<dyn AuditTrail>,
    templates: Arc<dyn TemplateStore>,
    locks: Mutex<HashMap<EntityId, Arc<Mutex<()>>>>,
    max_conflict_retries: u32,
}

impl ApprovalEngine {
    pub fn new(
        flows: Arc<dyn FlowStore>,
        audit: Arc<dyn AuditTrail>,
        templates: Arc<dyn TemplateStore>,
    ) -> Self {
        Self {
            flows,
            audit,
            templates,
            locks: Mutex::new(HashMap::new()),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    /// Engine over a single [`MemoryStore`].
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store.clone(), store)
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /* --------------------------------------------------------------- */
    /* Commands                                                        */
    /* --------------------------------------------------------------- */

    /// Start a flow from an ad-hoc definition.
    pub async fn initiate(
        &self,
        definition: FlowDefinition,
        initiator: &Actor,
    ) -> Result<CommandOutcome, CoreError> {
        let (flow, entry) = engine::initiate(definition, initiator, now())?;
        self.insert(flow, entry).await
    }

    /// Start a flow from a stored template.
    pub async fn initiate_from_template(
        &self,
        template_id: EntityId,
        document: DocumentRef,
        initiator: &Actor,
    ) -> Result<CommandOutcome, CoreError> {
        let template = self.templates.get_template(template_id).await?;
        let (flow, entry) = template::from_template(&template, document, initiator, now())?;
        self.insert(flow, entry).await
    }

    pub async fn approve(
        &self,
        flow_id: EntityId,
        cmd: ApproveCommand,
    ) -> Result<CommandOutcome, CoreError> {
        self.transition(flow_id, "approve", &cmd.approver.id, |flow, at| {
            engine::approve(flow, &cmd, at)
        })
        .await
    }

    pub async fn reject(
        &self,
        flow_id: EntityId,
        cmd: RejectCommand,
    ) -> Result<CommandOutcome, CoreError> {
        self.transition(flow_id, "reject", &cmd.approver.id, |flow, at| {
            engine::reject(flow, &cmd, at)
        })
        .await
    }

    pub async fn cancel(
        &self,
        flow_id: EntityId,
        cmd: CancelCommand,
    ) -> Result<CommandOutcome, CoreError> {
        self.transition(flow_id, "cancel", &cmd.actor.id, |flow, at| {
            engine::cancel(flow, &cmd, at)
        })
        .await
    }

    async fn insert(
        &self,
        flow: ApprovalFlow,
        entry: NewAuditEntry,
    ) -> Result<CommandOutcome, CoreError> {
        let (flow, audit_entry) = self
            .flows
            .insert_flow(flow, entry)
            .await
            .map_err(log_store_error)?;
        tracing::info!(
            flow_id = %flow.id,
            document_id = %flow.document_id,
            flow_type = %flow.flow_type,
            steps = flow.steps.len(),
            actor_id = %flow.initiated_by,
            "Approval flow initiated"
        );
        Ok(CommandOutcome { flow, audit_entry })
    }

    /// Run one command under the flow's lock. The lock entry is released
    /// again on every exit path once no other command is waiting on it, so
    /// commands against unknown ids leave nothing behind.
    async fn transition<F>(
        &self,
        flow_id: EntityId,
        action: &'static str,
        actor_id: &str,
        apply: F,
    ) -> Result<CommandOutcome, CoreError>
    where
        F: Fn(&mut ApprovalFlow, Timestamp) -> Result<NewAuditEntry, CoreError> + Send,
    {
        let lock = self.flow_lock(flow_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.apply_with_retries(flow_id, action, actor_id, &apply).await
        };
        self.release_lock(flow_id, lock).await;
        result
    }

    /// Load, apply and persist, re-applying on version conflicts.
    async fn apply_with_retries<F>(
        &self,
        flow_id: EntityId,
        action: &'static str,
        actor_id: &str,
        apply: &F,
    ) -> Result<CommandOutcome, CoreError>
    where
        F: Fn(&mut ApprovalFlow, Timestamp) -> Result<NewAuditEntry, CoreError> + Send,
    {
        let mut retries = 0u32;
        loop {
            let mut flow = self.flows.get_flow(flow_id).await.map_err(log_store_error)?;
            let expected_version = flow.version;
            let entry = apply(&mut flow, now())?;

            match self.flows.update_flow(flow, expected_version, entry).await {
                Ok((flow, audit_entry)) => {
                    tracing::info!(
                        flow_id = %flow_id,
                        action,
                        actor_id,
                        status = %flow.status,
                        step_number = flow.current_step_number,
                        version = flow.version,
                        "Approval command applied"
                    );
                    return Ok(CommandOutcome { flow, audit_entry });
                }
                Err(StoreError::VersionConflict { .. }) if retries < self.max_conflict_retries => {
                    retries += 1;
                    tracing::warn!(
                        flow_id = %flow_id,
                        action,
                        expected_version,
                        retry = retries,
                        "Version conflict, re-applying command"
                    );
                }
                Err(StoreError::VersionConflict { .. }) => {
                    tracing::warn!(
                        flow_id = %flow_id,
                        action,
                        retries,
                        "Version conflict retries exhausted"
                    );
                    return Err(CoreError::ConcurrencyConflict(format!(
                        "Flow {flow_id} kept changing; gave up after {retries} retries"
                    )));
                }
                Err(err) => return Err(log_store_error(err)),
            }
        }
    }

    async fn flow_lock(&self, flow_id: EntityId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(flow_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry when only the map and `lock` still reference it.
    /// Clones are taken under the map lock, so the count cannot grow here.
    async fn release_lock(&self, flow_id: EntityId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&flow_id);
        }
    }

    /* --------------------------------------------------------------- */
    /* Queries                                                         */
    /* --------------------------------------------------------------- */

    pub async fn get_flow(&self, flow_id: EntityId) -> Result<ApprovalFlow, CoreError> {
        Ok(self.flows.get_flow(flow_id).await?)
    }

    pub async fn list_flows(&self, filter: &FlowFilter) -> Result<Vec<ApprovalFlow>, CoreError> {
        Ok(self.flows.list_flows(filter).await?)
    }

    /// Open flows where `user_id` can sign right now.
    pub async fn list_actionable_for(&self, user_id: &str) -> Result<Vec<ApprovalFlow>, CoreError> {
        let flows = self.flows.list_flows(&FlowFilter::default()).await?;
        Ok(flows
            .into_iter()
            .filter(|f| progress::can_act(f, user_id))
            .collect())
    }

    pub async fn list_audit_trail(&self, flow_id: EntityId) -> Result<Vec<AuditLogEntry>, CoreError> {
        self.flows.get_flow(flow_id).await?;
        Ok(self.audit.list_for(&flow_id.to_string()).await?)
    }

    /// The flow's trail together with the result of re-deriving its hash
    /// chain from the stored entries.
    pub async fn verified_audit_trail(
        &self,
        flow_id: EntityId,
    ) -> Result<(Vec<AuditLogEntry>, ChainVerification), CoreError> {
        let entries = self.list_audit_trail(flow_id).await?;
        let result = audit::verify_chain(&entries);
        if !result.valid {
            tracing::error!(
                flow_id = %flow_id,
                first_broken_sequence = ?result.first_broken_sequence,
                "Audit chain verification failed"
            );
        }
        Ok((entries, result))
    }

    pub async fn verify_audit_trail(
        &self,
        flow_id: EntityId,
    ) -> Result<ChainVerification, CoreError> {
        Ok(self.verified_audit_trail(flow_id).await?.1)
    }

    /* --------------------------------------------------------------- */
    /* Templates                                                       */
    /* --------------------------------------------------------------- */

    pub async fn create_template(&self, input: TemplateInput) -> Result<FlowTemplate, CoreError> {
        let template = FlowTemplate::create(new_id(), input, now());
        template::validate_template(&template)?;
        let template = self.templates.insert_template(template).await?;
        tracing::info!(template_id = %template.id, name = %template.name, "Flow template created");
        Ok(template)
    }

    pub async fn update_template(
        &self,
        template_id: EntityId,
        input: TemplateInput,
    ) -> Result<FlowTemplate, CoreError> {
        let existing = self.templates.get_template(template_id).await?;
        let template = existing.revise(input, now());
        template::validate_template(&template)?;
        let template = self.templates.update_template(template).await?;
        tracing::info!(template_id = %template.id, "Flow template updated");
        Ok(template)
    }

    pub async fn get_template(&self, template_id: EntityId) -> Result<FlowTemplate, CoreError> {
        Ok(self.templates.get_template(template_id).await?)
    }

    pub async fn list_templates(&self) -> Result<Vec<FlowTemplate>, CoreError> {
        Ok(self.templates.list_templates().await?)
    }
}

fn log_store_error(err: StoreError) -> CoreError {
    if let StoreError::Backend(msg) = &err {
        tracing::error!(error = %msg, "Approval store failure");
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::flow::{
        Approver, FlowStatus, FlowType, SignatureStatus, StepDefinition, StepStatus,
    };
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    fn approver(id: &str) -> Approver {
        Approver {
            id: id.into(),
            name: format!("User {id}"),
            email: format!("{id}@studio.test"),
            role: "architect".into(),
        }
    }

    fn definition(flow_type: FlowType, steps: &[(&[&str], u32)]) -> FlowDefinition {
        FlowDefinition {
            document_id: "doc-1".into(),
            document_name: "Ground floor plan".into(),
            project_id: "proj-1".into(),
            project_name: None,
            template_id: None,
            flow_type,
            steps: steps
                .iter()
                .map(|(ids, required)| StepDefinition {
                    approvers: ids.iter().map(|id| approver(id)).collect(),
                    required_approvals: *required,
                })
                .collect(),
            due_date: None,
            notes: None,
        }
    }

    fn approve_cmd(flow: &ApprovalFlow, step_no: usize, user: &str) -> ApproveCommand {
        ApproveCommand {
            step_id: flow.steps[step_no - 1].id,
            approver: Actor::new(user, format!("User {user}")),
            comments: None,
            signature_proof: format!("proof-{user}"),
        }
    }

    fn pm() -> Actor {
        Actor::new("pm", "Project Manager")
    }

    #[tokio::test]
    async fn concurrent_duplicate_approvals_yield_one_success() {
        let engine = Arc::new(ApprovalEngine::in_memory());
        let flow = engine
            .initiate(definition(FlowType::Parallel, &[(&["a", "b"], 2)]), &pm())
            .await
            .unwrap()
            .flow;

        let flow_id = flow.id;
        let mut handles = Vec::new();
        for _ in 0..2 {
            let engine = engine.clone();
            let cmd = approve_cmd(&flow, 1, "a");
            handles.push(tokio::spawn(async move { engine.approve(flow_id, cmd).await }));
        }

        let mut ok = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(CoreError::DuplicateSignature(_)) => duplicates += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((ok, duplicates), (1, 1));

        let stored = engine.get_flow(flow.id).await.unwrap();
        assert_eq!(stored.steps[0].current_approvals, 1);
        assert_eq!(stored.version, 1);
        assert_eq!(engine.list_audit_trail(flow.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_distinct_approvers_both_land() {
        let engine = Arc::new(ApprovalEngine::in_memory());
        let flow = engine
            .initiate(definition(FlowType::Parallel, &[(&["a", "b"], 2)]), &pm())
            .await
            .unwrap()
            .flow;

        let flow_id = flow.id;
        let a = {
            let engine = engine.clone();
            let cmd = approve_cmd(&flow, 1, "a");
            tokio::spawn(async move { engine.approve(flow_id, cmd).await })
        };
        let b = {
            let engine = engine.clone();
            let cmd = approve_cmd(&flow, 1, "b");
            tokio::spawn(async move { engine.approve(flow_id, cmd).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let stored = engine.get_flow(flow.id).await.unwrap();
        assert_eq!(stored.status, FlowStatus::Approved);
        assert_eq!(stored.steps[0].current_approvals, 2);
        assert!(engine.verify_audit_trail(flow.id).await.unwrap().valid);
    }

    #[tokio::test]
    async fn failed_command_leaves_flow_and_trail_untouched() {
        let engine = ApprovalEngine::in_memory();
        let flow = engine
            .initiate(definition(FlowType::Sequential, &[(&["a"], 1)]), &pm())
            .await
            .unwrap()
            .flow;

        let result = engine
            .reject(
                flow.id,
                RejectCommand {
                    step_id: flow.steps[0].id,
                    approver: Actor::new("a", "A"),
                    reason: " ".into(),
                },
            )
            .await;
        assert_matches!(result, Err(CoreError::Validation(_)));

        assert_eq!(engine.get_flow(flow.id).await.unwrap(), flow);
        assert_eq!(engine.list_audit_trail(flow.id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_sequential_steps_advance_once_in_order() {
        for _ in 0..25 {
            let engine = Arc::new(ApprovalEngine::in_memory());
            let flow = engine
                .initiate(definition(FlowType::Sequential, &[(&["a"], 1), (&["c"], 1)]), &pm())
                .await
                .unwrap()
                .flow;
            let flow_id = flow.id;

            let second = {
                let engine = engine.clone();
                let cmd = approve_cmd(&flow, 2, "c");
                tokio::spawn(async move { engine.approve(flow_id, cmd).await })
            };
            let first = {
                let engine = engine.clone();
                let cmd = approve_cmd(&flow, 1, "a");
                tokio::spawn(async move { engine.approve(flow_id, cmd).await })
            };
            first.await.unwrap().unwrap();
            let second = second.await.unwrap();
            assert_matches!(second, Ok(_) | Err(CoreError::StepNotActionable(_)));

            let stored = engine.get_flow(flow_id).await.unwrap();
            assert_eq!(stored.current_step_number, 2);
            assert_eq!(stored.steps[0].status, StepStatus::Approved);
            let step_two_signed = stored.steps[1].signatures[0].status == SignatureStatus::Signed;
            assert_eq!(step_two_signed, second.is_ok());

            let trail = engine.list_audit_trail(flow_id).await.unwrap();
            let step_numbers: Vec<u64> = trail[1..]
                .iter()
                .map(|e| e.metadata["step_number"].as_u64().unwrap())
                .collect();
            if second.is_ok() {
                assert_eq!(step_numbers, [1, 2]);
            } else {
                assert_eq!(step_numbers, [1]);
            }
        }
    }

    #[tokio::test]
    async fn lock_entries_are_released_after_commands() {
        let engine = ApprovalEngine::in_memory();
        for _ in 0..50 {
            let cancel = CancelCommand {
                actor: pm(),
                reason: "Withdrawn".into(),
            };
            assert_matches!(
                engine.cancel(new_id(), cancel).await,
                Err(CoreError::NotFound { .. })
            );
        }
        assert!(engine.locks.lock().await.is_empty());

        let flow = engine
            .initiate(definition(FlowType::Sequential, &[(&["a"], 1), (&["c"], 1)]), &pm())
            .await
            .unwrap()
            .flow;
        engine.approve(flow.id, approve_cmd(&flow, 1, "a")).await.unwrap();
        assert!(engine.locks.lock().await.is_empty());

        // Still open, and the flow keeps accepting commands after release.
        engine.approve(flow.id, approve_cmd(&flow, 2, "c")).await.unwrap();
        assert!(engine.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn full_lifecycle_produces_verifiable_trail() {
        let engine = ApprovalEngine::in_memory();
        let flow = engine
            .initiate(
                definition(FlowType::Sequential, &[(&["a", "b"], 1), (&["c"], 1)]),
                &pm(),
            )
            .await
            .unwrap()
            .flow;

        engine.approve(flow.id, approve_cmd(&flow, 1, "a")).await.unwrap();
        let outcome = engine.approve(flow.id, approve_cmd(&flow, 2, "c")).await.unwrap();
        assert_eq!(outcome.flow.status, FlowStatus::Approved);
        assert_eq!(outcome.audit_entry.sequence, 3);

        let (trail, check) = engine.verified_audit_trail(flow.id).await.unwrap();
        let actions: Vec<&str> = trail.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, ["initiate", "approve", "approve"]);
        assert_eq!(trail, engine.list_audit_trail(flow.id).await.unwrap());
        assert!(check.valid);
        assert_eq!(check.entries_checked, 3);
        assert_eq!(engine.verify_audit_trail(flow.id).await.unwrap(), check);
    }

    #[tokio::test]
    async fn inbox_lists_only_actionable_flows() {
        let engine = ApprovalEngine::in_memory();
        let seq = engine
            .initiate(definition(FlowType::Sequential, &[(&["a"], 1), (&["c"], 1)]), &pm())
            .await
            .unwrap()
            .flow;
        engine
            .initiate(definition(FlowType::Parallel, &[(&["c"], 1)]), &pm())
            .await
            .unwrap();

        assert_eq!(engine.list_actionable_for("a").await.unwrap().len(), 1);
        assert_eq!(engine.list_actionable_for("c").await.unwrap().len(), 1);

        engine.approve(seq.id, approve_cmd(&seq, 1, "a")).await.unwrap();
        assert!(engine.list_actionable_for("a").await.unwrap().is_empty());
        assert_eq!(engine.list_actionable_for("c").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_flow_and_template_are_not_found() {
        let engine = ApprovalEngine::in_memory();
        assert_matches!(
            engine.get_flow(new_id()).await,
            Err(CoreError::NotFound { entity: "ApprovalFlow", .. })
        );
        assert_matches!(
            engine.list_audit_trail(new_id()).await,
            Err(CoreError::NotFound { .. })
        );
        let doc = DocumentRef {
            document_id: "d".into(),
            document_name: "D".into(),
            project_id: "p".into(),
            project_name: None,
            due_date: None,
            notes: None,
        };
        assert_matches!(
            engine.initiate_from_template(new_id(), doc, &pm()).await,
            Err(CoreError::NotFound { entity: "FlowTemplate", .. })
        );
    }

    #[tokio::test]
    async fn templates_are_validated_and_instantiated() {
        let engine = ApprovalEngine::in_memory();
        let bad = TemplateInput {
            name: "Structural".into(),
            document_type: "calc".into(),
            flow_type: FlowType::Sequential,
            steps: vec![],
        };
        assert_matches!(engine.create_template(bad).await, Err(CoreError::Validation(_)));

        let template = engine
            .create_template(TemplateInput {
                name: "Structural".into(),
                document_type: "calc".into(),
                flow_type: FlowType::Unanimous,
                steps: vec![StepDefinition {
                    approvers: vec![approver("a"), approver("b")],
                    required_approvals: 1,
                }],
            })
            .await
            .unwrap();

        let doc = DocumentRef {
            document_id: "calc-1".into(),
            document_name: "Beam schedule".into(),
            project_id: "p".into(),
            project_name: None,
            due_date: None,
            notes: None,
        };
        let flow = engine
            .initiate_from_template(template.id, doc, &pm())
            .await
            .unwrap()
            .flow;
        assert_eq!(flow.template_id, Some(template.id));
        assert_eq!(flow.steps[0].required_approvals, 2);

        let edited = engine
            .update_template(
                template.id,
                TemplateInput {
                    name: "Structural v2".into(),
                    document_type: "calc".into(),
                    flow_type: FlowType::Parallel,
                    steps: template.steps.clone(),
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.name, "Structural v2");

        let unchanged = engine.get_flow(flow.id).await.unwrap();
        assert_eq!(unchanged.flow_type, FlowType::Unanimous);
    }

    /* --------------------------------------------------------------- */
    /* Conflict injection                                              */
    /* --------------------------------------------------------------- */

    /// Delegates to a `MemoryStore` but reports a version conflict on the
    /// first `conflicts` updates.
    struct ConflictingStore {
        inner: MemoryStore,
        conflicts: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl FlowStore for ConflictingStore {
        async fn insert_flow(
            &self,
            flow: ApprovalFlow,
            entry: NewAuditEntry,
        ) -> Result<(ApprovalFlow, AuditLogEntry), StoreError> {
            self.inner.insert_flow(flow, entry).await
        }

        async fn get_flow(&self, flow_id: EntityId) -> Result<ApprovalFlow, StoreError> {
            self.inner.get_flow(flow_id).await
        }

        async fn update_flow(
            &self,
            flow: ApprovalFlow,
            expected_version: i64,
            entry: NewAuditEntry,
        ) -> Result<(ApprovalFlow, AuditLogEntry), StoreError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.conflicts {
                return Err(StoreError::VersionConflict {
                    flow_id: flow.id,
                    expected_version,
                });
            }
            self.inner.update_flow(flow, expected_version, entry).await
        }

        async fn list_flows(&self, filter: &FlowFilter) -> Result<Vec<ApprovalFlow>, StoreError> {
            self.inner.list_flows(filter).await
        }
    }

    fn conflicting_engine(conflicts: u32) -> (ApprovalEngine, Arc<ConflictingStore>) {
        let store = Arc::new(ConflictingStore {
            inner: MemoryStore::new(),
            conflicts,
            attempts: AtomicU32::new(0),
        });
        let other = Arc::new(MemoryStore::new());
        let engine = ApprovalEngine::new(store.clone(), other.clone(), other);
        (engine, store)
    }

    #[tokio::test]
    async fn transient_conflicts_are_retried() {
        let (engine, store) = conflicting_engine(2);
        let flow = engine
            .initiate(definition(FlowType::Parallel, &[(&["a"], 1)]), &pm())
            .await
            .unwrap()
            .flow;

        let outcome = engine.approve(flow.id, approve_cmd(&flow, 1, "a")).await.unwrap();
        assert_eq!(outcome.flow.status, FlowStatus::Approved);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_concurrency_conflict() {
        let (engine, store) = conflicting_engine(u32::MAX);
        let engine = engine.with_max_conflict_retries(2);
        let flow = engine
            .initiate(definition(FlowType::Parallel, &[(&["a"], 1)]), &pm())
            .await
            .unwrap()
            .flow;

        let result = engine.approve(flow.id, approve_cmd(&flow, 1, "a")).await;
        assert_matches!(result, Err(CoreError::ConcurrencyConflict(_)));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);

        let stored = engine.get_flow(flow.id).await.unwrap();
        assert_eq!(stored.steps[0].current_approvals, 0);
    }
}
