//! Postgres store integration tests.
//!
//! These need a running Postgres reachable through `DATABASE_URL`; run them
//! with `cargo test -p signoff-db -- --ignored`.

use assert_matches::assert_matches;
use signoff_core::audit::{verify_chain, AuditAction, NewAuditEntry};
use signoff_core::engine;
use signoff_core::flow::{Actor, Approver, FlowDefinition, FlowStatus, FlowType, StepDefinition};
use signoff_core::store::{AuditTrail, FlowFilter, FlowStore, StoreError, TemplateStore};
use signoff_core::template::{FlowTemplate, TemplateInput};
use signoff_core::types::{new_id, now};
use signoff_db::PgStore;
use sqlx::PgPool;

fn definition(project: &str) -> FlowDefinition {
    FlowDefinition {
        document_id: "doc-1".into(),
        document_name: "Stair details".into(),
        project_id: project.into(),
        project_name: None,
        template_id: None,
        flow_type: FlowType::Sequential,
        steps: vec![StepDefinition {
            approvers: vec![Approver {
                id: "a".into(),
                name: "A".into(),
                email: "a@studio.test".into(),
                role: "architect".into(),
            }],
            required_approvals: 1,
        }],
        due_date: None,
        notes: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_flow_round_trip_and_versioned_update(pool: PgPool) {
    signoff_db::health_check(&pool).await.unwrap();
    let store = PgStore::new(pool);

    let (flow, entry) = engine::initiate(definition("p1"), &Actor::new("pm", "PM"), now()).unwrap();
    store.insert_flow(flow.clone(), entry).await.unwrap();
    assert_eq!(store.get_flow(flow.id).await.unwrap(), flow);

    let mut signed = flow.clone();
    let cmd = engine::ApproveCommand {
        step_id: signed.steps[0].id,
        approver: Actor::new("a", "A"),
        comments: Some("ok".into()),
        signature_proof: "proof".into(),
    };
    let entry = engine::approve(&mut signed, &cmd, now()).unwrap();
    let (stored, sealed) = store.update_flow(signed, 0, entry).await.unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.status, FlowStatus::Approved);
    assert_eq!(sealed.sequence, 2);

    let reloaded = store.get_flow(flow.id).await.unwrap();
    assert_eq!(reloaded, stored);

    let trail = store.list_for(&flow.id.to_string()).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert!(verify_chain(&trail).valid);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_stale_update_conflicts(pool: PgPool) {
    let store = PgStore::new(pool);
    let (flow, entry) = engine::initiate(definition("p1"), &Actor::new("pm", "PM"), now()).unwrap();
    store.insert_flow(flow.clone(), entry).await.unwrap();

    let touch = || {
        NewAuditEntry::for_flow(flow.id, AuditAction::Cancel, "pm", "PM", now(), serde_json::json!({}))
    };
    store.update_flow(flow.clone(), 0, touch()).await.unwrap();

    let result = store.update_flow(flow.clone(), 0, touch()).await;
    assert_matches!(result, Err(StoreError::VersionConflict { expected_version: 0, .. }));
    assert_eq!(store.list_for(&flow.id.to_string()).await.unwrap().len(), 2);

    let missing = store.update_flow(
        engine::initiate(definition("p1"), &Actor::new("pm", "PM"), now()).unwrap().0,
        0,
        touch(),
    );
    assert_matches!(missing.await, Err(StoreError::NotFound { .. }));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_append_chains_per_entity(pool: PgPool) {
    let store = PgStore::new(pool);
    let (x, y) = (new_id(), new_id());
    for (n, entity) in [x, y, x, x, y].into_iter().enumerate() {
        let entry = NewAuditEntry::for_flow(
            entity,
            AuditAction::Approve,
            "a",
            "A",
            now(),
            serde_json::json!({ "n": n }),
        );
        store.append(entry).await.unwrap();
    }

    for (entity, expected) in [(x, vec![0u64, 2, 3]), (y, vec![1, 4])] {
        let trail = store.list_for(&entity.to_string()).await.unwrap();
        let order: Vec<u64> = trail.iter().map(|e| e.metadata["n"].as_u64().unwrap()).collect();
        assert_eq!(order, expected);
        let sequences: Vec<i64> = trail.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (1..=expected.len() as i64).collect::<Vec<_>>());
        assert!(verify_chain(&trail).valid);
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_audit_rows_are_append_only(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let (flow, entry) = engine::initiate(definition("p1"), &Actor::new("pm", "PM"), now()).unwrap();
    store.insert_flow(flow.clone(), entry).await.unwrap();

    let update = sqlx::query("UPDATE audit_log_entries SET actor_name = 'someone else'")
        .execute(&pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM audit_log_entries").execute(&pool).await;
    assert!(delete.is_err());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_list_flows_filters(pool: PgPool) {
    let store = PgStore::new(pool);
    for project in ["p1", "p2", "p2"] {
        let (flow, entry) =
            engine::initiate(definition(project), &Actor::new("pm", "PM"), now()).unwrap();
        store.insert_flow(flow, entry).await.unwrap();
    }
    let p2 = FlowFilter {
        project_id: Some("p2".into()),
        status: Some(FlowStatus::Pending),
        ..Default::default()
    };
    assert_eq!(store.list_flows(&p2).await.unwrap().len(), 2);
    assert_eq!(store.list_flows(&FlowFilter::default()).await.unwrap().len(), 3);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_template_insert_and_update(pool: PgPool) {
    let store = PgStore::new(pool);
    let input = TemplateInput {
        name: "Tender package".into(),
        document_type: "specification".into(),
        flow_type: FlowType::Parallel,
        steps: definition("p").steps,
    };
    let template = FlowTemplate::create(new_id(), input.clone(), now());
    store.insert_template(template.clone()).await.unwrap();
    assert_eq!(store.get_template(template.id).await.unwrap(), template);

    let edited = template.revise(
        TemplateInput {
            name: "Tender package v2".into(),
            ..input
        },
        now(),
    );
    store.update_template(edited.clone()).await.unwrap();
    assert_eq!(store.list_templates().await.unwrap(), vec![edited]);

    assert_matches!(
        store.insert_template(template).await,
        Err(StoreError::AlreadyExists { .. })
    );
}
