//! Repository for the `approval_flows` table.

use signoff_core::flow::ApprovalFlow;
use signoff_core::store::FlowFilter;
use signoff_core::types::EntityId;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::models::flow::ApprovalFlowRow;

/// Column list for `approval_flows` SELECT queries.
const COLUMNS: &str = "\
    id, document_id, document_name, project_id, project_name, template_id, \
    flow_type, status, current_step_number, steps, initiated_by, \
    initiated_by_name, initiated_at, due_date, completed_at, \
    cancellation_reason, notes, version";

pub struct FlowRepo;

impl FlowRepo {
    /// Insert a new flow at its current version.
    pub async fn insert(conn: &mut PgConnection, flow: &ApprovalFlow) -> Result<(), sqlx::Error> {
        let query = format!(
            "INSERT INTO approval_flows ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        );
        sqlx::query(&query)
            .bind(flow.id)
            .bind(&flow.document_id)
            .bind(&flow.document_name)
            .bind(&flow.project_id)
            .bind(&flow.project_name)
            .bind(flow.template_id)
            .bind(flow.flow_type.as_str())
            .bind(flow.status.as_str())
            .bind(step_number(flow))
            .bind(Json(&flow.steps))
            .bind(&flow.initiated_by)
            .bind(&flow.initiated_by_name)
            .bind(flow.initiated_at)
            .bind(flow.due_date)
            .bind(flow.completed_at)
            .bind(&flow.cancellation_reason)
            .bind(&flow.notes)
            .bind(flow.version)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: EntityId,
    ) -> Result<Option<ApprovalFlowRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM approval_flows WHERE id = $1");
        sqlx::query_as::<_, ApprovalFlowRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(conn: &mut PgConnection, id: EntityId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM approval_flows WHERE id = $1)")
            .bind(id)
            .fetch_one(conn)
            .await
    }

    /// Overwrite the mutable columns if the stored version is
    /// `expected_version`, bumping it by one. Returns the affected row count
    /// (0 on a version mismatch or missing row).
    pub async fn update_versioned(
        conn: &mut PgConnection,
        flow: &ApprovalFlow,
        expected_version: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE approval_flows SET \
                status = $3, current_step_number = $4, steps = $5, \
                completed_at = $6, cancellation_reason = $7, notes = $8, \
                version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2",
        )
        .bind(flow.id)
        .bind(expected_version)
        .bind(flow.status.as_str())
        .bind(step_number(flow))
        .bind(Json(&flow.steps))
        .bind(flow.completed_at)
        .bind(&flow.cancellation_reason)
        .bind(&flow.notes)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// List flows matching the filter, newest first.
    pub async fn list(
        pool: &PgPool,
        filter: &FlowFilter,
    ) -> Result<Vec<ApprovalFlowRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM approval_flows \
             WHERE ($1::TEXT IS NULL OR project_id = $1) \
               AND ($2::TEXT IS NULL OR document_id = $2) \
               AND ($3::TEXT IS NULL OR status = $3) \
             ORDER BY initiated_at DESC, id DESC"
        );
        sqlx::query_as::<_, ApprovalFlowRow>(&query)
            .bind(&filter.project_id)
            .bind(&filter.document_id)
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(pool)
            .await
    }
}

fn step_number(flow: &ApprovalFlow) -> i32 {
    i32::try_from(flow.current_step_number).unwrap_or(i32::MAX)
}
