//! Repository for the `flow_templates` table.

use signoff_core::template::FlowTemplate;
use signoff_core::types::EntityId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::template::FlowTemplateRow;

const COLUMNS: &str = "id, name, document_type, flow_type, steps, created_at, updated_at";

pub struct TemplateRepo;

impl TemplateRepo {
    pub async fn find_by_id(
        pool: &PgPool,
        id: EntityId,
    ) -> Result<Option<FlowTemplateRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM flow_templates WHERE id = $1");
        sqlx::query_as::<_, FlowTemplateRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<FlowTemplateRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM flow_templates ORDER BY name ASC, id ASC");
        sqlx::query_as::<_, FlowTemplateRow>(&query)
            .fetch_all(pool)
            .await
    }

    pub async fn insert(pool: &PgPool, template: &FlowTemplate) -> Result<(), sqlx::Error> {
        let query = format!(
            "INSERT INTO flow_templates ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        );
        sqlx::query(&query)
            .bind(template.id)
            .bind(&template.name)
            .bind(&template.document_type)
            .bind(template.flow_type.as_str())
            .bind(Json(&template.steps))
            .bind(template.created_at)
            .bind(template.updated_at)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Returns `false` if no template has this id.
    pub async fn update(pool: &PgPool, template: &FlowTemplate) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE flow_templates SET \
                name = $2, document_type = $3, flow_type = $4, steps = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.document_type)
        .bind(template.flow_type.as_str())
        .bind(Json(&template.steps))
        .bind(template.updated_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
