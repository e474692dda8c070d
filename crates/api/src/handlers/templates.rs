//! Handlers for flow templates. Reads are open to any authenticated user;
//! writes require the admin role.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use signoff_core::template::TemplateInput;
use signoff_core::types::EntityId;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::TemplateManager;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/templates
pub async fn list_templates(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let templates = state.engine.list_templates().await?;
    Ok(Json(DataResponse { data: templates }))
}

/// GET /api/v1/templates/{template_id}
pub async fn get_template(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(template_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let template = state.engine.get_template(template_id).await?;
    Ok(Json(DataResponse { data: template }))
}

/// POST /api/v1/templates
pub async fn create_template(
    TemplateManager(admin): TemplateManager,
    State(state): State<AppState>,
    Json(input): Json<TemplateInput>,
) -> AppResult<impl IntoResponse> {
    let template = state.engine.create_template(input).await?;
    tracing::info!(
        user_id = %admin.user_id,
        template_id = %template.id,
        "Template created via API"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: template })))
}

/// PUT /api/v1/templates/{template_id}
///
/// Replace a template's editable fields. Flows already created from it are
/// unaffected.
pub async fn update_template(
    TemplateManager(admin): TemplateManager,
    State(state): State<AppState>,
    Path(template_id): Path<EntityId>,
    Json(input): Json<TemplateInput>,
) -> AppResult<impl IntoResponse> {
    let template = state.engine.update_template(template_id, input).await?;
    tracing::info!(
        user_id = %admin.user_id,
        template_id = %template.id,
        "Template updated via API"
    );
    Ok(Json(DataResponse { data: template }))
}
