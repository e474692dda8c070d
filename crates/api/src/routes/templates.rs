use axum::routing::get;
use axum::Router;

use crate::handlers::templates;
use crate::state::AppState;

/// Routes mounted at `/templates`. Writes require the `admin` role
/// (enforced by handler extractors).
///
/// ```text
/// GET   /       -> list_templates
/// POST  /       -> create_template
/// GET   /{template_id}   -> get_template
/// PUT   /{template_id}   -> update_template
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/{template_id}",
            get(templates::get_template).put(templates::update_template),
        )
}
