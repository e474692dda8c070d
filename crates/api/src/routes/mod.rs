pub mod flows;
pub mod health;
pub mod templates;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /flows                                          list, create (GET, POST)
/// /flows/from-template                            create from template (POST)
/// /flows/inbox                                    flows the caller can sign (GET)
/// /flows/{flow_id}                                get (GET)
/// /flows/{flow_id}/steps/{step_id}/approve        sign a step (POST)
/// /flows/{flow_id}/steps/{step_id}/reject         reject a step (POST)
/// /flows/{flow_id}/cancel                         cancel (POST)
/// /flows/{flow_id}/audit                          audit trail + chain check (GET)
///
/// /templates                                      list, create (GET, POST)
/// /templates/{template_id}                        get, update (GET, PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/flows", flows::router())
        .nest("/templates", templates::router())
}
