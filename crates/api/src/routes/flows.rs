use axum::routing::{get, post};
use axum::Router;

use crate::handlers::flows;
use crate::state::AppState;

/// Routes mounted at `/flows`.
///
/// ```text
/// GET   /                                  -> list_flows
/// POST  /                                  -> create_flow
/// POST  /from-template                     -> create_flow_from_template
/// GET   /inbox                             -> inbox
/// GET   /{flow_id}                         -> get_flow
/// POST  /{flow_id}/steps/{step_id}/approve -> approve_step
/// POST  /{flow_id}/steps/{step_id}/reject  -> reject_step
/// POST  /{flow_id}/cancel                  -> cancel_flow
/// GET   /{flow_id}/audit                   -> get_audit_trail
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(flows::list_flows).post(flows::create_flow))
        .route("/from-template", post(flows::create_flow_from_template))
        .route("/inbox", get(flows::inbox))
        .route("/{flow_id}", get(flows::get_flow))
        .route(
            "/{flow_id}/steps/{step_id}/approve",
            post(flows::approve_step),
        )
        .route("/{flow_id}/steps/{step_id}/reject", post(flows::reject_step))
        .route("/{flow_id}/cancel", post(flows::cancel_flow))
        .route("/{flow_id}/audit", get(flows::get_audit_trail))
}
