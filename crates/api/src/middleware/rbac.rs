//! Role checks for flow and template operations.
//!
//! Signing rights are not role-based: whether a caller may approve or reject
//! a step is decided by the flow's approver lists inside the engine. Roles
//! only gate template management and cancelling someone else's flow.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use signoff_core::error::CoreError;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

pub const ROLE_ADMIN: &str = "admin";

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// A flow may be withdrawn by whoever initiated it, or by an admin.
    pub fn ensure_can_cancel(&self, initiated_by: &str) -> Result<(), CoreError> {
        if self.user_id == initiated_by || self.is_admin() {
            return Ok(());
        }
        Err(CoreError::Forbidden(
            "Only the initiator or an admin can cancel this flow".into(),
        ))
    }
}

/// Caller allowed to create and edit flow templates (the `admin` role).
/// Rejects with 403 Forbidden otherwise.
pub struct TemplateManager(pub AuthUser);

impl FromRequestParts<AppState> for TemplateManager {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(
                user_id = %user.user_id,
                role = %user.role,
                "Template change refused for non-admin"
            );
            return Err(AppError::Core(CoreError::Forbidden(
                "Managing flow templates requires the admin role".into(),
            )));
        }
        Ok(TemplateManager(user))
    }
}
