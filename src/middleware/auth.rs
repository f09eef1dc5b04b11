//! Admin authentication extractor for Axum handlers.
//!
//! The pattern-management and findings-query boundaries are guarded by a
//! single static bearer token; full user/session machinery lives outside
//! this service.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::AppState;

/// Administrator authenticated via the shared bearer token.
///
/// Use as an Axum extractor in handlers that require admin access:
/// ```ignore
/// async fn handler(_admin: AdminUser) -> impl IntoResponse { ... }
/// ```
#[derive(Debug, Clone)]
pub struct AdminUser;

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        if token != state.config.admin_token {
            return Err(AppError::Unauthorized);
        }

        Ok(AdminUser)
    }
}
