//! Pattern management routes for the administrative surface.
//!
//! Writes take effect for the next scan without a process restart.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::AdminUser;
use crate::models::pattern::{CreatePattern, Pattern, UpdatePattern};
use crate::AppState;

/// GET /api/v1/patterns — list all patterns, including disabled ones.
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<Pattern>>>, AppError> {
    let patterns = state.registry.list().await?;
    Ok(ApiResponse::success(patterns))
}

/// GET /api/v1/patterns/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let pattern = state.registry.get(id).await?;
    Ok(ApiResponse::success(pattern))
}

/// POST /api/v1/patterns — add a detection pattern.
pub async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<CreatePattern>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("Pattern name is required".to_string()));
    }
    let created = state.registry.add(&input).await?;
    Ok(ApiResponse::success(created))
}

/// PUT /api/v1/patterns/{id} — edit regex, description, severity, enabled.
pub async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePattern>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let updated = state.registry.update(id, &input).await?;
    Ok(ApiResponse::success(updated))
}

/// POST /api/v1/patterns/{id}/disable — idempotent soft-disable.
pub async fn disable(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let disabled = state.registry.disable(id).await?;
    Ok(ApiResponse::success(disabled))
}
