//! Findings query routes for audit display.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::AdminUser;
use crate::models::finding::{Finding, FindingFilters, FindingWithPattern};
use crate::models::pagination::{PagedResult, Pagination};
use crate::services::finding;
use crate::AppState;

/// GET /api/v1/findings — list findings joined with the triggering pattern.
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filters): Query<FindingFilters>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<PagedResult<FindingWithPattern>>>, AppError> {
    let paged = finding::list(&state.db, &filters, &pagination).await?;
    Ok(ApiResponse::success(paged))
}

/// GET /api/v1/findings/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Finding>>, AppError> {
    let found = finding::get(&state.db, id).await?;
    Ok(ApiResponse::success(found))
}
