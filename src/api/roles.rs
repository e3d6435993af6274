//! Position role API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateRoleRequest, PositionRole, UpdateRoleRequest};
use crate::AppState;

/// GET /api/roles - List all position roles.
pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Vec<PositionRole>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_roles().await {
        Ok(roles) => success(roles, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/roles - Create a new position role.
pub async fn create_role(
    State(state): State<AppState>,
    Json(request): Json<CreateRoleRequest>,
) -> ApiResult<PositionRole> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.trim().is_empty() {
        return error(
            AppError::Validation("Role name is required".to_string()),
            revision_id,
        );
    }

    match state.repo.create_role(&request).await {
        Ok(role) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(role, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/roles/:id - Update a position role.
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateRoleRequest>,
) -> ApiResult<PositionRole> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.update_role(&id, &request).await {
        Ok(role) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(role, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/roles/:id - Delete a position role.
pub async fn delete_role(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_role(&id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
