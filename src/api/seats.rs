//! Seat API endpoints, including the reparent and delete orchestration.
//!
//! Structural rules live here: a seat cannot be moved under itself or one of
//! its own descendants, and a seat with direct reports cannot be deleted
//! without a reassignment target outside its subtree. The repository only
//! performs the row surgery once a request passes these checks.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::hierarchy::HierarchyView;
use crate::models::{
    CreateSeatRequest, DeleteSeatQuery, ReparentSeatRequest, Seat, UpdateSeatRequest,
};
use crate::AppState;

/// Response for a successful supervisor change: the moved seat plus the view
/// hints that make it visible (expand its new ancestor chain, recenter on it).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReparentResponse {
    pub seat: Seat,
    pub expand_seat_ids: Vec<String>,
    pub focus_seat_id: String,
}

/// GET /api/seats - List all seats (flat form).
pub async fn list_seats(State(state): State<AppState>) -> ApiResult<Vec<Seat>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_seats().await {
        Ok(seats) => success(seats, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/seats/:id - Get a single seat.
pub async fn get_seat(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Seat> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_seat(&id).await {
        Ok(Some(seat)) => success(seat, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Seat {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/seats - Create a new seat, optionally under a supervisor.
pub async fn create_seat(
    State(state): State<AppState>,
    Json(request): Json<CreateSeatRequest>,
) -> ApiResult<Seat> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Some(position) = &request.position {
        if position.title.trim().is_empty() {
            return error(
                AppError::Validation("Position title cannot be empty".to_string()),
                revision_id,
            );
        }
    }

    match state.repo.create_seat(&request).await {
        Ok(seat) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(seat, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/seats/:id - Edit a seat's position or members.
pub async fn update_seat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateSeatRequest>,
) -> ApiResult<Seat> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.update_seat(&id, &request).await {
        Ok(seat) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(seat, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/seats/:id/supervisor - Move a seat under a new supervisor.
pub async fn reparent_seat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReparentSeatRequest>,
) -> ApiResult<ReparentResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let seats = match state.repo.list_seats().await {
        Ok(seats) => seats,
        Err(e) => return error(e, revision_id),
    };
    let view = match HierarchyView::build(&seats, None) {
        Ok(view) => view,
        Err(e) => return error(e, revision_id),
    };

    let Some(node) = view.node(&id) else {
        return error(
            AppError::NotFound(format!("Seat {} not found", id)),
            revision_id,
        );
    };

    let new_supervisor_id = request.supervisor_seat_id.as_deref();

    // No-op cases: moving a seat under itself, or to where it already is.
    let unchanged = new_supervisor_id == Some(id.as_str())
        || node.supervisor_id.as_deref() == new_supervisor_id;
    if unchanged {
        return success(
            ReparentResponse {
                seat: node.seat.clone(),
                expand_seat_ids: view.ancestor_chain(&id),
                focus_seat_id: id,
            },
            revision_id,
        );
    }

    if let Some(supervisor_id) = new_supervisor_id {
        if view.node(supervisor_id).is_none() {
            return error(
                AppError::Validation(format!("Supervisor seat {} not found", supervisor_id)),
                revision_id,
            );
        }
        if view.descendants(&id).iter().any(|d| d == supervisor_id) {
            return error(
                AppError::Validation(format!(
                    "Seat {} cannot report to its own descendant {}",
                    id, supervisor_id
                )),
                revision_id,
            );
        }
    }

    let seat = match state.repo.reparent_seat(&id, new_supervisor_id).await {
        Ok(seat) => seat,
        Err(e) => return error(e, revision_id),
    };

    // Re-derive the hierarchy so the reveal hints reflect the new shape.
    let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
    let seats = match state.repo.list_seats().await {
        Ok(seats) => seats,
        Err(e) => return error(e, new_revision),
    };
    let view = match HierarchyView::build(&seats, None) {
        Ok(view) => view,
        Err(e) => return error(e, new_revision),
    };

    success(
        ReparentResponse {
            expand_seat_ids: view.ancestor_chain(&id),
            focus_seat_id: id,
            seat,
        },
        new_revision,
    )
}

/// GET /api/seats/:id/supervisor-candidates - Seats a seat may report to.
///
/// Excludes the seat itself and its entire descendant subtree, so edit/create
/// drawers never offer a move that would form a cycle.
pub async fn supervisor_candidates(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Seat>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let seats = match state.repo.list_seats().await {
        Ok(seats) => seats,
        Err(e) => return error(e, revision_id),
    };
    let view = match HierarchyView::build(&seats, None) {
        Ok(view) => view,
        Err(e) => return error(e, revision_id),
    };

    if view.node(&id).is_none() {
        return error(
            AppError::NotFound(format!("Seat {} not found", id)),
            revision_id,
        );
    }

    let candidate_ids = view.supervisor_candidates(&id);
    let candidates = seats
        .into_iter()
        .filter(|seat| candidate_ids.iter().any(|cid| cid == &seat.id))
        .collect();

    success(candidates, revision_id)
}

/// DELETE /api/seats/:id - Delete a seat, reassigning any direct reports.
pub async fn delete_seat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteSeatQuery>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Some(target_id) = &query.reassign_to {
        let seats = match state.repo.list_seats().await {
            Ok(seats) => seats,
            Err(e) => return error(e, revision_id),
        };
        let view = match HierarchyView::build(&seats, None) {
            Ok(view) => view,
            Err(e) => return error(e, revision_id),
        };

        // The target inherits the orphaned reports, so it must live outside
        // the subtree being removed.
        if target_id == &id || view.descendants(&id).iter().any(|d| d == target_id) {
            return error(
                AppError::Validation(format!(
                    "Reassignment seat {} is inside the subtree of seat {}",
                    target_id, id
                )),
                revision_id,
            );
        }
    }

    match state
        .repo
        .delete_seat(&id, query.reassign_to.as_deref())
        .await
    {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
