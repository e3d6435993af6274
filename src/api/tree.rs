//! Derived tree API endpoint.
//!
//! Returns the hierarchical view the org chart renders from: the node map
//! with per-seat permissions for the requesting viewer, the root set, and the
//! expand map for the requested depth window.

use std::collections::HashMap;

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{error, success, ApiResult};
use crate::hierarchy::{self, ExpandState, HierarchyView, SeatNode};
use crate::AppState;

/// Tree query parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeQuery {
    /// Depth window; defaults to the configured value, clamped to the tree.
    #[serde(default)]
    pub levels: Option<usize>,
    /// Member requesting the view; absent means anonymous (no permissions).
    #[serde(default)]
    pub user_id: Option<String>,
}

/// The derived hierarchy plus the view state for one depth window.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeResponse {
    pub roots: Vec<String>,
    pub nodes: HashMap<String, SeatNode>,
    /// Seat id -> whether its direct reports are shown.
    pub expanded: HashMap<String, bool>,
    /// Seat ids within the applied depth window.
    pub visible_seat_ids: Vec<String>,
    pub max_depth: usize,
    /// The depth window actually applied after clamping.
    pub levels: usize,
}

/// GET /api/tree - Get the derived hierarchical view.
pub async fn get_tree(
    State(state): State<AppState>,
    Query(params): Query<TreeQuery>,
) -> ApiResult<TreeResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let viewer = match &params.user_id {
        Some(user_id) => match state.repo.get_member(user_id).await {
            Ok(member) => member,
            Err(e) => return error(e, revision_id),
        },
        None => None,
    };

    let seats = match state.repo.list_seats().await {
        Ok(seats) => seats,
        Err(e) => return error(e, revision_id),
    };

    let view = match HierarchyView::build(&seats, viewer.as_ref()) {
        Ok(view) => view,
        Err(e) => return error(e, revision_id),
    };

    let requested = params.levels.unwrap_or(state.config.default_depth_window);
    let (expand_state, applied) = ExpandState::with_depth(&view, requested);

    success(
        TreeResponse {
            roots: view.roots().to_vec(),
            expanded: expand_state.as_map().clone(),
            visible_seat_ids: hierarchy::ids_in_first_n_levels(&view, applied),
            max_depth: hierarchy::max_depth(&view),
            levels: applied,
            nodes: view.nodes().clone(),
        },
        revision_id,
    )
}
