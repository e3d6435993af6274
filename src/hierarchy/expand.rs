//! Expand/collapse state for the rendered tree.
//!
//! Per-seat booleans, never persisted. A depth-window change overwrites the
//! whole map; single-seat toggles mutate one flag.

use std::collections::HashMap;

use super::{traversal, HierarchyView};

/// Hierarchy levels shown on first load.
pub const DEFAULT_DEPTH_WINDOW: usize = 3;

/// Which seats currently show their direct reports.
#[derive(Debug, Clone, Default)]
pub struct ExpandState {
    expanded: HashMap<String, bool>,
}

impl ExpandState {
    /// Fresh state for a view at the given depth window. Returns the state
    /// and the level actually applied after clamping.
    pub fn with_depth(view: &HierarchyView, level: usize) -> (Self, usize) {
        let mut state = Self::default();
        let applied = state.set_depth(view, level);
        (state, applied)
    }

    /// Show a seat's direct reports.
    pub fn expand(&mut self, seat_id: &str) {
        self.expanded.insert(seat_id.to_string(), true);
    }

    /// Hide a seat's direct reports.
    pub fn collapse(&mut self, seat_id: &str) {
        self.expanded.insert(seat_id.to_string(), false);
    }

    pub fn is_expanded(&self, seat_id: &str) -> bool {
        self.expanded.get(seat_id).copied().unwrap_or(false)
    }

    /// Recompute the whole map for a depth window: a seat is expanded iff its
    /// depth is strictly less than the level. Full overwrite, not a merge.
    /// The level is clamped to `[1, max_depth]`; returns the level applied.
    pub fn set_depth(&mut self, view: &HierarchyView, level: usize) -> usize {
        let ceiling = traversal::max_depth(view).max(1);
        let applied = level.clamp(1, ceiling);

        let depths = traversal::depth_by_seat_id(view);
        self.expanded = depths
            .into_iter()
            .map(|(id, depth)| (id, depth < applied))
            .collect();

        applied
    }

    /// Collapse everything down to the root level.
    pub fn collapse_all(&mut self, view: &HierarchyView) -> usize {
        self.set_depth(view, 1)
    }

    /// Expand every level of the tree.
    pub fn expand_all(&mut self, view: &HierarchyView) -> usize {
        self.set_depth(view, usize::MAX)
    }

    pub fn as_map(&self) -> &HashMap<String, bool> {
        &self.expanded
    }
}
