//! Traversal utilities over the derived hierarchy.
//!
//! Roots count as depth 1 throughout.

use std::collections::{HashMap, HashSet};

use crate::errors::AppError;

use super::HierarchyView;

/// Every seat id reachable within `levels` hops from the roots, inclusive.
///
/// `levels < 1` yields nothing; `levels == 1` yields exactly the roots.
pub fn ids_in_first_n_levels(view: &HierarchyView, levels: usize) -> Vec<String> {
    let mut ids = Vec::new();
    if levels < 1 {
        return ids;
    }
    for root in view.roots() {
        collect_levels(view, root, levels, &mut ids);
    }
    ids
}

fn collect_levels(view: &HierarchyView, id: &str, levels: usize, out: &mut Vec<String>) {
    out.push(id.to_string());
    if levels <= 1 {
        return;
    }
    if let Some(node) = view.node(id) {
        for report_id in &node.direct_report_ids {
            collect_levels(view, report_id, levels - 1, out);
        }
    }
}

/// Longest root-to-leaf path length. Empty forest is 0, roots only is 1.
pub fn max_depth(view: &HierarchyView) -> usize {
    view.roots()
        .iter()
        .map(|root| subtree_depth(view, root))
        .max()
        .unwrap_or(0)
}

fn subtree_depth(view: &HierarchyView, id: &str) -> usize {
    let below = view
        .node(id)
        .map(|node| {
            node.direct_report_ids
                .iter()
                .map(|rid| subtree_depth(view, rid))
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);
    1 + below
}

/// Depth of every seat, roots at 1.
pub fn depth_by_seat_id(view: &HierarchyView) -> HashMap<String, usize> {
    let mut depths = HashMap::with_capacity(view.len());
    let mut frontier: Vec<(String, usize)> =
        view.roots().iter().map(|r| (r.clone(), 1)).collect();

    while let Some((id, depth)) = frontier.pop() {
        depths.insert(id.clone(), depth);
        if let Some(node) = view.node(&id) {
            for report_id in &node.direct_report_ids {
                frontier.push((report_id.clone(), depth + 1));
            }
        }
    }

    depths
}

/// Pre-order walk from every root, mapping each seat id to all ids below it.
///
/// Also the acyclicity check for the whole forest: a seat reached twice, or
/// a seat unreachable from any root (a detached cycle), is reported as a
/// [`AppError::Cycle`] rather than recursed into.
pub(super) fn descendant_index(
    reports_by_seat_id: &HashMap<String, Vec<String>>,
    roots: &[String],
    seat_count: usize,
) -> Result<HashMap<String, Vec<String>>, AppError> {
    let mut index = HashMap::with_capacity(seat_count);
    let mut visited = HashSet::with_capacity(seat_count);

    for root in roots {
        collect_descendants(root, reports_by_seat_id, &mut index, &mut visited)?;
    }

    if visited.len() != seat_count {
        return Err(AppError::Cycle(format!(
            "Supervisor relation is cyclic: {} of {} seats unreachable from any root",
            seat_count - visited.len(),
            seat_count
        )));
    }

    Ok(index)
}

fn collect_descendants(
    id: &str,
    reports_by_seat_id: &HashMap<String, Vec<String>>,
    index: &mut HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
) -> Result<Vec<String>, AppError> {
    if !visited.insert(id.to_string()) {
        return Err(AppError::Cycle(format!(
            "Supervisor relation is cyclic at seat {}",
            id
        )));
    }

    let mut below = Vec::new();
    if let Some(report_ids) = reports_by_seat_id.get(id) {
        for report_id in report_ids {
            below.push(report_id.clone());
            below.extend(collect_descendants(
                report_id,
                reports_by_seat_id,
                index,
                visited,
            )?);
        }
    }

    index.insert(id.to_string(), below.clone());
    Ok(below)
}
