//! Hierarchy engine: derives the org chart tree from the flat seat collection.
//!
//! Seats persist only their direct-report id lists. Everything else the
//! frontend renders is derived here on every read: the supervisor
//! back-reference (by inverting the report relation), the root set, the
//! full-descendant index, and per-seat permissions for the requesting viewer.
//! Derivation is pure; inconsistent references (a listed report id that does
//! not exist) are dropped silently. The only error path is a cyclic
//! supervisor relation in the stored data, which is reported instead of
//! recursed into.

mod expand;
mod permissions;
mod traversal;

pub use expand::{ExpandState, DEFAULT_DEPTH_WINDOW};
pub use permissions::PermissionSet;
pub use traversal::{depth_by_seat_id, ids_in_first_n_levels, max_depth};

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Member, Seat};

/// A seat decorated with derived navigation and permission data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatNode {
    pub seat: Seat,
    /// Derived by inverting the direct-report relation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<String>,
    /// Persisted report ids filtered down to seats that actually exist.
    pub direct_report_ids: Vec<String>,
    pub permissions: PermissionSet,
}

/// The derived hierarchical view over the flat seat collection.
#[derive(Debug, Clone)]
pub struct HierarchyView {
    nodes: HashMap<String, SeatNode>,
    roots: Vec<String>,
    /// Every seat id below a given seat, all generations.
    descendants_by_seat_id: HashMap<String, Vec<String>>,
    /// Seats occupied by a given member.
    seat_ids_by_member_id: HashMap<String, Vec<String>>,
}

impl HierarchyView {
    /// Build the hierarchical view for one viewer.
    ///
    /// `viewer` is the member issuing the request; `None` yields empty
    /// permission sets on every node.
    pub fn build(seats: &[Seat], viewer: Option<&Member>) -> Result<Self, AppError> {
        let known: HashSet<&str> = seats.iter().map(|s| s.id.as_str()).collect();

        // Invert the report relation, dropping unknown ids and duplicate
        // supervisor claims (first claim wins).
        let mut supervisor_by_seat_id: HashMap<String, String> = HashMap::new();
        let mut reports_by_seat_id: HashMap<String, Vec<String>> = HashMap::new();
        let mut seat_ids_by_member_id: HashMap<String, Vec<String>> = HashMap::new();

        for seat in seats {
            let mut report_ids = Vec::new();
            for report_id in &seat.direct_report_ids {
                if !known.contains(report_id.as_str()) || report_id == &seat.id {
                    continue;
                }
                if supervisor_by_seat_id.contains_key(report_id) {
                    continue;
                }
                supervisor_by_seat_id.insert(report_id.clone(), seat.id.clone());
                report_ids.push(report_id.clone());
            }
            reports_by_seat_id.insert(seat.id.clone(), report_ids);

            for member_id in &seat.member_ids {
                seat_ids_by_member_id
                    .entry(member_id.clone())
                    .or_default()
                    .push(seat.id.clone());
            }
        }

        let roots: Vec<String> = seats
            .iter()
            .filter(|s| !supervisor_by_seat_id.contains_key(&s.id))
            .map(|s| s.id.clone())
            .collect();

        let descendants_by_seat_id =
            traversal::descendant_index(&reports_by_seat_id, &roots, seats.len())?;

        // Seats the viewer supervises, directly or indirectly.
        let viewer_seat_ids: HashSet<&str> = viewer
            .and_then(|m| seat_ids_by_member_id.get(&m.id))
            .map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let supervised: HashSet<&str> = viewer_seat_ids
            .iter()
            .flat_map(|sid| {
                descendants_by_seat_id
                    .get(*sid)
                    .into_iter()
                    .flatten()
                    .map(String::as_str)
            })
            .collect();

        let is_admin = viewer.map(|m| m.admin).unwrap_or(false);

        let mut nodes = HashMap::with_capacity(seats.len());
        for seat in seats {
            let permissions = permissions::evaluate(
                is_admin,
                supervised.contains(seat.id.as_str()),
                viewer_seat_ids.contains(seat.id.as_str()),
            );
            nodes.insert(
                seat.id.clone(),
                SeatNode {
                    supervisor_id: supervisor_by_seat_id.get(&seat.id).cloned(),
                    direct_report_ids: reports_by_seat_id
                        .get(&seat.id)
                        .cloned()
                        .unwrap_or_default(),
                    permissions,
                    seat: seat.clone(),
                },
            );
        }

        Ok(Self {
            nodes,
            roots,
            descendants_by_seat_id,
            seat_ids_by_member_id,
        })
    }

    pub fn node(&self, id: &str) -> Option<&SeatNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &HashMap<String, SeatNode> {
        &self.nodes
    }

    /// Seats that appear as nobody's direct report, in arbitrary order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every seat id below `seat_id`, all generations. Empty for leaves
    /// and unknown ids.
    pub fn descendants(&self, seat_id: &str) -> &[String] {
        self.descendants_by_seat_id
            .get(seat_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Seats occupied by the given member.
    pub fn seats_of_member(&self, member_id: &str) -> &[String] {
        self.seat_ids_by_member_id
            .get(member_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Valid new-supervisor targets for a seat: every other seat except the
    /// seat itself and its own descendants.
    pub fn supervisor_candidates(&self, seat_id: &str) -> Vec<String> {
        let excluded: HashSet<&str> = self
            .descendants(seat_id)
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(seat_id))
            .collect();

        self.nodes
            .keys()
            .filter(|id| !excluded.contains(id.as_str()))
            .cloned()
            .collect()
    }

    /// Supervisor path from the root down to (but excluding) the seat.
    /// Used to reveal a moved seat after reparenting.
    pub fn ancestor_chain(&self, seat_id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(seat_id).and_then(|n| n.supervisor_id.clone());
        while let Some(id) = current {
            // Builder guarantees acyclicity, but stop anyway if a repeat shows up.
            if chain.contains(&id) {
                break;
            }
            current = self.nodes.get(&id).and_then(|n| n.supervisor_id.clone());
            chain.push(id);
        }
        chain.reverse();
        chain
    }
}
