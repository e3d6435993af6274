//! Per-seat capability derivation.
//!
//! Capabilities depend on who is asking: admins manage everything, a member
//! whose seat supervises another (directly or indirectly) manages that seat,
//! and a member manages parts of the seat they occupy.

use serde::Serialize;

/// What the requesting viewer may do with a given seat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    pub can_edit_title: bool,
    pub can_edit_roles: bool,
    pub can_edit_members: bool,
    pub can_edit_supervisor: bool,
    pub can_create_direct_report: bool,
    pub can_delete: bool,
}

impl PermissionSet {
    pub fn all() -> Self {
        Self {
            can_edit_title: true,
            can_edit_roles: true,
            can_edit_members: true,
            can_edit_supervisor: true,
            can_create_direct_report: true,
            can_delete: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// Derive the capability set for one seat.
pub(super) fn evaluate(
    is_admin: bool,
    is_ancestor_supervisor: bool,
    is_occupant: bool,
) -> PermissionSet {
    if is_admin || is_ancestor_supervisor {
        return PermissionSet::all();
    }

    if is_occupant {
        // Occupants maintain their own seat's roster and roles but cannot
        // move or remove the seat.
        return PermissionSet {
            can_edit_roles: true,
            can_edit_members: true,
            can_create_direct_report: true,
            ..PermissionSet::none()
        };
    }

    PermissionSet::none()
}
