//! Seat model matching the frontend Seat interface.
//!
//! Seats persist only the supervisor-to-reports direction of the hierarchy
//! (`direct_report_ids`); the reverse link is derived by the hierarchy builder.

use serde::{Deserialize, Serialize};

/// The position attached to a seat: a title plus an ordered list of role names.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatPosition {
    pub title: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A position in the organizational hierarchy; may hold zero or more members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<SeatPosition>,
    #[serde(default)]
    pub member_ids: Vec<String>,
    /// Seats reporting directly to this one. The only persisted relation.
    #[serde(default)]
    pub direct_report_ids: Vec<String>,
    pub updated_at: String,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

/// Request body for creating a new seat.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSeatRequest {
    #[serde(default)]
    pub position: Option<SeatPosition>,
    #[serde(default)]
    pub member_ids: Vec<String>,
    /// Pre-seeded supervisor, e.g. when created via "add direct report".
    #[serde(default)]
    pub supervisor_seat_id: Option<String>,
}

/// Request body for editing a seat's position or members.
///
/// Supervisor changes go through the dedicated reparent route.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSeatRequest {
    #[serde(default)]
    pub position: Option<SeatPosition>,
    #[serde(default)]
    pub member_ids: Option<Vec<String>>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for changing a seat's supervisor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReparentSeatRequest {
    /// New supervisor seat id; `null` detaches the seat into a new root.
    #[serde(default)]
    pub supervisor_seat_id: Option<String>,
}

/// Query parameters for deleting a seat.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSeatQuery {
    /// Seat that inherits the deleted seat's direct reports.
    /// Required when the seat has any.
    #[serde(default)]
    pub reassign_to: Option<String>,
}
