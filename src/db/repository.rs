//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity. The seat
//! hierarchy is persisted in one direction only (`direct_report_ids` per
//! seat), so reparenting and deleting touch several rows inside one
//! transaction.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    CreateMemberRequest, CreateRoleRequest, CreateSeatRequest, Datastore, Member, PositionRole,
    RevisionInfo, Seat, SeatPosition, UpdateMemberRequest, UpdateRoleRequest, UpdateSeatRequest,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&self.pool)
            .await?;
        self.get_revision_id().await
    }

    /// Get the full datastore snapshot.
    pub async fn get_datastore(&self) -> Result<Datastore, AppError> {
        let meta =
            sqlx::query("SELECT schema_version, revision_id, generated_at FROM meta WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;

        let seats = self.list_seats().await?;
        let members = self.list_members().await?;
        let roles = self.list_roles().await?;

        Ok(Datastore {
            schema_version: meta.get("schema_version"),
            revision_id: meta.get("revision_id"),
            generated_at: meta.get("generated_at"),
            seats,
            members,
            roles: Some(roles),
        })
    }

    // ==================== MEMBER OPERATIONS ====================

    /// List all members.
    pub async fn list_members(&self) -> Result<Vec<Member>, AppError> {
        let rows = sqlx::query(
            "SELECT id, display_name, email, active, admin, color, updated_at, version FROM members ORDER BY display_name"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(member_from_row).collect())
    }

    /// Get a member by ID.
    pub async fn get_member(&self, id: &str) -> Result<Option<Member>, AppError> {
        let row = sqlx::query(
            "SELECT id, display_name, email, active, admin, color, updated_at, version FROM members WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(member_from_row))
    }

    /// Create a new member.
    pub async fn create_member(&self, request: &CreateMemberRequest) -> Result<Member, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO members (id, display_name, email, active, admin, color, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, 1)"
        )
        .bind(&id)
        .bind(&request.display_name)
        .bind(&request.email)
        .bind(request.active as i32)
        .bind(request.admin as i32)
        .bind(&request.color)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Member {
            id,
            display_name: request.display_name.clone(),
            email: request.email.clone(),
            active: request.active,
            admin: request.admin,
            color: request.color.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Update a member with optimistic concurrency control.
    pub async fn update_member(
        &self,
        id: &str,
        request: &UpdateMemberRequest,
    ) -> Result<Member, AppError> {
        let existing = self
            .get_member(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;

        // Check version for optimistic concurrency
        if let Some(expected) = request.expected_version {
            if existing.version != expected {
                return Err(AppError::Conflict {
                    message: format!(
                        "Version mismatch: expected {}, current {}",
                        expected, existing.version
                    ),
                    current_version: existing.version,
                });
            }
        }

        let now = Utc::now().to_rfc3339();
        let new_version = existing.version + 1;

        let display_name = request
            .display_name
            .as_ref()
            .unwrap_or(&existing.display_name);
        let email = request.email.clone().or(existing.email.clone());
        let active = request.active.unwrap_or(existing.active);
        let admin = request.admin.unwrap_or(existing.admin);
        let color = request.color.clone().or(existing.color.clone());

        // Use conditional UPDATE with version check to prevent race conditions
        let result = sqlx::query(
            "UPDATE members SET display_name = ?, email = ?, active = ?, admin = ?, color = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(display_name)
        .bind(&email)
        .bind(active as i32)
        .bind(admin as i32)
        .bind(&color)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Race condition - version changed between read and write
            let current = self.get_member(id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|m| m.version).unwrap_or(0),
            });
        }

        self.increment_revision().await?;

        Ok(Member {
            id: id.to_string(),
            display_name: display_name.clone(),
            email,
            active,
            admin,
            color,
            updated_at: now,
            version: new_version,
        })
    }

    /// Delete a member.
    pub async fn delete_member(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM members WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Member {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== ROLE OPERATIONS ====================

    /// List all position roles.
    pub async fn list_roles(&self) -> Result<Vec<PositionRole>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, description, created_at, modified_at, version FROM roles ORDER BY name"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(role_from_row).collect())
    }

    /// Get a position role by ID.
    pub async fn get_role(&self, id: &str) -> Result<Option<PositionRole>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, description, created_at, modified_at, version FROM roles WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(role_from_row))
    }

    /// Create a new position role.
    pub async fn create_role(&self, request: &CreateRoleRequest) -> Result<PositionRole, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO roles (id, name, description, created_at, modified_at, version) VALUES (?, ?, ?, ?, ?, 1)"
        )
        .bind(&id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(PositionRole {
            id,
            name: request.name.clone(),
            description: request.description.clone(),
            created_at: now.clone(),
            modified_at: now,
            version: 1,
        })
    }

    /// Update a position role with optimistic concurrency control.
    pub async fn update_role(
        &self,
        id: &str,
        request: &UpdateRoleRequest,
    ) -> Result<PositionRole, AppError> {
        let existing = self
            .get_role(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Role {} not found", id)))?;

        if let Some(expected) = request.expected_version {
            if existing.version != expected {
                return Err(AppError::Conflict {
                    message: format!(
                        "Version mismatch: expected {}, current {}",
                        expected, existing.version
                    ),
                    current_version: existing.version,
                });
            }
        }

        let now = Utc::now().to_rfc3339();
        let new_version = existing.version + 1;

        let name = request.name.as_ref().unwrap_or(&existing.name);
        let description = request.description.clone().or(existing.description.clone());

        let result = sqlx::query(
            "UPDATE roles SET name = ?, description = ?, modified_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(name)
        .bind(&description)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_role(id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|r| r.version).unwrap_or(0),
            });
        }

        self.increment_revision().await?;

        Ok(PositionRole {
            id: id.to_string(),
            name: name.clone(),
            description,
            created_at: existing.created_at,
            modified_at: now,
            version: new_version,
        })
    }

    /// Delete a position role.
    pub async fn delete_role(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Role {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== SEAT OPERATIONS ====================

    /// List all seats.
    pub async fn list_seats(&self) -> Result<Vec<Seat>, AppError> {
        let rows = sqlx::query(
            "SELECT id, position_title, position_roles, member_ids, direct_report_ids, updated_at, version FROM seats"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(seat_from_row).collect())
    }

    /// Get a seat by ID.
    pub async fn get_seat(&self, id: &str) -> Result<Option<Seat>, AppError> {
        let row = sqlx::query(
            "SELECT id, position_title, position_roles, member_ids, direct_report_ids, updated_at, version FROM seats WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(seat_from_row))
    }

    /// Create a new seat, optionally linked under an initial supervisor.
    pub async fn create_seat(&self, request: &CreateSeatRequest) -> Result<Seat, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let (title, roles_json) = position_columns(&request.position);
        let member_ids_json = serde_json::to_string(&request.member_ids).unwrap_or_default();

        let mut tx = self.pool.begin().await?;

        // Link into the supervisor's direct reports first so a missing
        // supervisor fails before the seat row exists.
        if let Some(supervisor_id) = &request.supervisor_seat_id {
            let supervisor = fetch_seat_tx(&mut tx, supervisor_id)
                .await?
                .ok_or_else(|| {
                    AppError::Validation(format!("Supervisor seat {} not found", supervisor_id))
                })?;

            let mut report_ids = supervisor.direct_report_ids.clone();
            report_ids.push(id.clone());
            store_report_ids_tx(&mut tx, &supervisor, &report_ids, &now).await?;
        }

        sqlx::query(
            "INSERT INTO seats (id, position_title, position_roles, member_ids, direct_report_ids, updated_at, version) VALUES (?, ?, ?, ?, '[]', ?, 1)"
        )
        .bind(&id)
        .bind(&title)
        .bind(&roles_json)
        .bind(&member_ids_json)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        increment_revision_tx(&mut tx, &now).await?;
        tx.commit().await?;

        Ok(Seat {
            id,
            position: request.position.clone(),
            member_ids: request.member_ids.clone(),
            direct_report_ids: Vec::new(),
            updated_at: now,
            version: 1,
        })
    }

    /// Update a seat's position or members with optimistic concurrency control.
    pub async fn update_seat(&self, id: &str, request: &UpdateSeatRequest) -> Result<Seat, AppError> {
        let existing = self
            .get_seat(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Seat {} not found", id)))?;

        if let Some(expected) = request.expected_version {
            if existing.version != expected {
                return Err(AppError::Conflict {
                    message: format!(
                        "Version mismatch: expected {}, current {}",
                        expected, existing.version
                    ),
                    current_version: existing.version,
                });
            }
        }

        let now = Utc::now().to_rfc3339();
        let new_version = existing.version + 1;

        let position = request.position.clone().or(existing.position.clone());
        let member_ids = request
            .member_ids
            .clone()
            .unwrap_or_else(|| existing.member_ids.clone());

        let (title, roles_json) = position_columns(&position);
        let member_ids_json = serde_json::to_string(&member_ids).unwrap_or_default();

        let result = sqlx::query(
            "UPDATE seats SET position_title = ?, position_roles = ?, member_ids = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(&title)
        .bind(&roles_json)
        .bind(&member_ids_json)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_seat(id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|s| s.version).unwrap_or(0),
            });
        }

        self.increment_revision().await?;

        Ok(Seat {
            id: id.to_string(),
            position,
            member_ids,
            direct_report_ids: existing.direct_report_ids,
            updated_at: now,
            version: new_version,
        })
    }

    /// Move a seat under a new supervisor (or detach it into a root).
    ///
    /// Structural validation (no-op cases, descendant exclusion) happens at
    /// the orchestration layer; this method performs the row surgery: unlink
    /// from the current supervisor, link under the new one, one transaction.
    pub async fn reparent_seat(
        &self,
        seat_id: &str,
        new_supervisor_id: Option<&str>,
    ) -> Result<Seat, AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let seat = fetch_seat_tx(&mut tx, seat_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Seat {} not found", seat_id)))?;

        // Unlink from whichever seat currently lists it as a direct report.
        if let Some(old_supervisor) = fetch_supervisor_tx(&mut tx, seat_id).await? {
            let report_ids: Vec<String> = old_supervisor
                .direct_report_ids
                .iter()
                .filter(|rid| rid.as_str() != seat_id)
                .cloned()
                .collect();
            store_report_ids_tx(&mut tx, &old_supervisor, &report_ids, &now).await?;
        }

        if let Some(supervisor_id) = new_supervisor_id {
            let supervisor = fetch_seat_tx(&mut tx, supervisor_id)
                .await?
                .ok_or_else(|| {
                    AppError::Validation(format!("Supervisor seat {} not found", supervisor_id))
                })?;

            let mut report_ids = supervisor.direct_report_ids.clone();
            if !report_ids.iter().any(|rid| rid == seat_id) {
                report_ids.push(seat_id.to_string());
            }
            store_report_ids_tx(&mut tx, &supervisor, &report_ids, &now).await?;
        }

        increment_revision_tx(&mut tx, &now).await?;
        tx.commit().await?;

        Ok(seat)
    }

    /// Delete a seat, reassigning any direct reports to another seat.
    ///
    /// Refused when the seat still has direct reports and no reassignment
    /// target is supplied.
    pub async fn delete_seat(&self, id: &str, reassign_to: Option<&str>) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let seat = fetch_seat_tx(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Seat {} not found", id)))?;

        if !seat.direct_report_ids.is_empty() {
            let Some(target_id) = reassign_to else {
                return Err(AppError::Validation(format!(
                    "Seat {} has {} direct reports; supply reassignTo before deleting",
                    id,
                    seat.direct_report_ids.len()
                )));
            };

            let target = fetch_seat_tx(&mut tx, target_id).await?.ok_or_else(|| {
                AppError::Validation(format!("Reassignment seat {} not found", target_id))
            })?;

            let mut report_ids = target.direct_report_ids.clone();
            for orphan in &seat.direct_report_ids {
                if !report_ids.iter().any(|rid| rid == orphan) {
                    report_ids.push(orphan.clone());
                }
            }
            store_report_ids_tx(&mut tx, &target, &report_ids, &now).await?;
        }

        // Unlink from its supervisor, then remove the row.
        if let Some(supervisor) = fetch_supervisor_tx(&mut tx, id).await? {
            let report_ids: Vec<String> = supervisor
                .direct_report_ids
                .iter()
                .filter(|rid| rid.as_str() != id)
                .cloned()
                .collect();
            store_report_ids_tx(&mut tx, &supervisor, &report_ids, &now).await?;
        }

        sqlx::query("DELETE FROM seats WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        increment_revision_tx(&mut tx, &now).await?;
        tx.commit().await?;

        Ok(())
    }
}

// Transaction helpers. SQLite has no JSON-array operators worth relying on,
// so linked rows are read, rewritten in memory, and stored back.

async fn fetch_seat_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: &str,
) -> Result<Option<Seat>, AppError> {
    let row = sqlx::query(
        "SELECT id, position_title, position_roles, member_ids, direct_report_ids, updated_at, version FROM seats WHERE id = ?"
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.as_ref().map(seat_from_row))
}

/// Find the seat that lists `seat_id` among its direct reports, if any.
async fn fetch_supervisor_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    seat_id: &str,
) -> Result<Option<Seat>, AppError> {
    let rows = sqlx::query(
        "SELECT id, position_title, position_roles, member_ids, direct_report_ids, updated_at, version FROM seats"
    )
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows
        .iter()
        .map(seat_from_row)
        .find(|seat| seat.direct_report_ids.iter().any(|rid| rid == seat_id)))
}

async fn store_report_ids_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    seat: &Seat,
    report_ids: &[String],
    now: &str,
) -> Result<(), AppError> {
    let json = serde_json::to_string(report_ids).unwrap_or_default();
    sqlx::query(
        "UPDATE seats SET direct_report_ids = ?, updated_at = ?, version = version + 1 WHERE id = ?",
    )
    .bind(&json)
    .bind(now)
    .bind(&seat.id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn increment_revision_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    now: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(now)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// Helper functions for row conversion

fn seat_from_row(row: &sqlx::sqlite::SqliteRow) -> Seat {
    let title: Option<String> = row.get("position_title");
    let roles_str: Option<String> = row.get("position_roles");
    let member_ids_str: Option<String> = row.get("member_ids");
    let report_ids_str: Option<String> = row.get("direct_report_ids");

    let position = title.map(|title| SeatPosition {
        title,
        roles: roles_str.map(|s| parse_json_array(&s)).unwrap_or_default(),
    });

    Seat {
        id: row.get("id"),
        position,
        member_ids: member_ids_str
            .map(|s| parse_json_array(&s))
            .unwrap_or_default(),
        direct_report_ids: report_ids_str
            .map(|s| parse_json_array(&s))
            .unwrap_or_default(),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> Member {
    let active: i32 = row.get("active");
    let admin: i32 = row.get("admin");
    Member {
        id: row.get("id"),
        display_name: row.get("display_name"),
        email: row.get("email"),
        active: active != 0,
        admin: admin != 0,
        color: row.get("color"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

fn role_from_row(row: &sqlx::sqlite::SqliteRow) -> PositionRole {
    PositionRole {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
        version: row.get("version"),
    }
}

fn position_columns(position: &Option<SeatPosition>) -> (Option<String>, Option<String>) {
    match position {
        Some(position) => (
            Some(position.title.clone()),
            Some(serde_json::to_string(&position.roles).unwrap_or_default()),
        ),
        None => (None, None),
    }
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
