// src/routes/staffs.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, SqlitePool};
use tracing::info;

use crate::auth::AdminSession;
use crate::db::accounts::{self, NewUser};
use crate::error::{AppError, AppResult};
use crate::models::{MessageResp, Role, User};
use crate::validation::{self, FieldErrors};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateStaffBody {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub mobile_number: String,
}

/// POST /api/admin/staff/create/
pub async fn create_staff(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Json(b): Json<CreateStaffBody>,
) -> AppResult<(StatusCode, Json<User>)> {
    let mut errs = FieldErrors::default();
    errs.check("full_name", validation::required("Full name", &b.full_name))
        .check("email", validation::email(&b.email))
        .check("password", validation::required("Password", &b.password))
        .check("mobile_number", validation::mobile(&b.mobile_number));
    errs.into_result()?;

    if accounts::email_exists(&state.pool, &b.email).await? {
        return Err(AppError::conflict("Email already registered"));
    }

    let staff = accounts::insert(
        &state.pool,
        NewUser {
            email: &b.email,
            full_name: &b.full_name,
            mobile_number: Some(b.mobile_number.trim()),
            role: Role::Staff,
            password: &b.password,
        },
    )
    .await?;

    info!(staff_id = staff.id, admin_id = admin.id, "staff account created");
    Ok((StatusCode::CREATED, Json(staff)))
}

/// An active staff member and their current workload.
#[derive(Serialize, FromRow)]
pub struct StaffEntry {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub mobile_number: Option<String>,
    pub active_complaints: i64,
    pub available: bool,
}

async fn staff_entries(pool: &SqlitePool, only_available: bool) -> AppResult<Vec<StaffEntry>> {
    let rows = query_as::<_, StaffEntry>(
        r#"
        SELECT id, full_name, email, mobile_number, active_complaints, active_complaints = 0 AS available
          FROM (
            SELECT u.id, u.full_name, u.email, u.mobile_number,
                   (SELECT COUNT(*) FROM complaints c
                     WHERE c.assigned_to = u.id AND c.status IN ('Submitted', 'In Progress')) AS active_complaints
              FROM users u
             WHERE u.role = 'staff' AND u.is_active = 1
          )
         WHERE ?1 = 0 OR active_complaints = 0
         ORDER BY full_name
        "#,
    )
    .bind(only_available)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// GET /api/admin/staff/
pub async fn list_staff(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> AppResult<Json<Vec<StaffEntry>>> {
    Ok(Json(staff_entries(&state.pool, false).await?))
}

/// GET /api/admin/staff/available/
pub async fn list_available(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> AppResult<Json<Vec<StaffEntry>>> {
    Ok(Json(staff_entries(&state.pool, true).await?))
}

/// DELETE /api/admin/staff/:id/delete/
///
/// Soft delete: the account is deactivated so history keeps its names.
pub async fn delete_staff(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResp>> {
    if !accounts::set_active(&state.pool, id, Role::Staff, false).await? {
        return Err(AppError::not_found("Staff not found"));
    }
    info!(staff_id = id, admin_id = admin.id, "staff account deactivated");
    Ok(Json(MessageResp::new("Staff deleted")))
}
