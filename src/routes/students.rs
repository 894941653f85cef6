// src/routes/students.rs

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{query, query_as, FromRow};
use tracing::info;

use crate::auth::AdminSession;
use crate::db::{accounts, complaints};
use crate::error::{AppError, AppResult};
use crate::models::{Complaint, ComplaintDetail, ComplaintStatus, MessageResp, Role, StudentProfile, User};
use crate::AppState;

#[derive(Serialize, FromRow)]
pub struct StudentEntry {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub mobile_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub hostel_name: Option<String>,
    pub room_number: Option<String>,
    pub total_complaints: i64,
}

/// GET /api/admin/students/
pub async fn list_students(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> AppResult<Json<Vec<StudentEntry>>> {
    let rows = query_as::<_, StudentEntry>(
        r#"
        SELECT u.id, u.full_name, u.email, u.mobile_number, u.is_active, u.created_at,
               p.hostel_name, p.room_number,
               (SELECT COUNT(*) FROM complaints c WHERE c.student_id = u.id) AS total_complaints
          FROM users u
          LEFT JOIN student_profiles p ON p.user_id = u.id
         WHERE u.role = 'student'
         ORDER BY u.created_at DESC, u.id DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

#[derive(Serialize, Default, PartialEq, Eq, Debug)]
pub struct StudentStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub closed: usize,
}

impl StudentStats {
    fn tally(complaints: &[Complaint]) -> Self {
        let mut s = Self { total: complaints.len(), ..Default::default() };
        for c in complaints {
            match c.status {
                ComplaintStatus::Submitted => s.pending += 1,
                ComplaintStatus::InProgress => s.in_progress += 1,
                ComplaintStatus::Resolved => s.resolved += 1,
                ComplaintStatus::Closed => s.closed += 1,
            }
        }
        s
    }
}

#[derive(Serialize)]
pub struct StudentDetail {
    pub student: User,
    pub profile: StudentProfile,
    pub statistics: StudentStats,
    pub complaints: Vec<ComplaintDetail>,
}

async fn student(state: &AppState, id: i64) -> AppResult<User> {
    accounts::find_by_id(&state.pool, id)
        .await?
        .filter(|u| u.role == Role::Student)
        .ok_or_else(|| AppError::not_found("Student not found"))
}

/// GET /api/admin/students/:id/
pub async fn student_detail(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<i64>,
) -> AppResult<Json<StudentDetail>> {
    let student = student(&state, id).await?;
    let profile = accounts::profile(&state.pool, id).await?;
    let rows = query_as::<_, Complaint>(
        r#"SELECT * FROM complaints WHERE student_id = ?1 ORDER BY created_at DESC, id DESC"#,
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    let statistics = StudentStats::tally(&rows);
    Ok(Json(StudentDetail {
        student,
        profile,
        statistics,
        complaints: complaints::details(&state.pool, rows).await?,
    }))
}

/// PATCH /api/admin/students/:id/toggle/
pub async fn toggle_student(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let student = student(&state, id).await?;
    let active = !student.is_active;
    accounts::set_active(&state.pool, id, Role::Student, active).await?;

    info!(student_id = id, admin_id = admin.id, active, "student access toggled");
    Ok(Json(serde_json::json!({ "id": id, "is_active": active })))
}

/// DELETE /api/admin/students/:id/remove/
///
/// Only disabled accounts can be removed; their complaints go with them.
pub async fn remove_student(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResp>> {
    let student = student(&state, id).await?;
    if student.is_active {
        return Err(AppError::bad_request("Disable the student before removing the account"));
    }
    query(r#"DELETE FROM users WHERE id = ?1 AND role = 'student'"#)
        .bind(id)
        .execute(&state.pool)
        .await?;

    info!(student_id = id, admin_id = admin.id, "student removed");
    Ok(Json(MessageResp::new("Student removed")))
}
