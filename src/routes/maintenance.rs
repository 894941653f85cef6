// src/routes/maintenance.rs
//
// Recurring upkeep. Staff submit a completion log; the task only moves to its
// next due date once an admin approves that log.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::info;

use super::non_blank;
use crate::auth::{AdminSession, Session, StaffSession};
use crate::db::accounts;
use crate::error::{AppError, AppResult};
use crate::models::{Frequency, MaintenanceLog, MaintenanceLogStatus, MaintenanceTask, Role};
use crate::uploads::{store_optional, FormData};
use crate::AppState;

/// Next due date after an approved completion; `None` retires the task.
pub fn next_due(frequency: Frequency, due: NaiveDate) -> Option<NaiveDate> {
    match frequency {
        Frequency::OneTime => None,
        Frequency::Daily => due.checked_add_days(Days::new(1)),
        Frequency::Weekly => due.checked_add_days(Days::new(7)),
        // chrono clamps to the last day of a shorter month
        Frequency::Monthly => due.checked_add_months(Months::new(1)),
    }
}

async fn task<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<MaintenanceTask> {
    query_as::<_, MaintenanceTask>(r#"SELECT * FROM maintenance_tasks WHERE id = ?1"#)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))
}

async fn check_assignee(pool: &SqlitePool, staff_id: Option<i64>) -> AppResult<()> {
    if let Some(id) = staff_id {
        accounts::find_active_with_role(pool, id, Role::Staff)
            .await?
            .ok_or_else(|| AppError::bad_request("Invalid staff member"))?;
    }
    Ok(())
}

// ───────────────────────────────────────
// Tasks
// ───────────────────────────────────────

/// GET /api/maintenance/tasks/
///
/// Admins see every task. Staff see active tasks for them or for everyone
/// that are not already waiting on approval.
pub async fn list_tasks(State(state): State<AppState>, session: Session) -> AppResult<Json<Vec<MaintenanceTask>>> {
    let rows = match &session {
        Session::Admin(_) => {
            query_as::<_, MaintenanceTask>(r#"SELECT * FROM maintenance_tasks ORDER BY next_due_date, id"#)
                .fetch_all(&state.pool)
                .await?
        }
        Session::Staff(me) => {
            query_as::<_, MaintenanceTask>(
                r#"
                SELECT t.* FROM maintenance_tasks t
                 WHERE t.is_active = 1
                   AND (t.assigned_to IS NULL OR t.assigned_to = ?1)
                   AND NOT EXISTS (
                     SELECT 1 FROM maintenance_logs l WHERE l.task_id = t.id AND l.status = 'Pending'
                   )
                 ORDER BY t.next_due_date, t.id
                "#,
            )
            .bind(me.id)
            .fetch_all(&state.pool)
            .await?
        }
        Session::Student(_) => return Err(AppError::forbidden("Staff or admin access required")),
    };
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct CreateTaskBody {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub frequency: Option<String>,
    pub assigned_to: Option<i64>,
    pub next_due_date: NaiveDate,
}

/// POST /api/maintenance/tasks/
pub async fn create_task(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Json(b): Json<CreateTaskBody>,
) -> AppResult<(StatusCode, Json<MaintenanceTask>)> {
    let title = non_blank(Some(b.title.as_str())).ok_or_else(|| AppError::bad_request("Title is required"))?;
    let frequency = non_blank(b.frequency.as_deref())
        .map(str::parse::<Frequency>)
        .transpose()?
        .unwrap_or(Frequency::OneTime);
    check_assignee(&state.pool, b.assigned_to).await?;

    let now = Utc::now();
    let row = query_as::<_, MaintenanceTask>(
        r#"
        INSERT INTO maintenance_tasks(title, description, frequency, assigned_to, next_due_date, is_active, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
        RETURNING *
        "#,
    )
    .bind(title)
    .bind(non_blank(b.description.as_deref()))
    .bind(frequency)
    .bind(b.assigned_to)
    .bind(b.next_due_date)
    .bind(now)
    .fetch_one(&state.pool)
    .await?;

    info!(task_id = row.id, admin_id = admin.id, frequency = %frequency, "maintenance task created");
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Deserialize)]
pub struct PatchTaskBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<String>,
    /// `null` unassigns the task; a missing field leaves it alone.
    #[serde(default, deserialize_with = "super::double_option")]
    pub assigned_to: Option<Option<i64>>,
    pub next_due_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

/// PATCH /api/maintenance/tasks/:id/
pub async fn patch_task(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<i64>,
    Json(b): Json<PatchTaskBody>,
) -> AppResult<Json<MaintenanceTask>> {
    let frequency = non_blank(b.frequency.as_deref()).map(str::parse::<Frequency>).transpose()?;
    check_assignee(&state.pool, b.assigned_to.flatten()).await?;

    let row = query_as::<_, MaintenanceTask>(
        r#"
        UPDATE maintenance_tasks SET
          title = COALESCE(?2, title),
          description = COALESCE(?3, description),
          frequency = COALESCE(?4, frequency),
          assigned_to = CASE WHEN ?9 THEN ?5 ELSE assigned_to END,
          next_due_date = COALESCE(?6, next_due_date),
          is_active = COALESCE(?7, is_active),
          updated_at = ?8
        WHERE id = ?1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(non_blank(b.title.as_deref()))
    .bind(non_blank(b.description.as_deref()))
    .bind(frequency)
    .bind(b.assigned_to.flatten())
    .bind(b.next_due_date)
    .bind(b.is_active)
    .bind(Utc::now())
    .bind(b.assigned_to.is_some())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Task not found"))?;
    Ok(Json(row))
}

/// DELETE /api/maintenance/tasks/:id/
pub async fn delete_task(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let res = query(r#"DELETE FROM maintenance_tasks WHERE id = ?1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Task not found"));
    }
    info!(task_id = id, admin_id = admin.id, "maintenance task deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct CompleteResp {
    pub status: &'static str,
    pub log_id: i64,
}

/// POST /api/maintenance/tasks/:id/complete/ (multipart: `notes`, `proof_image`)
pub async fn complete_task(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<CompleteResp>)> {
    let mut form = FormData::read(multipart).await?;
    let t = task(&state.pool, id).await?;
    if !t.is_active {
        return Err(AppError::bad_request("Task is no longer active"));
    }
    if t.assigned_to.is_some_and(|a| a != me.id) {
        return Err(AppError::forbidden("Task is assigned to another staff member"));
    }

    let pending: Option<(i64,)> =
        query_as(r#"SELECT id FROM maintenance_logs WHERE task_id = ?1 AND status = 'Pending' LIMIT 1"#)
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    if pending.is_some() {
        return Err(AppError::conflict("Task is already awaiting approval"));
    }

    let notes = form.text("notes").map(str::to_string);
    let proof = store_optional(&state.media_root, "maintenance_proofs", &mut form, "proof_image").await?;
    let (log_id,): (i64,) = query_as(
        r#"
        INSERT INTO maintenance_logs(task_id, completed_by, completion_date, status, notes, proof_image)
        VALUES (?1, ?2, ?3, 'Pending', ?4, ?5)
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(me.id)
    .bind(Utc::now())
    .bind(notes)
    .bind(proof)
    .fetch_one(&state.pool)
    .await?;

    info!(task_id = id, log_id, staff_id = me.id, "maintenance completion submitted");
    Ok((
        StatusCode::CREATED,
        Json(CompleteResp { status: "Task Completion Submitted for Approval", log_id }),
    ))
}

// ───────────────────────────────────────
// Logs & review
// ───────────────────────────────────────
#[derive(Deserialize)]
pub struct LogFilter {
    pub task_id: Option<i64>,
}

/// GET /api/maintenance/logs/?task_id=
///
/// Staff only see the logs they submitted.
pub async fn list_logs(
    State(state): State<AppState>,
    session: Session,
    Query(f): Query<LogFilter>,
) -> AppResult<Json<Vec<MaintenanceLog>>> {
    let completed_by = match &session {
        Session::Admin(_) => None,
        Session::Staff(me) => Some(me.id),
        Session::Student(_) => return Err(AppError::forbidden("Staff or admin access required")),
    };
    let rows = query_as::<_, MaintenanceLog>(
        r#"
        SELECT * FROM maintenance_logs
         WHERE (?1 IS NULL OR task_id = ?1)
           AND (?2 IS NULL OR completed_by = ?2)
         ORDER BY completion_date DESC, id DESC
        "#,
    )
    .bind(f.task_id)
    .bind(completed_by)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

// Moves a Pending log to `to`; anything already reviewed is refused.
async fn review(conn: &mut SqliteConnection, id: i64, to: MaintenanceLogStatus, comment: Option<&str>) -> AppResult<MaintenanceLog> {
    let updated = query_as::<_, MaintenanceLog>(
        r#"
        UPDATE maintenance_logs SET status = ?2, admin_comment = COALESCE(?3, admin_comment)
         WHERE id = ?1 AND status = 'Pending'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(to)
    .bind(comment)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(log) = updated {
        return Ok(log);
    }
    let current: Option<(MaintenanceLogStatus,)> = query_as(r#"SELECT status FROM maintenance_logs WHERE id = ?1"#)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Err(match current {
        Some((status,)) => AppError::conflict(format!("Log is already {status}")),
        None => AppError::not_found("Log not found"),
    })
}

#[derive(Serialize)]
pub struct ApproveResp {
    pub status: &'static str,
    pub next_due_date: Option<NaiveDate>,
    pub is_active: bool,
}

/// POST /api/maintenance/logs/:id/approve/
pub async fn approve_log(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
) -> AppResult<Json<ApproveResp>> {
    let mut tx = state.pool.begin().await?;
    let log = review(&mut *tx, id, MaintenanceLogStatus::Approved, None).await?;
    let t = task(&mut *tx, log.task_id).await?;

    let resp = match next_due(t.frequency, t.next_due_date) {
        Some(next) => {
            query(r#"UPDATE maintenance_tasks SET next_due_date = ?2, updated_at = ?3 WHERE id = ?1"#)
                .bind(t.id)
                .bind(next)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            ApproveResp { status: "Log Approved and Task Rescheduled", next_due_date: Some(next), is_active: true }
        }
        None => {
            query(r#"UPDATE maintenance_tasks SET is_active = 0, updated_at = ?2 WHERE id = ?1"#)
                .bind(t.id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            ApproveResp { status: "Log Approved and Task Completed", next_due_date: None, is_active: false }
        }
    };
    tx.commit().await?;

    info!(log_id = id, task_id = t.id, admin_id = admin.id, next_due = ?resp.next_due_date, "maintenance log approved");
    Ok(Json(resp))
}

#[derive(Deserialize)]
pub struct RejectBody {
    #[serde(default)]
    pub admin_comment: String,
}

/// POST /api/maintenance/logs/:id/reject/
///
/// The task stays open so staff can submit again.
pub async fn reject_log(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
    Json(b): Json<RejectBody>,
) -> AppResult<Json<MaintenanceLog>> {
    let comment = non_blank(Some(b.admin_comment.as_str()))
        .ok_or_else(|| AppError::bad_request("A comment is required to reject a log"))?;
    let mut conn = state.pool.acquire().await?;
    let log = review(&mut *conn, id, MaintenanceLogStatus::Rejected, Some(comment)).await?;

    info!(log_id = id, admin_id = admin.id, "maintenance log rejected");
    Ok(Json(log))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn reschedule_by_frequency() {
        assert_eq!(next_due(Frequency::Daily, d(2024, 12, 31)), Some(d(2025, 1, 1)));
        assert_eq!(next_due(Frequency::Weekly, d(2024, 3, 1)), Some(d(2024, 3, 8)));
        assert_eq!(next_due(Frequency::OneTime, d(2024, 3, 1)), None);
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        assert_eq!(next_due(Frequency::Monthly, d(2024, 1, 31)), Some(d(2024, 2, 29)));
        assert_eq!(next_due(Frequency::Monthly, d(2023, 1, 31)), Some(d(2023, 2, 28)));
        assert_eq!(next_due(Frequency::Monthly, d(2024, 5, 15)), Some(d(2024, 6, 15)));
    }
}
