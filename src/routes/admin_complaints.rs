// src/routes/admin_complaints.rs
//
// Admin side of the complaint lifecycle. Each single-item action has a
// `*_one` core so the bulk endpoints apply exactly the same rules per id.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use sqlx::{query, query_as, SqlitePool};
use tracing::info;

use super::{ensure_applied, filter_value, stale};
use crate::auth::{AdminSession, Session};
use crate::db::{accounts, complaints};
use crate::error::{AppError, AppResult};
use crate::lifecycle::{self, dedupe_ids, LifecycleError};
use crate::models::{
    BulkResult, Category, ChatMessage, Complaint, ComplaintDetail, ComplaintStatus, ComplaintView, Priority, Role, User,
};
use crate::AppState;

// ───────────────────────────────────────
// Listing
// ───────────────────────────────────────
#[derive(Deserialize, Default)]
pub struct ComplaintFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    /// Exact `hostel_id`, e.g. `A-204`.
    pub hostel: Option<String>,
}

/// GET /api/admin/complaints/?status=&priority=&category=&hostel=
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(f): Query<ComplaintFilter>,
) -> AppResult<Json<Vec<ComplaintView>>> {
    let status = filter_value(&f.status).map(str::parse::<ComplaintStatus>).transpose()?;
    let priority = filter_value(&f.priority).map(str::parse::<Priority>).transpose()?;
    let category = filter_value(&f.category).map(str::parse::<Category>).transpose()?;
    let hostel = filter_value(&f.hostel);

    let rows = query_as::<_, Complaint>(
        r#"
        SELECT * FROM complaints
         WHERE (?1 IS NULL OR status = ?1)
           AND (?2 IS NULL OR priority = ?2)
           AND (?3 IS NULL OR category = ?3)
           AND (?4 IS NULL OR hostel_id = ?4)
         ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(status)
    .bind(priority)
    .bind(category)
    .bind(hostel)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(complaints::views(&state.pool, rows).await?))
}

/// GET /api/admin/complaints/:id/
pub async fn detail(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<i64>,
) -> AppResult<Json<ComplaintDetail>> {
    let c = complaints::get(&state.pool, id).await?;
    Ok(Json(complaints::detail(&state.pool, c).await?))
}

// ───────────────────────────────────────
// Single-item actions
// ───────────────────────────────────────
#[derive(Deserialize)]
pub struct PriorityBody {
    pub priority: String,
}

/// PATCH /api/admin/complaints/:id/priority/
///
/// The first successful edit locks the priority for good.
pub async fn set_priority(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
    Json(b): Json<PriorityBody>,
) -> AppResult<Json<Complaint>> {
    let priority: Priority = b.priority.parse()?;
    let c = complaints::get(&state.pool, id).await?;
    lifecycle::set_priority(&c)?;

    let mut tx = state.pool.begin().await?;
    let res = query(
        r#"
        UPDATE complaints SET priority = ?2, priority_locked = 1
         WHERE id = ?1 AND priority_locked = 0 AND status <> 'Closed'
        "#,
    )
    .bind(id)
    .bind(priority)
    .execute(&mut *tx)
    .await?;
    ensure_applied(res.rows_affected(), LifecycleError::PriorityLocked)?;
    complaints::add_log(&mut *tx, id, &format!("Priority set to {priority}"), admin.id, None, None).await?;
    tx.commit().await?;

    info!(complaint_id = id, admin_id = admin.id, priority = %priority, "priority locked");
    Ok(Json(complaints::get(&state.pool, id).await?))
}

#[derive(Deserialize)]
pub struct AssignBody {
    pub staff_id: i64,
}

async fn active_staff(pool: &SqlitePool, staff_id: i64) -> AppResult<User> {
    accounts::find_active_with_role(pool, staff_id, Role::Staff)
        .await?
        .ok_or_else(|| AppError::bad_request("Invalid staff member"))
}

async fn assign_one(pool: &SqlitePool, admin_id: i64, id: i64, staff: &User) -> AppResult<()> {
    let c = complaints::get(pool, id).await?;
    let next = lifecycle::assign(&c)?;

    let mut tx = pool.begin().await?;
    let res = query(
        r#"
        UPDATE complaints SET assigned_to = ?2, status = ?3
         WHERE id = ?1 AND status = 'Submitted' AND assigned_to IS NULL
        "#,
    )
    .bind(id)
    .bind(staff.id)
    .bind(next)
    .execute(&mut *tx)
    .await?;
    ensure_applied(res.rows_affected(), LifecycleError::AlreadyAssigned)?;
    complaints::add_log(&mut *tx, id, &format!("Assigned to {}", staff.full_name), admin_id, None, None).await?;
    tx.commit().await?;

    info!(complaint_id = id, admin_id, staff_id = staff.id, "complaint assigned");
    Ok(())
}

/// PATCH /api/admin/complaints/:id/assign/
pub async fn assign(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
    Json(b): Json<AssignBody>,
) -> AppResult<Json<Complaint>> {
    let staff = active_staff(&state.pool, b.staff_id).await?;
    assign_one(&state.pool, admin.id, id, &staff).await?;
    Ok(Json(complaints::get(&state.pool, id).await?))
}

// Moves a complaint to `to` after the admin rules allow it.
async fn set_status_one(pool: &SqlitePool, admin_id: i64, id: i64, to: ComplaintStatus) -> AppResult<()> {
    let c = complaints::get(pool, id).await?;
    let has_rating = complaints::has_rating(pool, id).await?;
    lifecycle::admin_set_status(&c, to, has_rating)?;

    let mut tx = pool.begin().await?;
    let res = query(r#"UPDATE complaints SET status = ?3 WHERE id = ?1 AND status = ?2"#)
        .bind(id)
        .bind(c.status)
        .bind(to)
        .execute(&mut *tx)
        .await?;
    ensure_applied(res.rows_affected(), stale())?;
    complaints::add_log(&mut *tx, id, to.as_str(), admin_id, None, None).await?;
    tx.commit().await?;

    info!(complaint_id = id, admin_id, from = %c.status, to = %to, "status changed");
    Ok(())
}

/// PATCH /api/admin/complaints/:id/close/
pub async fn close(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
) -> AppResult<Json<Complaint>> {
    set_status_one(&state.pool, admin.id, id, ComplaintStatus::Closed).await?;
    Ok(Json(complaints::get(&state.pool, id).await?))
}

#[derive(Deserialize)]
pub struct ReplyBody {
    #[serde(default)]
    pub message: String,
}

/// POST /api/admin/complaints/:id/escalation/reply/
pub async fn escalation_reply(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
    Json(b): Json<ReplyBody>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    let admin_id = admin.id;
    let chat = super::reply_to_escalation(&state, &Session::Admin(admin), id, &b.message).await?;

    info!(complaint_id = id, admin_id, "admin replied to escalation");
    Ok(Json(chat))
}

// ───────────────────────────────────────
// Bulk actions: best effort, one result per distinct id
// ───────────────────────────────────────
#[derive(Deserialize)]
pub struct BulkAssignBody {
    #[serde(alias = "complaint_ids")]
    pub ids: Vec<i64>,
    pub staff_id: i64,
}

/// POST /api/admin/complaints/bulk-assign/
pub async fn bulk_assign(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Json(b): Json<BulkAssignBody>,
) -> AppResult<Json<BulkResult>> {
    let staff = active_staff(&state.pool, b.staff_id).await?;

    let mut out = BulkResult::default();
    for id in dedupe_ids(&b.ids) {
        match assign_one(&state.pool, admin.id, id, &staff).await {
            Ok(()) => out.push_ok(id),
            Err(e) => out.push_err(id, e.client_message()),
        }
    }
    info!(admin_id = admin.id, ok = out.succeeded, failed = out.failed, "bulk assign");
    Ok(Json(out))
}

#[derive(Deserialize)]
pub struct BulkStatusBody {
    #[serde(alias = "complaint_ids")]
    pub ids: Vec<i64>,
    pub status: String,
}

/// POST /api/admin/complaints/bulk-update-status/
pub async fn bulk_update_status(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Json(b): Json<BulkStatusBody>,
) -> AppResult<Json<BulkResult>> {
    let to: ComplaintStatus = b.status.parse()?;

    let mut out = BulkResult::default();
    for id in dedupe_ids(&b.ids) {
        match set_status_one(&state.pool, admin.id, id, to).await {
            Ok(()) => out.push_ok(id),
            Err(e) => out.push_err(id, e.client_message()),
        }
    }
    info!(admin_id = admin.id, to = %to, ok = out.succeeded, failed = out.failed, "bulk status update");
    Ok(Json(out))
}

#[derive(Deserialize)]
pub struct BulkIdsBody {
    #[serde(alias = "complaint_ids")]
    pub ids: Vec<i64>,
}

/// POST /api/admin/complaints/clear/
///
/// Hard delete; logs, ratings and chat go with the complaint.
pub async fn bulk_clear(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Json(b): Json<BulkIdsBody>,
) -> AppResult<Json<BulkResult>> {
    let mut out = BulkResult::default();
    for id in dedupe_ids(&b.ids) {
        let res = query(r#"DELETE FROM complaints WHERE id = ?1"#)
            .bind(id)
            .execute(&state.pool)
            .await;
        match res {
            Ok(r) if r.rows_affected() > 0 => out.push_ok(id),
            Ok(_) => out.push_err(id, "Complaint not found"),
            Err(e) => out.push_err(id, AppError::from(e).client_message()),
        }
    }
    info!(admin_id = admin.id, deleted = out.succeeded, "complaints cleared");
    Ok(Json(out))
}
