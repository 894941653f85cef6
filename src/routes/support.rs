// src/routes/support.rs
//
// Student <-> admin help desk. Each message carries its own read flag; opening a
// thread marks the other side's messages as read.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, SqliteConnection, SqliteExecutor};
use tracing::info;

use crate::auth::{AdminSession, StudentSession};
use crate::error::{AppError, AppResult};
use crate::models::{SupportMessage, SupportTicket, TicketCategory, TicketSender, TicketStatus};
use crate::validation::{self, FieldErrors};
use crate::AppState;

#[derive(Serialize, FromRow)]
pub struct TicketSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub ticket: SupportTicket,
    pub student_name: String,
    pub unread_count: i64,
}

#[derive(Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: SupportTicket,
    pub student_name: String,
    pub messages: Vec<SupportMessage>,
}

fn ticket_not_found() -> AppError {
    AppError::not_found("Ticket not found")
}

async fn ticket<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<SupportTicket> {
    query_as::<_, SupportTicket>(r#"SELECT * FROM support_tickets WHERE id = ?1"#)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(ticket_not_found)
}

// Tickets with the number of unread messages written by `from`.
async fn summaries(
    state: &AppState,
    student_id: Option<i64>,
    from: TicketSender,
) -> AppResult<Vec<TicketSummary>> {
    let rows = query_as::<_, TicketSummary>(
        r#"
        SELECT t.*, u.full_name AS student_name,
               (SELECT COUNT(*) FROM support_messages m
                 WHERE m.ticket_id = t.id AND m.sender = ?2 AND m.is_read = 0) AS unread_count
          FROM support_tickets t
          JOIN users u ON u.id = t.student_id
         WHERE (?1 IS NULL OR t.student_id = ?1)
         ORDER BY t.created_at DESC, t.id DESC
        "#,
    )
    .bind(student_id)
    .bind(from)
    .fetch_all(&state.pool)
    .await?;
    Ok(rows)
}

// Marks messages from `from` as read, then loads the thread.
async fn open_thread(conn: &mut SqliteConnection, t: SupportTicket, from: TicketSender) -> AppResult<TicketDetail> {
    query(r#"UPDATE support_messages SET is_read = 1 WHERE ticket_id = ?1 AND sender = ?2 AND is_read = 0"#)
        .bind(t.id)
        .bind(from)
        .execute(&mut *conn)
        .await?;
    let messages = query_as::<_, SupportMessage>(
        r#"SELECT * FROM support_messages WHERE ticket_id = ?1 ORDER BY created_at, id"#,
    )
    .bind(t.id)
    .fetch_all(&mut *conn)
    .await?;
    let (student_name,): (String,) = query_as(r#"SELECT full_name FROM users WHERE id = ?1"#)
        .bind(t.student_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(TicketDetail { ticket: t, student_name, messages })
}

async fn post_message<'e>(
    db: impl SqliteExecutor<'e>,
    ticket_id: i64,
    sender: TicketSender,
    message: &str,
) -> AppResult<SupportMessage> {
    let row = query_as::<_, SupportMessage>(
        r#"
        INSERT INTO support_messages(ticket_id, sender, message, is_read, created_at)
        VALUES (?1, ?2, ?3, 0, ?4)
        RETURNING *
        "#,
    )
    .bind(ticket_id)
    .bind(sender)
    .bind(message.trim())
    .bind(Utc::now())
    .fetch_one(db)
    .await?;
    Ok(row)
}

#[derive(Deserialize)]
pub struct ReplyBody {
    #[serde(default)]
    pub message: String,
}

fn reply_text(b: &ReplyBody) -> AppResult<&str> {
    let msg = b.message.trim();
    if msg.is_empty() {
        return Err(AppError::bad_request("Message cannot be empty"));
    }
    Ok(msg)
}

fn ensure_open(t: &SupportTicket) -> AppResult<()> {
    if t.status == TicketStatus::Resolved {
        return Err(AppError::bad_request("Ticket is resolved"));
    }
    Ok(())
}

// ───────────────────────────────────────
// Student side
// ───────────────────────────────────────

/// GET /api/students/support/
pub async fn student_list(
    State(state): State<AppState>,
    StudentSession(me): StudentSession,
) -> AppResult<Json<Vec<TicketSummary>>> {
    Ok(Json(summaries(&state, Some(me.id), TicketSender::Admin).await?))
}

#[derive(Deserialize)]
pub struct CreateTicketBody {
    pub category: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub description: String,
}

/// POST /api/students/support/create/
///
/// The description doubles as the first message of the thread.
pub async fn student_create(
    State(state): State<AppState>,
    StudentSession(me): StudentSession,
    Json(b): Json<CreateTicketBody>,
) -> AppResult<(StatusCode, Json<SupportTicket>)> {
    let category: TicketCategory = b.category.parse()?;
    let mut errs = FieldErrors::default();
    errs.check("subject", validation::required("Subject", &b.subject))
        .check("description", validation::required("Description", &b.description));
    errs.into_result()?;

    let mut tx = state.pool.begin().await?;
    let t = query_as::<_, SupportTicket>(
        r#"
        INSERT INTO support_tickets(student_id, category, subject, description, status, created_at)
        VALUES (?1, ?2, ?3, ?4, 'Open', ?5)
        RETURNING *
        "#,
    )
    .bind(me.id)
    .bind(category)
    .bind(b.subject.trim())
    .bind(b.description.trim())
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;
    post_message(&mut *tx, t.id, TicketSender::Student, &b.description).await?;
    tx.commit().await?;

    info!(ticket_id = t.id, student_id = me.id, category = %category, "support ticket opened");
    Ok((StatusCode::CREATED, Json(t)))
}

async fn own_ticket<'e>(db: impl SqliteExecutor<'e>, id: i64, student_id: i64) -> AppResult<SupportTicket> {
    let t = ticket(db, id).await?;
    if t.student_id != student_id {
        // other students' tickets are indistinguishable from missing ones
        return Err(ticket_not_found());
    }
    Ok(t)
}

/// GET /api/students/support/:id/
pub async fn student_detail(
    State(state): State<AppState>,
    StudentSession(me): StudentSession,
    Path(id): Path<i64>,
) -> AppResult<Json<TicketDetail>> {
    let mut conn = state.pool.acquire().await?;
    let t = own_ticket(&mut *conn, id, me.id).await?;
    Ok(Json(open_thread(&mut *conn, t, TicketSender::Admin).await?))
}

/// POST /api/students/support/reply/:id/
pub async fn student_reply(
    State(state): State<AppState>,
    StudentSession(me): StudentSession,
    Path(id): Path<i64>,
    Json(b): Json<ReplyBody>,
) -> AppResult<(StatusCode, Json<SupportMessage>)> {
    let msg = reply_text(&b)?;
    let t = own_ticket(&state.pool, id, me.id).await?;
    ensure_open(&t)?;
    let m = post_message(&state.pool, id, TicketSender::Student, msg).await?;

    info!(ticket_id = id, student_id = me.id, "support reply from student");
    Ok((StatusCode::CREATED, Json(m)))
}

// ───────────────────────────────────────
// Admin side
// ───────────────────────────────────────

/// GET /api/students/admin/support/
pub async fn admin_list(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> AppResult<Json<Vec<TicketSummary>>> {
    Ok(Json(summaries(&state, None, TicketSender::Student).await?))
}

/// GET /api/students/admin/support/:id/
pub async fn admin_detail(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<i64>,
) -> AppResult<Json<TicketDetail>> {
    let mut conn = state.pool.acquire().await?;
    let t = ticket(&mut *conn, id).await?;
    Ok(Json(open_thread(&mut *conn, t, TicketSender::Student).await?))
}

/// POST /api/students/admin/support/reply/:id/
///
/// The first admin reply moves an Open ticket to In Progress.
pub async fn admin_reply(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
    Json(b): Json<ReplyBody>,
) -> AppResult<(StatusCode, Json<SupportMessage>)> {
    let msg = reply_text(&b)?;
    let mut tx = state.pool.begin().await?;
    let t = ticket(&mut *tx, id).await?;
    ensure_open(&t)?;
    let m = post_message(&mut *tx, id, TicketSender::Admin, msg).await?;
    query(r#"UPDATE support_tickets SET status = 'In Progress' WHERE id = ?1 AND status = 'Open'"#)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(ticket_id = id, admin_id = admin.id, "support reply from admin");
    Ok((StatusCode::CREATED, Json(m)))
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// PATCH /api/students/admin/support/status/:id/
pub async fn admin_set_status(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
    Json(b): Json<StatusBody>,
) -> AppResult<Json<SupportTicket>> {
    let status: TicketStatus = b.status.parse()?;
    let t = query_as::<_, SupportTicket>(r#"UPDATE support_tickets SET status = ?2 WHERE id = ?1 RETURNING *"#)
        .bind(id)
        .bind(status)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(ticket_not_found)?;

    info!(ticket_id = id, admin_id = admin.id, status = %status, "support ticket status changed");
    Ok(Json(t))
}
