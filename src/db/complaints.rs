// src/db/complaints.rs

use chrono::Utc;
use sqlx::{query, query_as, SqliteExecutor, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::{
    ChatMessage, ChatSender, Complaint, ComplaintDetail, ComplaintLog, ComplaintRating, ComplaintView,
};

pub async fn get<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<Complaint> {
    query_as::<_, Complaint>(r#"SELECT * FROM complaints WHERE id = ?1"#)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Complaint not found"))
}

pub async fn rating<'e>(db: impl SqliteExecutor<'e>, complaint_id: i64) -> AppResult<Option<ComplaintRating>> {
    let row = query_as::<_, ComplaintRating>(r#"SELECT * FROM complaint_ratings WHERE complaint_id = ?1"#)
        .bind(complaint_id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn has_rating<'e>(db: impl SqliteExecutor<'e>, complaint_id: i64) -> AppResult<bool> {
    Ok(rating(db, complaint_id).await?.is_some())
}

pub async fn add_log<'e>(
    db: impl SqliteExecutor<'e>,
    complaint_id: i64,
    action: &str,
    performed_by: i64,
    notes: Option<&str>,
    proof: Option<&str>,
) -> AppResult<()> {
    query(
        r#"
        INSERT INTO complaint_logs(complaint_id, action, performed_by, notes, proof, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(complaint_id)
    .bind(action)
    .bind(performed_by)
    .bind(notes)
    .bind(proof)
    .bind(Utc::now())
    .execute(db)
    .await?;
    Ok(())
}

pub async fn logs<'e>(db: impl SqliteExecutor<'e>, complaint_id: i64) -> AppResult<Vec<ComplaintLog>> {
    let rows = query_as::<_, ComplaintLog>(
        r#"
        SELECT l.id, l.complaint_id, l.action, l.performed_by, u.full_name AS performed_by_name,
               l.notes, l.proof, l.created_at
          FROM complaint_logs l
          LEFT JOIN users u ON u.id = l.performed_by
         WHERE l.complaint_id = ?1
         ORDER BY l.created_at, l.id
        "#,
    )
    .bind(complaint_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn append_chat<'e>(
    db: impl SqliteExecutor<'e>,
    complaint_id: i64,
    sender_id: i64,
    sender: ChatSender,
    message: &str,
) -> AppResult<u64> {
    // Only lands while the complaint is escalated and not closed.
    let res = query(
        r#"
        INSERT INTO complaint_messages(complaint_id, sender_id, sender_role, message, created_at)
        SELECT id, ?2, ?3, ?4, ?5 FROM complaints
         WHERE id = ?1 AND escalated = 1 AND status <> 'Closed'
        "#,
    )
    .bind(complaint_id)
    .bind(sender_id)
    .bind(sender)
    .bind(message.trim())
    .bind(Utc::now())
    .execute(db)
    .await?;
    Ok(res.rows_affected())
}

/// Escalation chat, oldest first. Admin messages are signed "Admin".
pub async fn chat_history<'e>(db: impl SqliteExecutor<'e>, complaint_id: i64) -> AppResult<Vec<ChatMessage>> {
    let rows = query_as::<_, ChatMessage>(
        r#"
        SELECT m.id, m.complaint_id,
               CASE m.sender_role WHEN 'admin' THEN 'Admin' ELSE COALESCE(u.full_name, 'Staff') END AS sender_name,
               m.sender_role, m.message, m.created_at
          FROM complaint_messages m
          LEFT JOIN users u ON u.id = m.sender_id
         WHERE m.complaint_id = ?1
         ORDER BY m.created_at, m.id
        "#,
    )
    .bind(complaint_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn user_name<'e>(db: impl SqliteExecutor<'e>, id: Option<i64>) -> AppResult<Option<String>> {
    let Some(id) = id else { return Ok(None) };
    let row: Option<(String,)> = query_as(r#"SELECT full_name FROM users WHERE id = ?1"#)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row.map(|(n,)| n))
}

pub async fn view(pool: &SqlitePool, complaint: Complaint) -> AppResult<ComplaintView> {
    let assigned_to_name = user_name(pool, complaint.assigned_to).await?;
    let rating = rating(pool, complaint.id).await?;
    Ok(ComplaintView { complaint, assigned_to_name, rating })
}

pub async fn views(pool: &SqlitePool, complaints: Vec<Complaint>) -> AppResult<Vec<ComplaintView>> {
    let mut out = Vec::with_capacity(complaints.len());
    for c in complaints {
        out.push(view(pool, c).await?);
    }
    Ok(out)
}

pub async fn detail(pool: &SqlitePool, complaint: Complaint) -> AppResult<ComplaintDetail> {
    let id = complaint.id;
    let resolved_by_name = user_name(pool, complaint.resolved_by).await?;
    let escalated_by_name = user_name(pool, complaint.escalated_by).await?;
    Ok(ComplaintDetail {
        view: view(pool, complaint).await?,
        resolved_by_name,
        escalated_by_name,
        chat_history: chat_history(pool, id).await?,
        logs: logs(pool, id).await?,
    })
}

pub async fn details(pool: &SqlitePool, complaints: Vec<Complaint>) -> AppResult<Vec<ComplaintDetail>> {
    let mut out = Vec::with_capacity(complaints.len());
    for c in complaints {
        out.push(detail(pool, c).await?);
    }
    Ok(out)
}
