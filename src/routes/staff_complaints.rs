// src/routes/staff_complaints.rs
//
// Staff side of the complaint lifecycle: work queue, resolution, escalation.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, SqlitePool};
use tracing::info;

use super::{ensure_applied, stale};
use crate::auth::{Session, StaffSession};
use crate::db::complaints;
use crate::error::{AppError, AppResult};
use crate::lifecycle::{self, dedupe_ids, LifecycleError};
use crate::models::{
    BulkResult, Category, ChatMessage, ChatSender, Complaint, ComplaintDetail, ComplaintLog, ComplaintStatus, ComplaintView,
    MessageResp,
};
use crate::uploads::{discard_image, store_image, FormData};
use crate::AppState;

// ───────────────────────────────────────
// Dashboard & queues
// ───────────────────────────────────────
#[derive(Serialize, FromRow)]
pub struct StaffDashboard {
    pub assigned: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub escalated: i64,
}

/// GET /api/staff/dashboard/
pub async fn dashboard(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
) -> AppResult<Json<StaffDashboard>> {
    let row = query_as::<_, StaffDashboard>(
        r#"
        SELECT
          COALESCE(SUM(assigned_to = ?1 AND status IN ('Submitted', 'In Progress')), 0) AS assigned,
          COALESCE(SUM(assigned_to = ?1 AND status = 'In Progress'), 0)                AS in_progress,
          COALESCE(SUM(resolved_by = ?1 AND status IN ('Resolved', 'Closed')), 0)       AS resolved,
          COALESCE(SUM(escalated_by = ?1 AND escalated = 1 AND status <> 'Closed'), 0)  AS escalated
        FROM complaints
        "#,
    )
    .bind(me.id)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(row))
}

/// GET /api/staff/complaints/
///
/// Active complaints assigned to the caller, with chat for escalated ones.
pub async fn list_assigned(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
) -> AppResult<Json<Vec<ComplaintDetail>>> {
    let rows = query_as::<_, Complaint>(
        r#"
        SELECT * FROM complaints
         WHERE assigned_to = ?1 AND status IN ('Submitted', 'In Progress')
         ORDER BY CASE priority WHEN 'High' THEN 0 WHEN 'Medium' THEN 1 ELSE 2 END, created_at DESC
        "#,
    )
    .bind(me.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(complaints::details(&state.pool, rows).await?))
}

/// GET /api/staff/complaints/escalated/
pub async fn list_escalated(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
) -> AppResult<Json<Vec<ComplaintDetail>>> {
    let rows = query_as::<_, Complaint>(
        r#"
        SELECT * FROM complaints
         WHERE escalated = 1 AND escalated_by = ?1
         ORDER BY escalated_at DESC, id DESC
        "#,
    )
    .bind(me.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(complaints::details(&state.pool, rows).await?))
}

// ───────────────────────────────────────
// Status updates
// ───────────────────────────────────────
async fn start_one(pool: &SqlitePool, staff_id: i64, c: &Complaint) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    let res = query(
        r#"
        UPDATE complaints SET status = 'In Progress'
         WHERE id = ?1 AND status = 'Submitted' AND assigned_to = ?2
        "#,
    )
    .bind(c.id)
    .bind(staff_id)
    .execute(&mut *tx)
    .await?;
    ensure_applied(res.rows_affected(), stale())?;
    complaints::add_log(&mut *tx, c.id, "In Progress", staff_id, Some("Work started"), None).await?;
    tx.commit().await?;

    info!(complaint_id = c.id, staff_id, "work started");
    Ok(())
}

async fn resolve_one(
    pool: &SqlitePool,
    staff_id: i64,
    id: i64,
    notes: &str,
    proof: Option<&str>,
) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    let res = query(
        r#"
        UPDATE complaints SET
          status = 'Resolved',
          resolution_notes = ?3,
          resolution_proof = COALESCE(?4, resolution_proof),
          resolved_by = ?2,
          resolved_at = ?5
        WHERE id = ?1 AND status = 'In Progress' AND assigned_to = ?2
        "#,
    )
    .bind(id)
    .bind(staff_id)
    .bind(notes.trim())
    .bind(proof)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    ensure_applied(res.rows_affected(), stale())?;
    complaints::add_log(&mut *tx, id, "Resolved", staff_id, Some(notes.trim()), proof).await?;
    tx.commit().await?;

    info!(complaint_id = id, staff_id, "complaint resolved");
    Ok(())
}

/// PATCH /api/staff/complaints/:id/update/ (multipart)
///
/// Fields: `status`, `resolution_notes`, optional `resolution_proof` image.
pub async fn update(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Json<Complaint>> {
    let mut form = FormData::read(multipart).await?;
    let to: ComplaintStatus = form
        .text("status")
        .ok_or(LifecycleError::MissingField("status"))?
        .parse()?;
    let notes = form.text("resolution_notes").map(str::to_string);

    let c = complaints::get(&state.pool, id).await?;
    lifecycle::staff_update(&c, me.id, to, notes.as_deref())?;

    match to {
        ComplaintStatus::InProgress => start_one(&state.pool, me.id, &c).await?,
        _ => {
            // Only stored once the transition is known to be valid.
            let proof = match form.take_file("resolution_proof") {
                Some(upload) => Some(store_image(&state.media_root, "resolution_proofs", &upload).await?),
                None => None,
            };
            let notes = notes.unwrap_or_default();
            if let Err(e) = resolve_one(&state.pool, me.id, id, &notes, proof.as_deref()).await {
                if let Some(url) = &proof {
                    discard_image(&state.media_root, url).await;
                }
                return Err(e);
            }
        }
    }
    Ok(Json(complaints::get(&state.pool, id).await?))
}

#[derive(Deserialize)]
pub struct BulkResolveBody {
    #[serde(alias = "complaint_ids")]
    pub ids: Vec<i64>,
    #[serde(default)]
    pub resolution_notes: String,
}

/// POST /api/staff/complaints/bulk-resolve/
pub async fn bulk_resolve(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
    Json(b): Json<BulkResolveBody>,
) -> AppResult<Json<BulkResult>> {
    let mut out = BulkResult::default();
    for id in dedupe_ids(&b.ids) {
        let outcome: AppResult<()> = async {
            let c = complaints::get(&state.pool, id).await?;
            lifecycle::staff_update(&c, me.id, ComplaintStatus::Resolved, Some(b.resolution_notes.as_str()))?;
            resolve_one(&state.pool, me.id, id, &b.resolution_notes, None).await
        }
        .await;
        match outcome {
            Ok(()) => out.push_ok(id),
            Err(e) => out.push_err(id, e.client_message()),
        }
    }
    info!(staff_id = me.id, ok = out.succeeded, failed = out.failed, "bulk resolve");
    Ok(Json(out))
}

// ───────────────────────────────────────
// Escalation
// ───────────────────────────────────────
#[derive(Deserialize)]
pub struct EscalateBody {
    #[serde(default, alias = "escalation_note")]
    pub note: String,
}

/// POST /api/staff/complaints/:id/escalate/
///
/// The note becomes the first message of the escalation chat.
pub async fn escalate(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
    Path(id): Path<i64>,
    Json(b): Json<EscalateBody>,
) -> AppResult<Json<ComplaintDetail>> {
    let c = complaints::get(&state.pool, id).await?;
    lifecycle::escalate(&c, me.id, Some(b.note.as_str()))?;
    let note = b.note.trim();

    let mut tx = state.pool.begin().await?;
    let res = query(
        r#"
        UPDATE complaints SET escalated = 1, escalation_note = ?3, escalated_by = ?2, escalated_at = ?4
         WHERE id = ?1 AND escalated = 0 AND status = 'In Progress' AND assigned_to = ?2
        "#,
    )
    .bind(id)
    .bind(me.id)
    .bind(note)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    ensure_applied(res.rows_affected(), LifecycleError::AlreadyEscalated)?;
    let posted = complaints::append_chat(&mut *tx, id, me.id, ChatSender::Staff, note).await?;
    ensure_applied(posted, stale())?;
    complaints::add_log(&mut *tx, id, "Escalated", me.id, Some(note), None).await?;
    tx.commit().await?;

    info!(complaint_id = id, staff_id = me.id, "complaint escalated");
    let c = complaints::get(&state.pool, id).await?;
    Ok(Json(complaints::detail(&state.pool, c).await?))
}

#[derive(Deserialize)]
pub struct ReplyBody {
    #[serde(default)]
    pub message: String,
}

/// POST /api/staff/complaints/:id/escalate-reply/
pub async fn escalation_reply(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
    Path(id): Path<i64>,
    Json(b): Json<ReplyBody>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    let staff_id = me.id;
    let chat = super::reply_to_escalation(&state, &Session::Staff(me), id, &b.message).await?;

    info!(complaint_id = id, staff_id, "staff replied to escalation");
    Ok(Json(chat))
}

// ───────────────────────────────────────
// History, timeline, ratings
// ───────────────────────────────────────

/// GET /api/staff/history/
pub async fn history(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
) -> AppResult<Json<Vec<ComplaintView>>> {
    let rows = query_as::<_, Complaint>(
        r#"
        SELECT * FROM complaints
         WHERE resolved_by = ?1 AND status IN ('Resolved', 'Closed') AND cleared_by_staff = 0
         ORDER BY resolved_at DESC, id DESC
        "#,
    )
    .bind(me.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(complaints::views(&state.pool, rows).await?))
}

/// PATCH /api/staff/history/clear/:id/
///
/// Hides the complaint from the caller's history; the record itself stays.
pub async fn clear_history(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResp>> {
    let res = query(r#"UPDATE complaints SET cleared_by_staff = 1 WHERE id = ?1 AND resolved_by = ?2"#)
        .bind(id)
        .bind(me.id)
        .execute(&state.pool)
        .await?;
    ensure_applied(res.rows_affected(), AppError::not_found("Complaint not found in your history"))?;
    Ok(Json(MessageResp::new("Removed from history")))
}

#[derive(Serialize)]
pub struct Timeline {
    pub complaint_id: i64,
    pub status: ComplaintStatus,
    pub logs: Vec<ComplaintLog>,
}

/// GET /api/staff/complaints/:id/timeline/
pub async fn timeline(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
    Path(id): Path<i64>,
) -> AppResult<Json<Timeline>> {
    let c = complaints::get(&state.pool, id).await?;
    let involved = [c.assigned_to, c.resolved_by, c.escalated_by].contains(&Some(me.id));
    if !involved {
        return Err(LifecycleError::NotAssignee.into());
    }
    Ok(Json(Timeline {
        complaint_id: id,
        status: c.status,
        logs: complaints::logs(&state.pool, id).await?,
    }))
}

#[derive(Serialize, FromRow)]
pub struct RatingEntry {
    pub complaint_id: i64,
    pub category: Category,
    pub student_name: String,
    pub rating: i64,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub total_ratings: usize,
    pub ratings: Vec<RatingEntry>,
}

impl RatingSummary {
    fn from_entries(ratings: Vec<RatingEntry>) -> Self {
        let total = ratings.len();
        let average = if total == 0 {
            0.0
        } else {
            let sum: i64 = ratings.iter().map(|r| r.rating).sum();
            (sum as f64 / total as f64 * 10.0).round() / 10.0
        };
        Self { average_rating: average, total_ratings: total, ratings }
    }
}

/// GET /api/staff/ratings/
pub async fn ratings(
    State(state): State<AppState>,
    StaffSession(me): StaffSession,
) -> AppResult<Json<RatingSummary>> {
    let rows = query_as::<_, RatingEntry>(
        r#"
        SELECT r.complaint_id, c.category, c.student_name, r.rating, r.feedback, r.created_at
          FROM complaint_ratings r
          JOIN complaints c ON c.id = r.complaint_id
         WHERE c.resolved_by = ?1
         ORDER BY r.created_at DESC
        "#,
    )
    .bind(me.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(RatingSummary::from_entries(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rating: i64) -> RatingEntry {
        RatingEntry {
            complaint_id: 1,
            category: Category::Water,
            student_name: "Asha".into(),
            rating,
            feedback: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        let s = RatingSummary::from_entries(vec![entry(5), entry(4), entry(4)]);
        assert_eq!(s.total_ratings, 3);
        assert_eq!(s.average_rating, 4.3);
    }

    #[test]
    fn no_ratings_average_zero() {
        assert_eq!(RatingSummary::from_entries(vec![]).average_rating, 0.0);
    }
}
