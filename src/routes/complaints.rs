// src/routes/complaints.rs
//
// Student side of the complaint lifecycle: filing, listing and rating.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as};
use tracing::info;

use super::broadcasts::active_for_category;
use crate::auth::StudentSession;
use crate::db::{accounts, complaints};
use crate::error::{AppError, AppResult};
use crate::lifecycle::{self, LifecycleError};
use crate::models::{Category, Complaint, ComplaintLog, ComplaintRating, MessageResp, StudentComplaint};
use crate::uploads::{store_optional, FormData};
use crate::AppState;

/// What a student sees of their own complaint: no escalation fields, chat or
/// escalation log entries.
#[derive(Serialize)]
pub struct StudentComplaintView {
    #[serde(flatten)]
    pub complaint: StudentComplaint,
    pub assigned_to_name: Option<String>,
    pub rating: Option<ComplaintRating>,
    pub resolved_by_name: Option<String>,
    pub logs: Vec<ComplaintLog>,
}

// "Escalated" entries carry the staff member's note to the admin.
fn student_logs(logs: Vec<ComplaintLog>) -> Vec<ComplaintLog> {
    logs.into_iter().filter(|l| l.action != "Escalated").collect()
}

/// POST /api/complaints/student/ (multipart)
///
/// Fields: `complaint_category`, `description`, `hostel_id`, optional `image`
/// and `acknowledge_broadcast`. Filing under a category with an active
/// broadcast is refused until the student acknowledges it.
pub async fn create(
    State(state): State<AppState>,
    StudentSession(user): StudentSession,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<StudentComplaint>)> {
    let mut form = FormData::read(multipart).await?;

    let category: Category = form
        .text("complaint_category")
        .ok_or(LifecycleError::MissingField("complaint_category"))?
        .parse()?;
    let description = form.text("description").unwrap_or_default().to_string();
    let hostel_id = form.text("hostel_id").unwrap_or_default().to_string();
    lifecycle::submit(&description, &hostel_id)?;

    if !form.flag("acknowledge_broadcast") {
        if let Some(b) = active_for_category(&state.pool, category).await? {
            let detail = serde_json::to_value(&b).map_err(|e| AppError::Internal(e.to_string()))?;
            return Err(AppError::ConflictWith {
                message: format!("An active announcement already covers {}", category.label()),
                detail,
            });
        }
    }

    let image = store_optional(&state.media_root, "complaints", &mut form, "image").await?;
    let profile = accounts::profile(&state.pool, user.id).await?;

    let mut tx = state.pool.begin().await?;
    let complaint = query_as::<_, Complaint>(
        r#"
        INSERT INTO complaints(student_id, student_name, department, year, hostel_id, category, description, image, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&user.full_name)
    .bind(&profile.department)
    .bind(&profile.year)
    .bind(hostel_id.trim())
    .bind(category)
    .bind(description.trim())
    .bind(image)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;
    complaints::add_log(&mut *tx, complaint.id, "Submitted", user.id, Some("Complaint submitted"), None).await?;
    tx.commit().await?;

    info!(complaint_id = complaint.id, student_id = user.id, category = %category, "complaint submitted");
    Ok((StatusCode::CREATED, Json(complaint.into())))
}

/// GET /api/complaints/student/
pub async fn list_own(
    State(state): State<AppState>,
    StudentSession(user): StudentSession,
) -> AppResult<Json<Vec<StudentComplaintView>>> {
    let rows = query_as::<_, Complaint>(
        r#"SELECT * FROM complaints WHERE student_id = ?1 ORDER BY created_at DESC, id DESC"#,
    )
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for c in rows {
        let id = c.id;
        let resolved_by_name = complaints::user_name(&state.pool, c.resolved_by).await?;
        let view = complaints::view(&state.pool, c).await?;
        out.push(StudentComplaintView {
            complaint: view.complaint.into(),
            assigned_to_name: view.assigned_to_name,
            rating: view.rating,
            resolved_by_name,
            logs: student_logs(complaints::logs(&state.pool, id).await?),
        });
    }
    Ok(Json(out))
}

#[derive(Deserialize)]
pub struct RateBody {
    pub rating: i64,
    #[serde(default)]
    pub feedback: String,
}

/// POST /api/complaints/rate/:id/
///
/// Rating does not close the complaint; that stays an admin action.
pub async fn rate(
    State(state): State<AppState>,
    StudentSession(user): StudentSession,
    Path(id): Path<i64>,
    Json(b): Json<RateBody>,
) -> AppResult<(StatusCode, Json<MessageResp>)> {
    let c = complaints::get(&state.pool, id).await?;
    let has_rating = complaints::has_rating(&state.pool, id).await?;
    lifecycle::rate(&c, user.id, has_rating, b.rating)?;

    let mut tx = state.pool.begin().await?;
    let res = query(
        r#"
        INSERT OR IGNORE INTO complaint_ratings(complaint_id, student_id, rating, feedback, created_at)
        SELECT id, ?2, ?3, ?4, ?5 FROM complaints
         WHERE id = ?1 AND student_id = ?2 AND status = 'Resolved'
        "#,
    )
    .bind(id)
    .bind(user.id)
    .bind(b.rating)
    .bind(b.feedback.trim())
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    if res.rows_affected() == 0 {
        return Err(if complaints::has_rating(&mut *tx, id).await? {
            LifecycleError::AlreadyRated.into()
        } else {
            super::stale()
        });
    }
    complaints::add_log(
        &mut *tx,
        id,
        "Rated",
        user.id,
        Some(&format!("Student rated {}/5", b.rating)),
        None,
    )
    .await?;
    tx.commit().await?;

    info!(complaint_id = id, student_id = user.id, rating = b.rating, "complaint rated");
    Ok((StatusCode::CREATED, Json(MessageResp::new("Thank you for your feedback"))))
}
