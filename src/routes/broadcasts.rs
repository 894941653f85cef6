// src/routes/broadcasts.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{query, query_as, SqlitePool};
use tracing::info;

use super::non_blank;
use crate::auth::{AdminSession, Session};
use crate::error::{AppError, AppResult};
use crate::models::{Broadcast, Category, MessageResp};
use crate::validation::{self, FieldErrors};
use crate::AppState;

/// Newest active broadcast for a category, if any.
pub(crate) async fn active_for_category(pool: &SqlitePool, category: Category) -> AppResult<Option<Broadcast>> {
    let row = query_as::<_, Broadcast>(
        r#"
        SELECT * FROM broadcasts
         WHERE category = ?1 AND is_active = 1
         ORDER BY start_time DESC, id DESC
         LIMIT 1
        "#,
    )
    .bind(category)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[derive(Deserialize)]
pub struct CreateBroadcastBody {
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub expected_resolution_time: Option<String>,
}

/// POST /api/broadcasts/
pub async fn create_broadcast(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Json(b): Json<CreateBroadcastBody>,
) -> AppResult<(StatusCode, Json<Broadcast>)> {
    let category: Category = b.category.parse()?;
    let mut errs = FieldErrors::default();
    errs.check("title", validation::required("Title", &b.title))
        .check("message", validation::required("Message", &b.message));
    errs.into_result()?;

    let now = Utc::now();
    let row = query_as::<_, Broadcast>(
        r#"
        INSERT INTO broadcasts(category, title, message, expected_resolution_time, is_active, start_time, created_by, updated_at)
        VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?5)
        RETURNING *
        "#,
    )
    .bind(category)
    .bind(b.title.trim())
    .bind(b.message.trim())
    .bind(non_blank(b.expected_resolution_time.as_deref()))
    .bind(now)
    .bind(admin.id)
    .fetch_one(&state.pool)
    .await?;

    info!(broadcast_id = row.id, admin_id = admin.id, category = %category, "broadcast published");
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/broadcasts/
pub async fn list_broadcasts(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> AppResult<Json<Vec<Broadcast>>> {
    let rows = query_as::<_, Broadcast>(r#"SELECT * FROM broadcasts ORDER BY start_time DESC, id DESC"#)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(rows))
}

/// GET /api/broadcasts/active/
///
/// Open to every signed-in role; students see these as banners.
pub async fn list_active(
    State(state): State<AppState>,
    _session: Session,
) -> AppResult<Json<Vec<Broadcast>>> {
    let rows = query_as::<_, Broadcast>(
        r#"SELECT * FROM broadcasts WHERE is_active = 1 ORDER BY start_time DESC, id DESC"#,
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct PatchBroadcastBody {
    pub title: Option<String>,
    pub message: Option<String>,
    pub expected_resolution_time: Option<String>,
    pub is_active: Option<bool>,
}

/// PATCH /api/broadcasts/:id/
pub async fn patch_broadcast(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
    Json(b): Json<PatchBroadcastBody>,
) -> AppResult<Json<Broadcast>> {
    let row = query_as::<_, Broadcast>(
        r#"
        UPDATE broadcasts SET
          title = COALESCE(?2, title),
          message = COALESCE(?3, message),
          expected_resolution_time = COALESCE(?4, expected_resolution_time),
          is_active = COALESCE(?5, is_active),
          updated_at = ?6
        WHERE id = ?1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(non_blank(b.title.as_deref()))
    .bind(non_blank(b.message.as_deref()))
    .bind(non_blank(b.expected_resolution_time.as_deref()))
    .bind(b.is_active)
    .bind(Utc::now())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Broadcast not found"))?;

    info!(broadcast_id = id, admin_id = admin.id, active = row.is_active, "broadcast updated");
    Ok(Json(row))
}

/// DELETE /api/broadcasts/:id/
pub async fn delete_broadcast(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResp>> {
    let res = query(r#"DELETE FROM broadcasts WHERE id = ?1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Broadcast not found"));
    }
    info!(broadcast_id = id, admin_id = admin.id, "broadcast deleted");
    Ok(Json(MessageResp::new("Broadcast deleted")))
}
