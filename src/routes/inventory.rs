// src/routes/inventory.rs
//
// Stock is only ever moved through add_stock / log_usage, which write a log
// row in the same transaction. Item edits never touch quantities.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{query, query_as, SqliteConnection};
use tracing::info;

use super::non_blank;
use crate::auth::{AdminSession, Session};
use crate::db::complaints;
use crate::error::{AppError, AppResult};
use crate::models::{Category, InventoryItem, InventoryLog, MessageResp, StockAction};
use crate::AppState;

fn require_staff_or_admin(session: &Session) -> AppResult<()> {
    match session {
        Session::Staff(_) | Session::Admin(_) => Ok(()),
        Session::Student(_) => Err(AppError::forbidden("Staff or admin access required")),
    }
}

fn item_not_found() -> AppError {
    AppError::not_found("Item not found")
}

// ───────────────────────────────────────
// Items
// ───────────────────────────────────────

/// GET /api/inventory/items/
pub async fn list_items(State(state): State<AppState>, session: Session) -> AppResult<Json<Vec<InventoryItem>>> {
    require_staff_or_admin(&session)?;
    let rows = query_as::<_, InventoryItem>(r#"SELECT * FROM inventory_items ORDER BY name"#)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(rows))
}

/// GET /api/inventory/items/:id/
pub async fn get_item(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<InventoryItem>> {
    require_staff_or_admin(&session)?;
    let row = query_as::<_, InventoryItem>(r#"SELECT * FROM inventory_items WHERE id = ?1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(item_not_found)?;
    Ok(Json(row))
}

#[derive(Deserialize)]
pub struct CreateItemBody {
    #[serde(default)]
    pub name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    #[serde(default)]
    pub total_quantity: i64,
}

/// POST /api/inventory/items/
///
/// A new item starts with everything available.
pub async fn create_item(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Json(b): Json<CreateItemBody>,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    let name = non_blank(Some(b.name.as_str())).ok_or_else(|| AppError::bad_request("Item name is required"))?;
    if b.total_quantity < 0 {
        return Err(AppError::bad_request("Quantity cannot be negative"));
    }
    let category = non_blank(b.category.as_deref())
        .map(str::parse::<Category>)
        .transpose()?
        .unwrap_or(Category::Other);

    let now = Utc::now();
    let row = query_as::<_, InventoryItem>(
        r#"
        INSERT INTO inventory_items(name, category, unit, total_quantity, available_quantity, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?5)
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(category)
    .bind(non_blank(b.unit.as_deref()).unwrap_or("pcs"))
    .bind(b.total_quantity)
    .bind(now)
    .fetch_one(&state.pool)
    .await?;

    info!(item_id = row.id, admin_id = admin.id, "inventory item created");
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Deserialize)]
pub struct PatchItemBody {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
}

/// PATCH /api/inventory/items/:id/
pub async fn patch_item(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<i64>,
    Json(b): Json<PatchItemBody>,
) -> AppResult<Json<InventoryItem>> {
    let category = non_blank(b.category.as_deref()).map(str::parse::<Category>).transpose()?;
    let row = query_as::<_, InventoryItem>(
        r#"
        UPDATE inventory_items SET
          name = COALESCE(?2, name),
          category = COALESCE(?3, category),
          unit = COALESCE(?4, unit),
          updated_at = ?5
        WHERE id = ?1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(non_blank(b.name.as_deref()))
    .bind(category)
    .bind(non_blank(b.unit.as_deref()))
    .bind(Utc::now())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(item_not_found)?;
    Ok(Json(row))
}

/// DELETE /api/inventory/items/:id/
pub async fn delete_item(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResp>> {
    let res = query(r#"DELETE FROM inventory_items WHERE id = ?1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(item_not_found());
    }
    info!(item_id = id, admin_id = admin.id, "inventory item deleted");
    Ok(Json(MessageResp::new("Item deleted")))
}

// ───────────────────────────────────────
// Stock movements
// ───────────────────────────────────────
#[derive(Deserialize)]
pub struct StockBody {
    pub quantity: i64,
    #[serde(alias = "related_complaint_id")]
    pub complaint_id: Option<i64>,
}

async fn write_log(
    conn: &mut SqliteConnection,
    item_id: i64,
    user_id: i64,
    quantity_changed: i64,
    action: StockAction,
    complaint_id: Option<i64>,
) -> AppResult<()> {
    query(
        r#"
        INSERT INTO inventory_logs(item_id, user_id, quantity_changed, action, related_complaint_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(item_id)
    .bind(user_id)
    .bind(quantity_changed)
    .bind(action)
    .bind(complaint_id)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

fn positive(quantity: i64) -> AppResult<i64> {
    if quantity <= 0 {
        return Err(AppError::bad_request("Quantity must be greater than zero"));
    }
    Ok(quantity)
}

/// POST /api/inventory/items/:id/add_stock/
pub async fn add_stock(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(b): Json<StockBody>,
) -> AppResult<Json<InventoryItem>> {
    require_staff_or_admin(&session)?;
    let qty = positive(b.quantity)?;

    let mut tx = state.pool.begin().await?;
    let item = query_as::<_, InventoryItem>(
        r#"
        UPDATE inventory_items SET
          total_quantity = total_quantity + ?2,
          available_quantity = available_quantity + ?2,
          updated_at = ?3
        WHERE id = ?1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(qty)
    .bind(Utc::now())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(item_not_found)?;
    write_log(&mut *tx, id, session.user().id, qty, StockAction::Added, None).await?;
    tx.commit().await?;

    info!(item_id = id, user_id = session.user().id, quantity = qty, "stock added");
    Ok(Json(item))
}

/// POST /api/inventory/items/:id/log_usage/
///
/// Usage only lowers what is available; the total stays as stocked.
pub async fn log_usage(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(b): Json<StockBody>,
) -> AppResult<Json<InventoryItem>> {
    require_staff_or_admin(&session)?;
    let qty = positive(b.quantity)?;
    if let Some(cid) = b.complaint_id {
        complaints::get(&state.pool, cid).await?;
    }

    let mut tx = state.pool.begin().await?;
    let updated = query_as::<_, InventoryItem>(
        r#"
        UPDATE inventory_items SET
          available_quantity = available_quantity - ?2,
          updated_at = ?3
        WHERE id = ?1 AND available_quantity >= ?2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(qty)
    .bind(Utc::now())
    .fetch_optional(&mut *tx)
    .await?;

    let Some(item) = updated else {
        let exists: Option<(i64,)> = query_as(r#"SELECT id FROM inventory_items WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        return Err(match exists {
            Some(_) => AppError::bad_request("Insufficient stock"),
            None => item_not_found(),
        });
    };
    write_log(&mut *tx, id, session.user().id, -qty, StockAction::Used, b.complaint_id).await?;
    tx.commit().await?;

    info!(item_id = id, user_id = session.user().id, quantity = qty, complaint_id = ?b.complaint_id, "stock used");
    Ok(Json(item))
}

/// GET /api/inventory/items/:id/logs/
pub async fn list_logs(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<InventoryLog>>> {
    require_staff_or_admin(&session)?;
    let rows = query_as::<_, InventoryLog>(
        r#"SELECT * FROM inventory_logs WHERE item_id = ?1 ORDER BY created_at DESC, id DESC"#,
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}
