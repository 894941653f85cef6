// src/routes/reports.rs
//
// Admin dashboard figures, staff performance, periodic reports and the
// staff-updates feed. Aggregation is done in Rust over loaded rows so the
// same code serves both the all-time and the date-filtered views.

use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{query, query_as, FromRow, SqlitePool};
use tracing::info;

use super::filter_value;
use crate::auth::AdminSession;
use crate::error::{AppError, AppResult};
use crate::models::{Category, Complaint, ComplaintStatus, MessageResp, User};
use crate::AppState;

// ───────────────────────────────────────
// Shared aggregation
// ───────────────────────────────────────
#[derive(Debug, Serialize)]
pub struct StaffPerformance {
    pub staff_id: i64,
    pub full_name: String,
    pub email: String,
    pub total_assigned: usize,
    pub resolved: usize,
    pub active: usize,
    /// Hours from filing to resolution, averaged.
    pub avg_resolution_time: Option<f64>,
    pub avg_rating: Option<f64>,
    pub performance_score: f64,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// resolved·2 + rating·5 − hours·0.5; missing averages count as zero.
pub fn performance_score(resolved: usize, avg_rating: Option<f64>, avg_hours: Option<f64>) -> f64 {
    round2(resolved as f64 * 2.0 + avg_rating.unwrap_or(0.0) * 5.0 - avg_hours.unwrap_or(0.0) * 0.5)
}

/// Per-staff figures over `complaints`, best performers first.
/// `ratings` maps complaint id to the student's stars.
pub fn performance(staff: &[User], complaints: &[Complaint], ratings: &HashMap<i64, i64>) -> Vec<StaffPerformance> {
    let done = |c: &Complaint| matches!(c.status, ComplaintStatus::Resolved | ComplaintStatus::Closed);

    let mut rows: Vec<StaffPerformance> = staff
        .iter()
        .map(|s| {
            let involved: Vec<&Complaint> = complaints
                .iter()
                .filter(|c| c.assigned_to == Some(s.id) || c.resolved_by == Some(s.id))
                .collect();
            let resolved: Vec<&Complaint> = involved
                .iter()
                .copied()
                .filter(|c| done(c) && c.resolved_by == Some(s.id))
                .collect();
            let active = involved
                .iter()
                .filter(|c| c.assigned_to == Some(s.id) && c.status.is_active())
                .count();

            let hours: Vec<f64> = resolved
                .iter()
                .filter_map(|c| c.resolved_at.map(|at| (at - c.created_at).num_seconds() as f64 / 3600.0))
                .collect();
            let stars: Vec<f64> = resolved
                .iter()
                .filter_map(|c| ratings.get(&c.id).map(|&r| r as f64))
                .collect();

            let avg_resolution_time = mean(&hours).map(round2);
            let avg_rating = mean(&stars).map(round2);
            StaffPerformance {
                staff_id: s.id,
                full_name: s.full_name.clone(),
                email: s.email.clone(),
                total_assigned: involved.len(),
                resolved: resolved.len(),
                active,
                avg_resolution_time,
                avg_rating,
                performance_score: performance_score(resolved.len(), avg_rating, avg_resolution_time),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.performance_score.total_cmp(&a.performance_score));
    rows
}

async fn all_ratings(pool: &SqlitePool) -> AppResult<HashMap<i64, i64>> {
    let rows: Vec<(i64, i64)> = query_as(r#"SELECT complaint_id, rating FROM complaint_ratings"#)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}

async fn staff_accounts(pool: &SqlitePool, active_only: bool) -> AppResult<Vec<User>> {
    let rows = query_as::<_, User>(
        r#"SELECT * FROM users WHERE role = 'staff' AND (?1 = 0 OR is_active = 1) ORDER BY full_name"#,
    )
    .bind(active_only)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn count_by<K: Ord + Copy>(keys: impl Iterator<Item = K>) -> Vec<(K, usize)> {
    let mut m = BTreeMap::new();
    for k in keys {
        *m.entry(k).or_insert(0usize) += 1;
    }
    let mut v: Vec<(K, usize)> = m.into_iter().collect();
    v.sort_by(|a, b| b.1.cmp(&a.1));
    v
}

// ───────────────────────────────────────
// Dashboard & performance
// ───────────────────────────────────────

/// GET /api/admin/dashboard/
pub async fn dashboard(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
) -> AppResult<Json<serde_json::Value>> {
    let rows: Vec<(ComplaintStatus, Category)> = query_as(r#"SELECT status, category FROM complaints"#)
        .fetch_all(&state.pool)
        .await?;

    let pending = rows.iter().filter(|(s, _)| *s == ComplaintStatus::Submitted).count();
    let resolved = rows
        .iter()
        .filter(|(s, _)| matches!(s, ComplaintStatus::Resolved | ComplaintStatus::Closed))
        .count();
    let category_stats: Vec<_> = count_by(rows.iter().map(|(_, c)| c.as_str()))
        .into_iter()
        .map(|(k, n)| json!({ "complaint_category": k, "count": n }))
        .collect();

    Ok(Json(json!({
        "welcome_message": format!("Welcome Admin {}", admin.full_name),
        "total_complaints": rows.len(),
        "pending_complaints": pending,
        "resolved_complaints": resolved,
        "category_stats": category_stats,
    })))
}

/// GET /api/admin/staff/performance/
pub async fn staff_performance(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> AppResult<Json<Vec<StaffPerformance>>> {
    let staff = staff_accounts(&state.pool, true).await?;
    let complaints = query_as::<_, Complaint>(r#"SELECT * FROM complaints"#)
        .fetch_all(&state.pool)
        .await?;
    let ratings = all_ratings(&state.pool).await?;
    Ok(Json(performance(&staff, &complaints, &ratings)))
}

// ───────────────────────────────────────
// Reports
// ───────────────────────────────────────
#[derive(Deserialize)]
pub struct ReportParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Student hostel name.
    pub hostel: Option<String>,
}

/// Inclusive date range on the filing date.
fn in_range(c: &Complaint, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    let day = c.created_at.date_naive();
    start.map_or(true, |s| day >= s) && end.map_or(true, |e| day <= e)
}

#[derive(FromRow)]
struct StudentInfo {
    id: i64,
    full_name: String,
    email: String,
    hostel_name: Option<String>,
}

/// GET /api/admin/reports/?type=complaints|staff|student|escalation
pub async fn report(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(p): Query<ReportParams>,
) -> AppResult<Json<serde_json::Value>> {
    let kind = p.kind.as_deref().unwrap_or_default();
    if !matches!(kind, "complaints" | "staff" | "student" | "escalation") {
        return Err(AppError::bad_request("Invalid report type"));
    }

    let complaints: Vec<Complaint> = query_as::<_, Complaint>(
        r#"
        SELECT c.* FROM complaints c
         WHERE ?1 IS NULL
            OR c.student_id IN (SELECT user_id FROM student_profiles WHERE hostel_name = ?1)
         ORDER BY c.created_at DESC, c.id DESC
        "#,
    )
    .bind(filter_value(&p.hostel))
    .fetch_all(&state.pool)
    .await?
    .into_iter()
    .filter(|c| in_range(c, p.start_date, p.end_date))
    .collect();

    let body = match kind {
        "complaints" => json!({
            "type": "complaints",
            "total": complaints.len(),
            "category_stats": count_by(complaints.iter().map(|c| c.category.as_str()))
                .into_iter()
                .map(|(k, n)| json!({ "complaint_category": k, "count": n }))
                .collect::<Vec<_>>(),
            "status_stats": count_by(complaints.iter().map(|c| c.status.as_str()))
                .into_iter()
                .map(|(k, n)| json!({ "status": k, "count": n }))
                .collect::<Vec<_>>(),
            "priority_stats": count_by(complaints.iter().map(|c| c.priority.as_str()))
                .into_iter()
                .map(|(k, n)| json!({ "priority": k, "count": n }))
                .collect::<Vec<_>>(),
        }),
        "staff" => {
            let staff = staff_accounts(&state.pool, false).await?;
            let ratings = all_ratings(&state.pool).await?;
            let mut rows = performance(&staff, &complaints, &ratings);
            rows.sort_by(|a, b| b.resolved.cmp(&a.resolved));
            let data: Vec<_> = rows
                .into_iter()
                .map(|r| {
                    json!({
                        "name": r.full_name,
                        "assigned": r.total_assigned,
                        "resolved": r.resolved,
                        "avg_time": r.avg_resolution_time.unwrap_or(0.0),
                    })
                })
                .collect();
            json!({ "type": "staff", "data": data })
        }
        "student" => {
            let students: HashMap<i64, StudentInfo> = query_as::<_, StudentInfo>(
                r#"
                SELECT u.id, u.full_name, u.email, p.hostel_name
                  FROM users u LEFT JOIN student_profiles p ON p.user_id = u.id
                 WHERE u.role = 'student'
                "#,
            )
            .fetch_all(&state.pool)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

            let top_students: Vec<_> = count_by(complaints.iter().map(|c| c.student_id))
                .into_iter()
                .take(10)
                .filter_map(|(id, n)| students.get(&id).map(|s| (s, n)))
                .map(|(s, n)| json!({ "student_name": s.full_name, "email": s.email, "count": n }))
                .collect();
            let hostel_stats: Vec<_> = count_by(complaints.iter().map(|c| {
                students
                    .get(&c.student_id)
                    .and_then(|s| s.hostel_name.as_deref())
                    .unwrap_or("Unknown")
            }))
            .into_iter()
            .map(|(h, n)| json!({ "hostel_name": h, "count": n }))
            .collect();

            json!({ "type": "student", "top_students": top_students, "hostel_stats": hostel_stats })
        }
        _ => {
            let names: HashMap<i64, String> = staff_accounts(&state.pool, false)
                .await?
                .into_iter()
                .map(|u| (u.id, u.full_name))
                .collect();
            let data: Vec<_> = complaints
                .iter()
                .filter(|c| c.escalated)
                .map(|c| {
                    json!({
                        "id": c.id,
                        "category": c.category,
                        "staff": c.escalated_by.and_then(|id| names.get(&id)).map_or("Unknown", String::as_str),
                        "reason": c.escalation_note,
                        "status": c.status,
                        "date": c.escalated_at,
                    })
                })
                .collect();
            json!({ "type": "escalation", "data": data })
        }
    };
    Ok(Json(body))
}

// ───────────────────────────────────────
// Staff updates feed
// ───────────────────────────────────────
#[derive(Debug, Serialize)]
pub struct StaffUpdate {
    pub id: String,
    pub note_type: &'static str,
    pub complaint_id: i64,
    pub complaint_category: Category,
    pub staff_name: String,
    pub timestamp: DateTime<Utc>,
    pub note_content: Option<String>,
}

#[derive(FromRow)]
struct UpdateRow {
    id: i64,
    category: Category,
    status: ComplaintStatus,
    escalated: bool,
    escalation_note: Option<String>,
    escalated_at: Option<DateTime<Utc>>,
    escalated_by_name: Option<String>,
    resolution_notes: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
    resolved_by_name: Option<String>,
    created_at: DateTime<Utc>,
}

fn feed(rows: Vec<UpdateRow>) -> Vec<StaffUpdate> {
    let mut out = Vec::new();
    for r in rows {
        if r.escalated {
            out.push(StaffUpdate {
                id: format!("esc_{}", r.id),
                note_type: "Escalation",
                complaint_id: r.id,
                complaint_category: r.category,
                staff_name: r.escalated_by_name.unwrap_or_else(|| "Unknown".into()),
                timestamp: r.escalated_at.unwrap_or(r.created_at),
                note_content: r.escalation_note,
            });
        }
        if matches!(r.status, ComplaintStatus::Resolved | ComplaintStatus::Closed) {
            if let Some(name) = r.resolved_by_name {
                out.push(StaffUpdate {
                    id: format!("res_{}", r.id),
                    note_type: "Resolution",
                    complaint_id: r.id,
                    complaint_category: r.category,
                    staff_name: name,
                    timestamp: r.resolved_at.unwrap_or(r.created_at),
                    note_content: r.resolution_notes,
                });
            }
        }
    }
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    out
}

/// GET /api/admin/staff-updates/
pub async fn staff_updates(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> AppResult<Json<Vec<StaffUpdate>>> {
    let rows = query_as::<_, UpdateRow>(
        r#"
        SELECT c.id, c.category, c.status, c.escalated, c.escalation_note, c.escalated_at,
               e.full_name AS escalated_by_name,
               c.resolution_notes, c.resolved_at,
               r.full_name AS resolved_by_name,
               c.created_at
          FROM complaints c
          LEFT JOIN users e ON e.id = c.escalated_by
          LEFT JOIN users r ON r.id = c.resolved_by
         WHERE c.cleared_by_admin = 0
           AND (c.escalated = 1 OR c.resolved_by IS NOT NULL)
        "#,
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(feed(rows)))
}

#[derive(Deserialize, Default)]
pub struct ClearUpdatesBody {
    #[serde(default)]
    pub ids: Vec<String>,
}

/// `esc_12` / `res_12` → 12.
fn feed_complaint_id(id: &str) -> Option<i64> {
    let (prefix, n) = id.split_once('_')?;
    matches!(prefix, "esc" | "res").then_some(())?;
    n.parse().ok()
}

/// POST /api/admin/staff-updates/clear/
///
/// Clears the listed feed ids, or the whole feed when none are given.
pub async fn clear_staff_updates(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    body: Option<Json<ClearUpdatesBody>>,
) -> AppResult<Json<MessageResp>> {
    let b = body.map(|Json(b)| b).unwrap_or_default();

    if b.ids.is_empty() {
        query(
            r#"
            UPDATE complaints SET cleared_by_admin = 1
             WHERE cleared_by_admin = 0 AND (escalated = 1 OR resolved_by IS NOT NULL)
            "#,
        )
        .execute(&state.pool)
        .await?;
        info!(admin_id = admin.id, "staff updates cleared");
        return Ok(Json(MessageResp::new("All staff updates cleared successfully")));
    }

    let ids: Vec<i64> = b.ids.iter().filter_map(|s| feed_complaint_id(s)).collect();
    if ids.is_empty() {
        return Err(AppError::bad_request("No valid IDs provided"));
    }
    let mut tx = state.pool.begin().await?;
    for id in &ids {
        query(r#"UPDATE complaints SET cleared_by_admin = 1 WHERE id = ?1"#)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(admin_id = admin.id, count = ids.len(), "staff updates cleared");
    Ok(Json(MessageResp::new(format!("{} updates cleared successfully", ids.len()))))
}
