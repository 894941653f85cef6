//! StayEase hostel-complaint service.
//!
//! Students file complaints, staff resolve them and admins assign, escalate,
//! close and report on them. The HTTP surface mirrors the paths the web client
//! already calls; every lifecycle rule is enforced here, not in the client.

use std::{path::PathBuf, sync::Arc};

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::SqlitePool;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod routes;
pub mod uploads;
pub mod validation;

pub use error::{AppError, AppResult};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub tokens: Arc<auth::TokenKeys>,
    pub media_root: PathBuf,
}

impl AppState {
    pub fn new(pool: SqlitePool, cfg: &config::Config) -> Self {
        Self {
            pool,
            tokens: Arc::new(auth::TokenKeys::new(
                &cfg.jwt_secret,
                chrono::Duration::minutes(cfg.access_ttl_minutes),
                chrono::Duration::days(cfg.refresh_ttl_days),
            )),
            media_root: cfg.media_root.clone(),
        }
    }
}

/// Builds the full API router.
pub fn app(state: AppState) -> Router {
    use routes::*;

    let media = ServeDir::new(&state.media_root);

    // The web client is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // health
        .route("/health", get(health::health))
        .route("/api/students/ping/", get(health::ping))
        // accounts
        .route("/api/students/signup/", post(accounts::signup))
        .route("/api/students/check-email/", post(accounts::check_email))
        .route("/api/students/login/", post(accounts::login))
        .route("/api/students/token/refresh/", post(accounts::refresh))
        .route("/api/students/dashboard/", get(accounts::dashboard))
        .route("/api/students/profile/", get(accounts::get_profile))
        .route("/api/students/profile/update/", put(accounts::update_profile))
        // student complaints
        .route(
            "/api/complaints/student/",
            get(complaints::list_own).post(complaints::create),
        )
        .route("/api/complaints/rate/:id/", post(complaints::rate))
        // admin complaints
        .route("/api/admin/complaints/", get(admin_complaints::list))
        .route("/api/admin/complaints/:id/", get(admin_complaints::detail))
        .route("/api/admin/complaints/:id/priority/", patch(admin_complaints::set_priority))
        .route("/api/admin/complaints/:id/assign/", patch(admin_complaints::assign))
        .route("/api/admin/complaints/:id/close/", patch(admin_complaints::close))
        .route(
            "/api/admin/complaints/:id/escalation/reply/",
            post(admin_complaints::escalation_reply),
        )
        .route("/api/admin/complaints/bulk-assign/", post(admin_complaints::bulk_assign))
        .route(
            "/api/admin/complaints/bulk-update-status/",
            post(admin_complaints::bulk_update_status),
        )
        .route("/api/admin/complaints/clear/", post(admin_complaints::bulk_clear))
        // staff complaints
        .route("/api/staff/dashboard/", get(staff_complaints::dashboard))
        .route("/api/staff/complaints/", get(staff_complaints::list_assigned))
        .route("/api/staff/complaints/bulk-resolve/", post(staff_complaints::bulk_resolve))
        .route("/api/staff/complaints/escalated/", get(staff_complaints::list_escalated))
        .route("/api/staff/complaints/:id/update/", patch(staff_complaints::update))
        .route("/api/staff/complaints/:id/escalate/", post(staff_complaints::escalate))
        .route(
            "/api/staff/complaints/:id/escalate-reply/",
            post(staff_complaints::escalation_reply),
        )
        .route("/api/staff/complaints/:id/timeline/", get(staff_complaints::timeline))
        .route("/api/staff/history/", get(staff_complaints::history))
        .route("/api/staff/history/clear/:id/", patch(staff_complaints::clear_history))
        .route("/api/staff/ratings/", get(staff_complaints::ratings))
        // staff & student management
        .route("/api/admin/staff/", get(staffs::list_staff))
        .route("/api/admin/staff/create/", post(staffs::create_staff))
        .route("/api/admin/staff/available/", get(staffs::list_available))
        .route("/api/admin/staff/:id/delete/", delete(staffs::delete_staff))
        .route("/api/admin/students/", get(students::list_students))
        .route("/api/admin/students/:id/", get(students::student_detail))
        .route("/api/admin/students/:id/toggle/", patch(students::toggle_student))
        .route("/api/admin/students/:id/remove/", delete(students::remove_student))
        // reports
        .route("/api/admin/dashboard/", get(reports::dashboard))
        .route("/api/admin/reports/", get(reports::report))
        .route("/api/admin/staff/performance/", get(reports::staff_performance))
        .route("/api/admin/staff-updates/", get(reports::staff_updates))
        .route("/api/admin/staff-updates/clear/", post(reports::clear_staff_updates))
        // broadcasts
        .route(
            "/api/broadcasts/",
            get(broadcasts::list_broadcasts).post(broadcasts::create_broadcast),
        )
        .route("/api/broadcasts/active/", get(broadcasts::list_active))
        .route(
            "/api/broadcasts/:id/",
            patch(broadcasts::patch_broadcast).delete(broadcasts::delete_broadcast),
        )
        // inventory
        .route(
            "/api/inventory/items/",
            get(inventory::list_items).post(inventory::create_item),
        )
        .route(
            "/api/inventory/items/:id/",
            get(inventory::get_item)
                .patch(inventory::patch_item)
                .delete(inventory::delete_item),
        )
        .route("/api/inventory/items/:id/add_stock/", post(inventory::add_stock))
        .route("/api/inventory/items/:id/log_usage/", post(inventory::log_usage))
        .route("/api/inventory/items/:id/logs/", get(inventory::list_logs))
        // maintenance
        .route(
            "/api/maintenance/tasks/",
            get(maintenance::list_tasks).post(maintenance::create_task),
        )
        .route(
            "/api/maintenance/tasks/:id/",
            patch(maintenance::patch_task).delete(maintenance::delete_task),
        )
        .route("/api/maintenance/tasks/:id/complete/", post(maintenance::complete_task))
        .route("/api/maintenance/logs/", get(maintenance::list_logs))
        .route("/api/maintenance/logs/:id/approve/", post(maintenance::approve_log))
        .route("/api/maintenance/logs/:id/reject/", post(maintenance::reject_log))
        // support
        .route("/api/students/support/", get(support::student_list))
        .route("/api/students/support/create/", post(support::student_create))
        .route("/api/students/support/:id/", get(support::student_detail))
        .route("/api/students/support/reply/:id/", post(support::student_reply))
        .route("/api/students/admin/support/", get(support::admin_list))
        .route("/api/students/admin/support/:id/", get(support::admin_detail))
        .route("/api/students/admin/support/reply/:id/", post(support::admin_reply))
        .route("/api/students/admin/support/status/:id/", patch(support::admin_set_status))
        // uploaded images
        .nest_service("/media", media)
        // state & middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
