// src/routes/accounts.rs

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::query_as;
use tracing::info;

use super::non_blank;
use crate::auth::{password, StudentSession, TokenKind};
use crate::db::accounts::{self, NewUser};
use crate::error::{AppError, AppResult};
use crate::models::{Complaint, Role, StudentComplaint, StudentProfile, User};
use crate::uploads::{store_optional, FormData};
use crate::validation::{self, FieldErrors};
use crate::AppState;

// ───────────────────────────────────────
// Signup / login
// ───────────────────────────────────────
#[derive(Deserialize)]
pub struct SignupBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub mobile_number: String,
    #[serde(default)]
    pub password: String,
    pub department: Option<String>,
    pub year: Option<String>,
    pub hostel_name: Option<String>,
    pub block: Option<String>,
    pub room_number: Option<String>,
}

#[derive(Serialize)]
pub struct SignupResp {
    pub message: &'static str,
    pub user: User,
}

/// POST /api/students/signup/
pub async fn signup(
    State(state): State<AppState>,
    Json(b): Json<SignupBody>,
) -> AppResult<(StatusCode, Json<SignupResp>)> {
    let mut errs = FieldErrors::default();
    errs.check("full_name", validation::required("Full name", &b.full_name))
        .check("email", validation::email(&b.email))
        .check("mobile_number", validation::mobile(&b.mobile_number))
        .check("password", validation::password(&b.password));
    errs.into_result()?;

    if accounts::email_exists(&state.pool, &b.email).await? {
        return Err(AppError::conflict("Email already registered"));
    }

    let mut tx = state.pool.begin().await?;
    let user = accounts::insert(
        &mut *tx,
        NewUser {
            email: &b.email,
            full_name: &b.full_name,
            mobile_number: Some(b.mobile_number.trim()),
            role: Role::Student,
            password: &b.password,
        },
    )
    .await?;
    let profile = StudentProfile {
        user_id: user.id,
        department: b.department,
        year: b.year,
        hostel_name: b.hostel_name,
        block: b.block,
        room_number: b.room_number,
        profile_picture: None,
    };
    accounts::upsert_profile(&mut *tx, &profile).await?;
    tx.commit().await?;

    info!(user_id = user.id, "student registered");
    Ok((StatusCode::CREATED, Json(SignupResp { message: "Signup successful", user })))
}

#[derive(Deserialize)]
pub struct CheckEmailBody {
    #[serde(default)]
    pub email: String,
}

/// POST /api/students/check-email/
pub async fn check_email(
    State(state): State<AppState>,
    Json(b): Json<CheckEmailBody>,
) -> AppResult<Json<serde_json::Value>> {
    let exists = accounts::email_exists(&state.pool, &b.email).await?;
    Ok(Json(serde_json::json!({ "exists": exists })))
}

#[derive(Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResp {
    pub message: &'static str,
    pub access: String,
    pub refresh: String,
    pub role: Role,
    pub full_name: String,
}

/// POST /api/students/login/
pub async fn login(State(state): State<AppState>, Json(b): Json<LoginBody>) -> AppResult<Json<LoginResp>> {
    let user = accounts::find_by_email(&state.pool, &b.email)
        .await?
        .ok_or_else(|| AppError::bad_request("Email not registered"))?;

    if !password::verify(&b.password, &user.password_hash) {
        return Err(AppError::bad_request("Incorrect password"));
    }
    if !user.is_active {
        return Err(AppError::forbidden("Account is disabled"));
    }

    let access = state.tokens.issue(user.id, user.role, TokenKind::Access)?;
    let refresh = state.tokens.issue(user.id, user.role, TokenKind::Refresh)?;
    info!(user_id = user.id, role = %user.role, "login");

    Ok(Json(LoginResp {
        message: "Login successful",
        access,
        refresh,
        role: user.role,
        full_name: user.full_name,
    }))
}

#[derive(Deserialize)]
pub struct RefreshBody {
    pub refresh: String,
}

/// POST /api/students/token/refresh/
pub async fn refresh(
    State(state): State<AppState>,
    Json(b): Json<RefreshBody>,
) -> AppResult<Json<serde_json::Value>> {
    let claims = state.tokens.verify(&b.refresh, TokenKind::Refresh)?;
    let user = accounts::find_by_id(&state.pool, claims.user_id()?)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthorized)?;

    let access = state.tokens.issue(user.id, user.role, TokenKind::Access)?;
    Ok(Json(serde_json::json!({ "access": access })))
}

// ───────────────────────────────────────
// Student dashboard / profile
// ───────────────────────────────────────
#[derive(Serialize)]
pub struct ProfileResp {
    #[serde(flatten)]
    pub user: User,
    pub profile: StudentProfile,
}

#[derive(Serialize)]
pub struct DashboardResp {
    pub full_name: String,
    pub email: String,
    pub profile: StudentProfile,
    pub total_complaints: i64,
    pub latest_complaint: Option<StudentComplaint>,
}

/// GET /api/students/dashboard/
pub async fn dashboard(
    State(state): State<AppState>,
    StudentSession(user): StudentSession,
) -> AppResult<Json<DashboardResp>> {
    let profile = accounts::profile(&state.pool, user.id).await?;
    let (total_complaints,): (i64,) = query_as(r#"SELECT COUNT(*) FROM complaints WHERE student_id = ?1"#)
        .bind(user.id)
        .fetch_one(&state.pool)
        .await?;
    let latest_complaint = query_as::<_, Complaint>(
        r#"SELECT * FROM complaints WHERE student_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1"#,
    )
    .bind(user.id)
    .fetch_optional(&state.pool)
    .await?;

    Ok(Json(DashboardResp {
        full_name: user.full_name,
        email: user.email,
        profile,
        total_complaints,
        latest_complaint: latest_complaint.map(StudentComplaint::from),
    }))
}

/// GET /api/students/profile/
pub async fn get_profile(
    State(state): State<AppState>,
    StudentSession(user): StudentSession,
) -> AppResult<Json<ProfileResp>> {
    let profile = accounts::profile(&state.pool, user.id).await?;
    Ok(Json(ProfileResp { user, profile }))
}

/// PUT /api/students/profile/update/ (multipart)
pub async fn update_profile(
    State(state): State<AppState>,
    StudentSession(user): StudentSession,
    multipart: Multipart,
) -> AppResult<Json<ProfileResp>> {
    let mut form = FormData::read(multipart).await?;

    let mut errs = FieldErrors::default();
    if let Some(mobile) = form.text("mobile_number") {
        errs.check("mobile_number", validation::mobile(mobile));
    }
    errs.into_result()?;

    let mut profile = accounts::profile(&state.pool, user.id).await?;
    let keep = |current: &mut Option<String>, incoming: Option<&str>| {
        if let Some(v) = non_blank(incoming) {
            *current = Some(v.to_string());
        }
    };
    keep(&mut profile.department, form.text("department"));
    keep(&mut profile.year, form.text("year"));
    keep(&mut profile.hostel_name, form.text("hostel_name"));
    keep(&mut profile.block, form.text("block"));
    keep(&mut profile.room_number, form.text("room_number"));
    if let Some(url) = store_optional(&state.media_root, "profile_pics", &mut form, "profile_picture").await? {
        profile.profile_picture = Some(url);
    }

    let mut tx = state.pool.begin().await?;
    let user = query_as::<_, User>(
        r#"
        UPDATE users SET
          full_name = COALESCE(?2, full_name),
          mobile_number = COALESCE(?3, mobile_number)
        WHERE id = ?1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(form.text("full_name"))
    .bind(form.text("mobile_number"))
    .fetch_one(&mut *tx)
    .await?;
    accounts::upsert_profile(&mut *tx, &profile).await?;
    tx.commit().await?;

    info!(user_id = user.id, "profile updated");
    Ok(Json(ProfileResp { user, profile }))
}
