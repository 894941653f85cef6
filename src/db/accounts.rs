// src/db/accounts.rs

use chrono::Utc;
use sqlx::{query, query_as, SqliteExecutor, SqlitePool};
use tracing::info;

use crate::auth::password;
use crate::error::AppResult;
use crate::models::{Role, StudentProfile, User};

pub struct NewUser<'a> {
    pub email: &'a str,
    pub full_name: &'a str,
    pub mobile_number: Option<&'a str>,
    pub role: Role,
    pub password: &'a str,
}

pub async fn find_by_id<'e>(db: impl SqliteExecutor<'e>, id: i64) -> AppResult<Option<User>> {
    let row = query_as::<_, User>(r#"SELECT * FROM users WHERE id = ?1"#)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn find_by_email<'e>(db: impl SqliteExecutor<'e>, email: &str) -> AppResult<Option<User>> {
    let row = query_as::<_, User>(r#"SELECT * FROM users WHERE lower(email) = lower(?1)"#)
        .bind(email.trim())
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn email_exists<'e>(db: impl SqliteExecutor<'e>, email: &str) -> AppResult<bool> {
    let (n,): (i64,) = query_as(r#"SELECT COUNT(*) FROM users WHERE lower(email) = lower(?1)"#)
        .bind(email.trim())
        .fetch_one(db)
        .await?;
    Ok(n > 0)
}

pub async fn insert<'e>(db: impl SqliteExecutor<'e>, u: NewUser<'_>) -> AppResult<User> {
    let hash = password::hash(u.password)?;
    let row = query_as::<_, User>(
        r#"
        INSERT INTO users(email, full_name, mobile_number, role, password_hash, is_active, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
        RETURNING *
        "#,
    )
    .bind(u.email.trim())
    .bind(u.full_name.trim())
    .bind(u.mobile_number)
    .bind(u.role)
    .bind(hash)
    .bind(Utc::now())
    .fetch_one(db)
    .await?;
    Ok(row)
}

/// Loads an active account of the given role, or `None`.
pub async fn find_active_with_role<'e>(
    db: impl SqliteExecutor<'e>,
    id: i64,
    role: Role,
) -> AppResult<Option<User>> {
    let row = query_as::<_, User>(r#"SELECT * FROM users WHERE id = ?1 AND role = ?2 AND is_active = 1"#)
        .bind(id)
        .bind(role)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Flips `is_active` on an account of the given role. `false` if no such account.
pub async fn set_active<'e>(db: impl SqliteExecutor<'e>, id: i64, role: Role, active: bool) -> AppResult<bool> {
    let res = query(r#"UPDATE users SET is_active = ?3 WHERE id = ?1 AND role = ?2"#)
        .bind(id)
        .bind(role)
        .bind(active)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn profile<'e>(db: impl SqliteExecutor<'e>, user_id: i64) -> AppResult<StudentProfile> {
    let row = query_as::<_, StudentProfile>(r#"SELECT * FROM student_profiles WHERE user_id = ?1"#)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(row.unwrap_or(StudentProfile { user_id, ..Default::default() }))
}

pub async fn upsert_profile<'e>(db: impl SqliteExecutor<'e>, p: &StudentProfile) -> AppResult<()> {
    query(
        r#"
        INSERT INTO student_profiles(user_id, department, year, hostel_name, block, room_number, profile_picture)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT (user_id) DO UPDATE SET
          department = excluded.department,
          year = excluded.year,
          hostel_name = excluded.hostel_name,
          block = excluded.block,
          room_number = excluded.room_number,
          profile_picture = excluded.profile_picture
        "#,
    )
    .bind(p.user_id)
    .bind(&p.department)
    .bind(&p.year)
    .bind(&p.hostel_name)
    .bind(&p.block)
    .bind(&p.room_number)
    .bind(&p.profile_picture)
    .execute(db)
    .await?;
    Ok(())
}

/// Creates the bootstrap admin if no account with that e-mail exists yet.
pub async fn ensure_admin(pool: &SqlitePool, email: &str, password: &str) -> AppResult<User> {
    if let Some(existing) = find_by_email(pool, email).await? {
        return Ok(existing);
    }
    let admin = insert(
        pool,
        NewUser {
            email,
            full_name: "Admin",
            mobile_number: None,
            role: Role::Admin,
            password,
        },
    )
    .await?;
    info!(admin_id = admin.id, "created bootstrap admin account");
    Ok(admin)
}
