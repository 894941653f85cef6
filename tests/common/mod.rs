//! Shared harness: an in-memory database behind the real router.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::{path::PathBuf, sync::Arc};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

use stayease_api::{
    auth::{TokenKeys, TokenKind},
    db::{self, accounts::NewUser},
    models::{Role, StudentProfile},
    AppState,
};

pub const PASSWORD: &str = "Secret@123";
const BOUNDARY: &str = "stayease-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub state: AppState,
}

/// A seeded account and a valid access token for it.
pub struct Account {
    pub id: i64,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = db::memory().await.expect("in-memory database");
        let media_root: PathBuf = std::env::temp_dir().join(format!("stayease-test-{}", uuid::Uuid::new_v4()));
        let state = AppState {
            pool: pool.clone(),
            tokens: Arc::new(TokenKeys::new(
                "integration-test-secret-key",
                Duration::minutes(30),
                Duration::days(1),
            )),
            media_root,
        };
        let router = stayease_api::app(state.clone());
        Self { router, pool, state }
    }

    pub async fn account(&self, role: Role, email: &str, full_name: &str) -> Account {
        let user = db::accounts::insert(
            &self.pool,
            NewUser {
                email,
                full_name,
                mobile_number: Some("9876543210"),
                role,
                password: PASSWORD,
            },
        )
        .await
        .expect("insert account");

        if role == Role::Student {
            let profile = StudentProfile {
                user_id: user.id,
                department: Some("CSE".into()),
                year: Some("2".into()),
                hostel_name: Some("Aravali".into()),
                block: Some("A".into()),
                room_number: Some("204".into()),
                profile_picture: None,
            };
            db::accounts::upsert_profile(&self.pool, &profile).await.expect("profile");
        }

        let token = self.state.tokens.issue(user.id, role, TokenKind::Access).expect("token");
        Account { id: user.id, token }
    }

    pub async fn student(&self, email: &str) -> Account {
        self.account(Role::Student, email, "Asha Verma").await
    }

    pub async fn staff(&self, email: &str) -> Account {
        self.account(Role::Staff, email, "Ravi Kumar").await
    }

    pub async fn admin(&self) -> Account {
        self.account(Role::Admin, "admin@stayease.test", "Admin").await
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.expect("router");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, json)
    }

    pub async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.json(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.json(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.json(Method::PATCH, uri, Some(token), Some(body)).await
    }

    /// Sends text-only multipart form data.
    pub async fn form(&self, method: Method, uri: &str, token: &str, fields: &[(&str, &str)]) -> (StatusCode, Value) {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    /// Files an Electricity complaint and returns its id.
    pub async fn file_complaint(&self, student: &Account) -> i64 {
        self.file_complaint_in(student, "Electricity", "A-204").await
    }

    pub async fn file_complaint_in(&self, student: &Account, category: &str, hostel_id: &str) -> i64 {
        let (status, body) = self
            .form(
                Method::POST,
                "/api/complaints/student/",
                &student.token,
                &[
                    ("complaint_category", category),
                    ("description", "Tube light flickering"),
                    ("hostel_id", hostel_id),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    pub async fn assign(&self, admin: &Account, complaint_id: i64, staff: &Account) {
        let (status, body) = self
            .patch(
                &format!("/api/admin/complaints/{complaint_id}/assign/"),
                &admin.token,
                serde_json::json!({ "staff_id": staff.id }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    pub async fn resolve(&self, staff: &Account, complaint_id: i64) {
        let (status, body) = self
            .form(
                Method::PATCH,
                &format!("/api/staff/complaints/{complaint_id}/update/"),
                &staff.token,
                &[("status", "Resolved"), ("resolution_notes", "Replaced the choke")],
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    pub async fn rate(&self, student: &Account, complaint_id: i64, stars: i64) {
        let (status, body) = self
            .post(
                &format!("/api/complaints/rate/{complaint_id}/"),
                &student.token,
                serde_json::json!({ "rating": stars }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    pub async fn count(&self, table: &str, complaint_id: i64) -> i64 {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} WHERE complaint_id = ?1"))
            .bind(complaint_id)
            .fetch_one(&self.pool)
            .await
            .expect("count");
        n
    }
}
