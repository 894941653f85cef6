//! Signup, login and role gates.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{TestApp, PASSWORD};

fn signup_body(email: &str) -> serde_json::Value {
    json!({
        "email": email,
        "full_name": "Kiran Rao",
        "mobile_number": "9123456780",
        "password": PASSWORD,
        "hostel_name": "Nilgiri",
        "room_number": "12"
    })
}

#[tokio::test]
async fn signup_then_login() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(Method::POST, "/api/students/signup/", None, Some(signup_body("kiran@uni.test")))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user"]["role"], "student");
    assert!(body["user"].get("password_hash").is_none());

    let (status, _) = app
        .json(Method::POST, "/api/students/signup/", None, Some(signup_body("kiran@uni.test")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/students/login/",
            None,
            Some(json!({ "email": "kiran@uni.test", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["role"], "student");
    let access = body["access"].as_str().unwrap().to_string();

    let (status, profile) = app.get("/api/students/profile/", &access).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["profile"]["hostel_name"], "Nilgiri");
}

#[tokio::test]
async fn signup_reports_every_invalid_field() {
    let app = TestApp::new().await;
    let body = json!({ "email": "not-an-email", "full_name": "", "mobile_number": "12", "password": "weak" });

    let (status, body) = app.json(Method::POST, "/api/students/signup/", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = body["fields"].as_object().unwrap();
    for f in ["email", "full_name", "mobile_number", "password"] {
        assert!(fields.contains_key(f), "missing {f}");
    }
}

#[tokio::test]
async fn login_distinguishes_unknown_email_and_bad_password() {
    let app = TestApp::new().await;
    app.student("asha@uni.test").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/students/login/",
            None,
            Some(json!({ "email": "nobody@uni.test", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email not registered");

    let (status, body) = app
        .json(
            Method::POST,
            "/api/students/login/",
            None,
            Some(json!({ "email": "asha@uni.test", "password": "Wrong@1234" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Incorrect password");
}

#[tokio::test]
async fn role_gates() {
    let app = TestApp::new().await;
    let student = app.student("asha@uni.test").await;
    let staff = app.staff("ravi@stayease.test").await;

    let (status, _) = app.json(Method::GET, "/api/admin/complaints/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.json(Method::GET, "/api/admin/complaints/", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/admin/complaints/", &student.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/staff/complaints/", &student.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/complaints/student/", &staff.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn disabled_student_loses_access_and_can_then_be_removed() {
    let app = TestApp::new().await;
    let student = app.student("asha@uni.test").await;
    let admin = app.admin().await;
    let remove = format!("/api/admin/students/{}/remove/", student.id);

    let (status, _) = app.json(Method::DELETE, &remove, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .json(Method::PATCH, &format!("/api/admin/students/{}/toggle/", student.id), Some(&admin.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = app.get("/api/complaints/student/", &student.token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.json(Method::DELETE, &remove, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn staff_created_by_admin_shows_as_available() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let (status, body) = app
        .post(
            "/api/admin/staff/create/",
            &admin.token,
            json!({
                "full_name": "Meena Iyer",
                "email": "meena@stayease.test",
                "password": PASSWORD,
                "mobile_number": "9000000001"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["role"], "staff");

    let (_, available) = app.get("/api/admin/staff/available/", &admin.token).await;
    let list = available.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["full_name"], "Meena Iyer");
    assert_eq!(list[0]["available"], true);
}
