//! Inventory, maintenance, support desk and the staff-updates feed.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn usage_cannot_exceed_available_stock() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let staff = app.staff("ravi@stayease.test").await;
    let student = app.student("asha@uni.test").await;

    let (status, item) = app
        .post(
            "/api/inventory/items/",
            &admin.token,
            json!({ "name": "LED tube", "category": "Electricity", "total_quantity": 5 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{item}");
    assert_eq!(item["available_quantity"], 5);
    let id = item["id"].as_i64().unwrap();

    let (status, body) = app
        .post(&format!("/api/inventory/items/{id}/log_usage/"), &staff.token, json!({ "quantity": 3 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["available_quantity"], 2);
    assert_eq!(body["total_quantity"], 5);

    let (status, body) = app
        .post(&format!("/api/inventory/items/{id}/log_usage/"), &staff.token, json!({ "quantity": 3 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Insufficient stock");

    let (_, body) = app
        .post(&format!("/api/inventory/items/{id}/add_stock/"), &admin.token, json!({ "quantity": 10 }))
        .await;
    assert_eq!(body["available_quantity"], 12);
    assert_eq!(body["total_quantity"], 15);

    let (_, logs) = app.get(&format!("/api/inventory/items/{id}/logs/"), &admin.token).await;
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["action"], "ADDED");
    assert_eq!(logs[1]["quantity_changed"], -3);

    let (status, _) = app.get("/api/inventory/items/", &student.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn approved_monthly_task_moves_to_next_month() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let staff = app.staff("ravi@stayease.test").await;

    let (status, task) = app
        .post(
            "/api/maintenance/tasks/",
            &admin.token,
            json!({ "title": "Clean water tank", "frequency": "Monthly", "next_due_date": "2024-01-31" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{task}");
    let task_id = task["id"].as_i64().unwrap();

    let complete = format!("/api/maintenance/tasks/{task_id}/complete/");
    let (status, body) = app.form(Method::POST, &complete, &staff.token, &[("notes", "Done")]).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let log_id = body["log_id"].as_i64().unwrap();

    // waiting on approval: hidden from staff and cannot be submitted twice
    let (_, tasks) = app.get("/api/maintenance/tasks/", &staff.token).await;
    assert!(tasks.as_array().unwrap().is_empty());
    let (status, _) = app.form(Method::POST, &complete, &staff.token, &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .json(Method::POST, &format!("/api/maintenance/logs/{log_id}/approve/"), Some(&admin.token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["next_due_date"], "2024-02-29");

    let (status, _) = app
        .json(Method::POST, &format!("/api/maintenance/logs/{log_id}/approve/"), Some(&admin.token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, tasks) = app.get("/api/maintenance/tasks/", &staff.token).await;
    assert_eq!(tasks[0]["next_due_date"], "2024-02-29");
}

#[tokio::test]
async fn rejection_needs_a_comment_and_keeps_task_open() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let staff = app.staff("ravi@stayease.test").await;

    let (_, task) = app
        .post(
            "/api/maintenance/tasks/",
            &admin.token,
            json!({ "title": "Fix gate hinge", "next_due_date": "2024-06-01", "assigned_to": staff.id }),
        )
        .await;
    assert_eq!(task["frequency"], "One-time");
    let task_id = task["id"].as_i64().unwrap();

    let (_, body) = app
        .form(Method::POST, &format!("/api/maintenance/tasks/{task_id}/complete/"), &staff.token, &[])
        .await;
    let reject = format!("/api/maintenance/logs/{}/reject/", body["log_id"]);

    let (status, _) = app.post(&reject, &admin.token, json!({ "admin_comment": " " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, log) = app.post(&reject, &admin.token, json!({ "admin_comment": "Still squeaks" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log["status"], "Rejected");

    let (_, tasks) = app.get("/api/maintenance/tasks/", &staff.token).await;
    assert_eq!(tasks.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn task_assignee_can_be_cleared() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let staff = app.staff("ravi@stayease.test").await;

    let (_, task) = app
        .post(
            "/api/maintenance/tasks/",
            &admin.token,
            json!({ "title": "Service geyser", "next_due_date": "2024-06-01", "assigned_to": staff.id }),
        )
        .await;
    let uri = format!("/api/maintenance/tasks/{}/", task["id"]);

    // fields left out keep their value
    let (status, body) = app.patch(&uri, &admin.token, json!({ "title": "Service geysers" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["assigned_to"], staff.id);
    assert_eq!(body["title"], "Service geysers");

    let (status, body) = app.patch(&uri, &admin.token, json!({ "assigned_to": null })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["assigned_to"], serde_json::Value::Null);

    let (status, _) = app.patch(&uri, &admin.token, json!({ "assigned_to": 9999 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.patch(&uri, &admin.token, json!({ "assigned_to": staff.id })).await;
    assert_eq!(body["assigned_to"], staff.id);
}

#[tokio::test]
async fn support_thread_tracks_unread_messages() {
    let app = TestApp::new().await;
    let student = app.student("asha@uni.test").await;
    let admin = app.admin().await;

    let (status, ticket) = app
        .post(
            "/api/students/support/create/",
            &student.token,
            json!({ "category": "Account", "subject": "Cannot update photo", "description": "Upload fails" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{ticket}");
    let id = ticket["id"].as_i64().unwrap();

    let (_, list) = app.get("/api/students/admin/support/", &admin.token).await;
    assert_eq!(list[0]["unread_count"], 1);

    let (_, detail) = app.get(&format!("/api/students/admin/support/{id}/"), &admin.token).await;
    assert_eq!(detail["messages"][0]["message"], "Upload fails");
    let (_, list) = app.get("/api/students/admin/support/", &admin.token).await;
    assert_eq!(list[0]["unread_count"], 0);

    let (status, _) = app
        .post(
            &format!("/api/students/admin/support/reply/{id}/"),
            &admin.token,
            json!({ "message": "Try a smaller image" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, mine) = app.get("/api/students/support/", &student.token).await;
    assert_eq!(mine[0]["status"], "In Progress");
    assert_eq!(mine[0]["unread_count"], 1);

    let (status, _) = app
        .patch(
            &format!("/api/students/admin/support/status/{id}/"),
            &admin.token,
            json!({ "status": "Resolved" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(&format!("/api/students/support/reply/{id}/"), &student.token, json!({ "message": "Thanks" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn staff_updates_feed_lists_escalations_and_resolutions() {
    let app = TestApp::new().await;
    let student = app.student("asha@uni.test").await;
    let admin = app.admin().await;
    let staff = app.staff("ravi@stayease.test").await;
    let id = app.file_complaint(&student).await;
    app.assign(&admin, id, &staff).await;

    let (status, _) = app
        .post(
            &format!("/api/staff/complaints/{id}/escalate/"),
            &staff.token,
            json!({ "note": "Needs plumber license" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    app.resolve(&staff, id).await;

    let (status, feed) = app.get("/api/admin/staff-updates/", &admin.token).await;
    assert_eq!(status, StatusCode::OK, "{feed}");
    let ids: Vec<&str> = feed.as_array().unwrap().iter().map(|e| e["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&format!("esc_{id}").as_str()));
    assert!(ids.contains(&format!("res_{id}").as_str()));

    let (status, _) = app
        .post("/api/admin/staff-updates/clear/", &admin.token, json!({ "ids": ["bogus"] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/admin/staff-updates/clear/", &admin.token, json!({ "ids": [format!("esc_{id}")] }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, feed) = app.get("/api/admin/staff-updates/", &admin.token).await;
    assert!(feed.as_array().unwrap().is_empty());
}
