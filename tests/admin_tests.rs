//! Admin user management and platform totals

mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{tomatoes, TestApp};
use krishi_mitra_server::models::Role;
use krishi_mitra_server::repository::UserPatch;

/// Register an account and grant it the admin role directly in storage
async fn admin(app: &TestApp) -> (String, String) {
    let (token, id) = app.register("Root", "root@example.com", "buyer").await;
    app.repositories
        .users
        .update(
            Uuid::parse_str(&id).unwrap(),
            UserPatch {
                role: Some(Role::Admin),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap();
    (token, id)
}

#[tokio::test]
async fn test_admin_cannot_be_self_registered() {
    let app = TestApp::new();
    let (status, _) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "name": "Eve", "email": "eve@example.com", "password": "Secret123", "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_routes_reject_other_roles() {
    let app = TestApp::new();
    let (farmer, _) = app.register("Ravi", "ravi@example.com", "farmer").await;

    for uri in ["/api/admin/users", "/api/admin/stats"] {
        let (status, _) = app.get(uri, Some(&farmer)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        let (status, _) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_list_and_filter_users() {
    let app = TestApp::new();
    let (token, _) = admin(&app).await;
    app.register("Ravi", "ravi@example.com", "farmer").await;
    app.register("Mohan", "mohan@example.com", "farmer").await;
    app.register("Asha", "asha@example.com", "buyer").await;

    let (status, body) = app.get("/api/admin/users", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 4);
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|u| u.get("passwordHash").is_none()));

    let (_, body) = app.get("/api/admin/users?role=farmer", Some(&token)).await;
    assert_eq!(body["pagination"]["total"], 2);

    let (status, _) = app.get("/api/admin/users?role=wizard", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_user_role_and_verification() {
    let app = TestApp::new();
    let (token, admin_id) = admin(&app).await;
    let (farmer, farmer_id) = app.register("Ravi", "ravi@example.com", "farmer").await;

    let (status, body) = app
        .put(
            &format!("/api/admin/users/{}", farmer_id),
            Some(&token),
            json!({ "role": "buyer", "isVerified": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["role"], "buyer");
    assert_eq!(body["data"]["isVerified"], true);

    let (status, _) = app.get("/api/dashboard/farmer/stats", Some(&farmer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(
            &format!("/api/admin/users/{}", admin_id),
            Some(&token),
            json!({ "role": "farmer" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You cannot remove your own admin role");

    let (status, _) = app
        .get(&format!("/api/admin/users/{}", Uuid::new_v4()), Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_platform_stats() {
    let app = TestApp::new();
    let (token, _) = admin(&app).await;
    let (farmer, _) = app.register("Ravi", "ravi@example.com", "farmer").await;
    let (buyer, _) = app.register("Asha", "asha@example.com", "buyer").await;
    let listing = app.create_listing(&farmer, tomatoes()).await;
    app.post(
        "/api/orders",
        Some(&buyer),
        json!({ "items": [{ "listingId": listing, "quantity": 1 }] }),
    )
    .await;

    let (status, body) = app.get("/api/admin/stats", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["totalUsers"], 3);
    assert_eq!(stats["farmers"], 1);
    assert_eq!(stats["buyers"], 1);
    assert_eq!(stats["listings"], 1);
    assert_eq!(stats["orders"], 1);
    assert_eq!(stats["diagnoses"], 0);
    assert_eq!(stats["newUsersThisWeek"], 3);
    assert_eq!(stats["newOrdersThisWeek"], 1);
}
