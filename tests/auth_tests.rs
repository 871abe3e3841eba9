//! Registration, login and profile flows through the router

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn test_register_returns_token_and_sanitized_user() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "name": "Ravi", "email": "  Ravi@Example.com ", "password": "Secret123" }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["email"], "ravi@example.com");
    assert_eq!(body["user"]["role"], "farmer");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_password_is_case_sensitive() {
    let app = TestApp::new();
    app.register("Ravi", "ravi@example.com", "farmer").await;

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "ravi@example.com", "password": "Secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    for wrong in ["secret123", "Secret1234", ""] {
        let (status, body) = app
            .post(
                "/api/auth/login",
                None,
                json!({ "email": "ravi@example.com", "password": wrong }),
            )
            .await;
        assert_ne!(status, StatusCode::OK, "password {:?} must not log in", wrong);
        assert_eq!(body["success"], false);
    }
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_look_the_same() {
    let app = TestApp::new();
    app.register("Ravi", "ravi@example.com", "farmer").await;

    let (unknown_status, unknown) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "nobody@example.com", "password": "Secret123" }),
        )
        .await;
    let (wrong_status, wrong) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "ravi@example.com", "password": "nope123" }),
        )
        .await;

    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown["message"], wrong["message"]);
}

#[tokio::test]
async fn test_duplicate_email_is_rejected_and_first_user_kept() {
    let app = TestApp::new();
    let (token, id) = app.register("Ravi", "ravi@example.com", "farmer").await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "name": "Other", "email": "RAVI@example.com", "password": "another1", "role": "buyer" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already registered");

    let (status, me) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["id"], id.as_str());
    assert_eq!(me["user"]["name"], "Ravi");
    assert_eq!(me["user"]["role"], "farmer");
}

#[tokio::test]
async fn test_register_requires_all_fields() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/api/auth/register", None, json!({ "email": "a@b.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "name": "A", "email": "not-an-email", "password": "Secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "name": "A", "email": "a@b.com", "password": "123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_me_requires_a_valid_token() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token provided");

    let (status, _) = app.get("/api/auth/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_update_keeps_password_unless_changed() {
    let app = TestApp::new();
    let (token, _) = app.register("Ravi", "ravi@example.com", "farmer").await;

    let (status, body) = app
        .put(
            "/api/auth/profile",
            Some(&token),
            json!({ "name": "Ravi Kumar", "profile": { "phone": "9876543210", "farmSize": 4.5 } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ravi Kumar");
    assert_eq!(body["user"]["profile"]["phone"], "9876543210");

    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "ravi@example.com", "password": "Secret123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_password_change_requires_current_password() {
    let app = TestApp::new();
    let (token, _) = app.register("Ravi", "ravi@example.com", "farmer").await;

    let (status, _) = app
        .put(
            "/api/auth/profile",
            Some(&token),
            json!({ "currentPassword": "wrong-one", "newPassword": "Changed99" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(
            "/api/auth/profile",
            Some(&token),
            json!({ "currentPassword": "Secret123", "newPassword": "Changed99" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "ravi@example.com", "password": "Changed99" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_email_change_cannot_take_existing_address() {
    let app = TestApp::new();
    app.register("Ravi", "ravi@example.com", "farmer").await;
    let (token, _) = app.register("Asha", "asha@example.com", "buyer").await;

    let (status, body) = app
        .put(
            "/api/auth/profile",
            Some(&token),
            json!({ "email": "ravi@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already registered");
}
