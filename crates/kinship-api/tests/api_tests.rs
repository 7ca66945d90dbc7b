//! API Integration Tests
//!
//! Drive the full router over an in-memory user store.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use kinship_api::auth::{TokenSubject, UserRole};
use kinship_api::{create_router, create_router_for_testing, test_state};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

/// Helper to create a test request
fn create_json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn register(app: &Router, name: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        create_json_request(
            "POST",
            "/user/register",
            None,
            Some(json!({ "Name": name, "Password": password })),
        ),
    )
    .await
}

async fn login(app: &Router, name: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        create_json_request(
            "GET",
            "/user/login",
            None,
            Some(json!({ "username": name, "password": password })),
        ),
    )
    .await
}

async fn login_token(app: &Router, name: &str, password: &str) -> String {
    let (status, json) = login(app, name, password).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["token"].as_str().unwrap().to_string()
}

async fn logout(app: &Router, token: Option<&str>) -> (StatusCode, Value) {
    send(app, create_json_request("DELETE", "/user/logout", token, None)).await
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let (app, _) = create_router_for_testing();

    let (status, json) = send(&app, create_json_request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let (app, _) = create_router_for_testing();

    let (status, json) = send(&app, create_json_request("GET", "/ready", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["user_store"], "memory");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let (app, _) = create_router_for_testing();

    let (status, json) = send(
        &app,
        create_json_request("GET", "/api-docs/openapi.json", None, None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/user/login"].is_object());
}

// =============================================================================
// Session Lifecycle
// =============================================================================

#[tokio::test]
async fn test_full_session_lifecycle() {
    let (app, _) = create_router_for_testing();

    let (status, json) = register(&app, "alice", "secret123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "User created successfully");

    let first = login_token(&app, "alice", "secret123").await;

    let (status, me) = send(&app, create_json_request("GET", "/user/me", Some(&first), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "alice");
    assert_eq!(me["role"], "Viewer");

    let (status, json) = logout(&app, Some(&first)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "User logged out successfully");

    let second = login_token(&app, "alice", "secret123").await;
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_login_persists_session() {
    let (app, state) = create_router_for_testing();
    register(&app, "alice", "secret123").await;

    let token = login_token(&app, "alice", "secret123").await;
    let claims = state.auth.tokens().decode(&token).unwrap();
    let stored = state.users.find_by_name("alice").await.unwrap().unwrap();

    assert_eq!(stored.session_id.as_deref(), Some(claims.sid.as_str()));
}

#[tokio::test]
async fn test_register_conflict() {
    let (app, _) = create_router_for_testing();
    register(&app, "alice", "secret123").await;

    let (status, json) = register(&app, "alice", "another").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "CONFLICT");
    assert_eq!(json["message"], "User already exists");
}

#[tokio::test]
async fn test_concurrent_register_same_name() {
    let (app, state) = create_router_for_testing();

    let ((first, _), (second, _)) = tokio::join!(
        register(&app, "alice", "secret123"),
        register(&app, "alice", "other456"),
    );

    let mut statuses = [first, second];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);
    assert!(state.users.find_by_name("alice").await.unwrap().is_some());
}

#[tokio::test]
async fn test_register_missing_fields() {
    let (app, _) = create_router_for_testing();

    let (status, json) = send(
        &app,
        create_json_request("POST", "/user/register", None, Some(json!({ "Name": "alice" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unreadable_bodies_are_validation_errors() {
    let (app, _) = create_router_for_testing();

    // No body and no content type
    let request = Request::builder()
        .uri("/user/login")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["message"], "Missing username or password");

    // Wrong field types
    let (status, json) = send(
        &app,
        create_json_request(
            "GET",
            "/user/login",
            None,
            Some(json!({ "username": 1, "password": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    // Broken JSON
    let request = Request::builder()
        .method("POST")
        .uri("/user/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"Name\":"))
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_login_failures_are_bad_request() {
    let (app, state) = create_router_for_testing();
    register(&app, "alice", "secret123").await;
    login_token(&app, "alice", "secret123").await;
    let before = state.users.find_by_name("alice").await.unwrap().unwrap();

    let (status, json) = login(&app, "alice", "wrong").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Wrong password");

    let (status, json) = login(&app, "nobody", "secret123").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "User not found");

    let (status, json) = send(
        &app,
        create_json_request("GET", "/user/login", None, Some(json!({ "username": "alice" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Missing username or password");

    let after = state.users.find_by_name("alice").await.unwrap().unwrap();
    assert_eq!(after.session_id, before.session_id);
}

#[tokio::test]
async fn test_responses_never_leak_hash() {
    let (app, state) = create_router_for_testing();
    register(&app, "alice", "secret123").await;
    let token = login_token(&app, "alice", "secret123").await;
    let stored = state.users.find_by_name("alice").await.unwrap().unwrap();

    let (_, profile) = send(
        &app,
        create_json_request("GET", "/user/profile", Some(&token), None),
    )
    .await;
    assert_eq!(profile["Name"], "alice");
    assert!(!profile.to_string().contains(&stored.password_hash));
    assert!(!token.contains("argon2"));
}

// =============================================================================
// Authorization Gate
// =============================================================================

#[tokio::test]
async fn test_protected_route_requires_token() {
    let (app, _) = create_router_for_testing();

    let (status, json) = send(&app, create_json_request("GET", "/user/me", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");

    let (status, _) = send(
        &app,
        create_json_request("GET", "/user/me", Some("not-a-token"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_raw_token_header_accepted() {
    let (app, _) = create_router_for_testing();
    register(&app, "alice", "secret123").await;
    let token = login_token(&app, "alice", "secret123").await;

    let request = Request::builder()
        .uri("/user/me")
        .header(header::AUTHORIZATION, token)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_token_rejected_by_gate() {
    let (app, state) = create_router_for_testing();
    register(&app, "alice", "secret123").await;
    let stored = state.users.find_by_name("alice").await.unwrap().unwrap();

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let expired = state
        .auth
        .tokens()
        .issue_at(
            &TokenSubject {
                user_id: stored.id,
                name: "alice",
                role: UserRole::Viewer,
                session_id: "old-session",
                password_fingerprint: "unused",
            },
            now - 7200,
            3600,
        )
        .unwrap();

    let (status, json) =
        send(&app, create_json_request("GET", "/user/me", Some(&expired), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_logged_out_token_still_passes_default_gate() {
    let (app, _) = create_router_for_testing();
    register(&app, "alice", "secret123").await;
    let token = login_token(&app, "alice", "secret123").await;
    logout(&app, Some(&token)).await;

    let (status, _) = send(&app, create_json_request("GET", "/user/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_strict_gate_rejects_ended_session() {
    let app = create_router(Arc::new(test_state(true)));
    register(&app, "alice", "secret123").await;

    let first = login_token(&app, "alice", "secret123").await;
    let (status, _) = send(&app, create_json_request("GET", "/user/me", Some(&first), None)).await;
    assert_eq!(status, StatusCode::OK);

    // A second login replaces the session
    let second = login_token(&app, "alice", "secret123").await;
    let (status, json) =
        send(&app, create_json_request("GET", "/user/me", Some(&first), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Session is no longer active");

    logout(&app, Some(&second)).await;
    let (status, _) = send(&app, create_json_request("GET", "/user/me", Some(&second), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Logout
// =============================================================================

#[tokio::test]
async fn test_logout_without_token() {
    let (app, _) = create_router_for_testing();

    let (status, json) = logout(&app, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "No token provided.");
}

#[tokio::test]
async fn test_logout_with_empty_bearer_header() {
    let (app, _) = create_router_for_testing();

    for value in ["Bearer ", "bearer", "Bearer    "] {
        let request = Request::builder()
            .method("DELETE")
            .uri("/user/logout")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap();

        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{value:?}");
        assert_eq!(json["message"], "No token provided.");
    }
}

#[tokio::test]
async fn test_logout_with_garbage_token_is_server_error() {
    let (app, _) = create_router_for_testing();

    let (status, json) = logout(&app, Some("garbage")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "TOKEN_ERROR");
    assert_eq!(json["message"], "Failed to authenticate token.");
}

#[tokio::test]
async fn test_logout_clears_session_and_repeats() {
    let (app, state) = create_router_for_testing();
    register(&app, "alice", "secret123").await;
    let token = login_token(&app, "alice", "secret123").await;

    let (status, _) = logout(&app, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let stored = state.users.find_by_name("alice").await.unwrap().unwrap();
    assert!(stored.session_id.is_none());

    let (status, _) = logout(&app, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_after_password_change() {
    let (app, _) = create_router_for_testing();
    register(&app, "alice", "secret123").await;
    let token = login_token(&app, "alice", "secret123").await;

    let (status, _) = send(
        &app,
        create_json_request(
            "PUT",
            "/user/update",
            Some(&token),
            Some(json!({ "Name": "alice", "Password": "changed456" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = logout(&app, Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Invalid password.");

    login_token(&app, "alice", "changed456").await;
}

// =============================================================================
// Account Update
// =============================================================================

#[tokio::test]
async fn test_update_requires_token() {
    let (app, _) = create_router_for_testing();
    register(&app, "alice", "secret123").await;

    let (status, _) = send(
        &app,
        create_json_request(
            "PUT",
            "/user/update",
            None,
            Some(json!({ "Name": "alice", "Password": "x" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_other_account_forbidden() {
    let (app, _) = create_router_for_testing();
    register(&app, "alice", "secret123").await;
    register(&app, "bob", "hunter22").await;
    let token = login_token(&app, "alice", "secret123").await;

    let (status, json) = send(
        &app,
        create_json_request(
            "PUT",
            "/user/update",
            Some(&token),
            Some(json!({ "Name": "bob", "Password": "pwned" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");

    login_token(&app, "bob", "hunter22").await;
}

#[tokio::test]
async fn test_update_role_escalation_forbidden() {
    let (app, _) = create_router_for_testing();
    register(&app, "alice", "secret123").await;
    let token = login_token(&app, "alice", "secret123").await;

    let (status, _) = send(
        &app,
        create_json_request(
            "PUT",
            "/user/update",
            Some(&token),
            Some(json!({ "Name": "alice", "Password": "secret123", "Role": "Admin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_updates_unknown_user_not_found() {
    let (app, state) = create_router_for_testing();
    register(&app, "root", "rootpass").await;

    let mut root = state.users.find_by_name("root").await.unwrap().unwrap();
    root.role = kinship_api::auth::UserRole::Admin;
    state.users.save(&root).await.unwrap();
    let token = login_token(&app, "root", "rootpass").await;

    let (status, json) = send(
        &app,
        create_json_request(
            "PUT",
            "/user/update",
            Some(&token),
            Some(json!({ "Name": "ghost", "Password": "x" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_update_keeps_email_and_session() {
    let (app, state) = create_router_for_testing();
    send(
        &app,
        create_json_request(
            "POST",
            "/user/register",
            None,
            Some(json!({ "Name": "alice", "Password": "secret123", "Email": "a@example.com" })),
        ),
    )
    .await;
    let token = login_token(&app, "alice", "secret123").await;
    let before = state.users.find_by_name("alice").await.unwrap().unwrap();

    let (status, json) = send(
        &app,
        create_json_request(
            "PUT",
            "/user/update",
            Some(&token),
            Some(json!({ "Name": "alice", "Password": "newpass" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "User updated successfully");

    let after = state.users.find_by_name("alice").await.unwrap().unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.email.as_deref(), Some("a@example.com"));
    assert_eq!(after.session_id, before.session_id);
    assert_ne!(after.password_hash, before.password_hash);
}

// =============================================================================
// Response Headers
// =============================================================================

#[test]
fn test_security_headers_present() {
    tokio_test::block_on(async {
        let (app, _) = create_router_for_testing();
        let response = app
            .oneshot(create_json_request("GET", "/health", None, None))
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    });
}
