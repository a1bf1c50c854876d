//! End-to-end tests for the auth HTTP surface
//!
//! Each test builds the full router over a fresh store in a temp directory and
//! drives it with `oneshot` requests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use sentiment_auth::auth::{
    open_user_store, AuthState, JwtHandler, PasswordHasher, UserRole, UserStore,
};
use sentiment_auth::build_router;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";

struct TestApp {
    router: Router,
    store: Arc<dyn UserStore>,
    _dir: TempDir,
}

fn test_app(store_file: &str) -> TestApp {
    let dir = TempDir::new().unwrap();
    let url = dir.path().join(store_file);
    let store: Arc<dyn UserStore> = Arc::from(open_user_store(url.to_str().unwrap()).unwrap());

    let state = AuthState::new(
        store.clone(),
        Arc::new(JwtHandler::new(SECRET)),
        Arc::new(PasswordHasher::new(4)),
    )
    .unwrap();

    TestApp {
        router: build_router(state),
        store,
        _dir: dir,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn get_with_token(router: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    send(router, builder.body(Body::empty()).unwrap()).await
}

async fn register(router: &Router, email: &str, password: &str, role: Option<&str>) -> StatusCode {
    let mut body = json!({ "username": "tester", "email": email, "password": password });
    if let Some(role) = role {
        body["role"] = json!(role);
    }
    post_json(router, "/api/auth/register", body).await.0
}

async fn login(router: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    post_json(
        router,
        "/api/auth/login",
        json!({ "email": email, "password": password }),
    )
    .await
}

async fn token_for(router: &Router, email: &str, password: &str) -> String {
    let (status, body) = login(router, email, password).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_then_duplicate_with_different_case() {
    let app = test_app("users.json");

    let (status, body) = post_json(
        &app.router,
        "/api/auth/register",
        json!({ "username": "a", "email": "a@x.com", "password": "secret123" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "User created successfully" }));

    let (status, body) = post_json(
        &app.router,
        "/api/auth/register",
        json!({ "username": "b", "email": "A@X.com", "password": "secret123" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "User already exists");
    assert_eq!(app.store.load_all().unwrap().len(), 1);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = test_app("users.json");
    assert_eq!(register(&app.router, "a@x.com", "secret123", None).await, StatusCode::OK);

    let (status, body) = login(&app.router, "a@x.com", "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid credentials");

    let (status, unknown) = login(&app.router, "ghost@x.com", "secret123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, body);
}

#[tokio::test]
async fn user_token_is_forbidden_on_admin_endpoint() {
    let app = test_app("users.json");
    assert_eq!(register(&app.router, "a@x.com", "secret123", None).await, StatusCode::OK);

    let token = token_for(&app.router, "a@x.com", "secret123").await;

    let (status, body) = get_with_token(&app.router, "/api/user/data", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hello a@x.com! You have USER access.");

    let (status, body) = get_with_token(&app.router, "/api/admin/data", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Forbidden: insufficient permissions");
}

#[tokio::test]
async fn admin_token_is_forbidden_on_user_endpoint() {
    let app = test_app("users.json");
    assert_eq!(
        register(&app.router, "root@x.com", "hunter22", Some("ADMIN")).await,
        StatusCode::OK
    );

    let token = token_for(&app.router, "root@x.com", "hunter22").await;

    let (status, body) = get_with_token(&app.router, "/api/admin/data", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hello root@x.com! You have ADMIN access.");

    let (status, _) = get_with_token(&app.router, "/api/user/data", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_or_invalid_token_is_unauthorized() {
    let app = test_app("users.json");

    let (status, body) = get_with_token(&app.router, "/api/user/data", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token");

    let (status, _) = get_with_token(&app.router, "/api/admin/data", Some("not.a.jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = JwtHandler::new(b"some-other-secret-some-other-secret!!")
        .issue(&sentiment_auth::auth::models::TokenSubject {
            email: "a@x.com".to_string(),
            role: UserRole::Admin,
        })
        .unwrap();
    let (status, _) = get_with_token(&app.router, "/api/admin/data", Some(&foreign)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_bearer_scheme_is_unauthorized() {
    let app = test_app("users.json");
    let request = Request::builder()
        .uri("/api/user/data")
        .header(header::AUTHORIZATION, "Basic YTpi")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let app = test_app("users.json");

    let (status, body) = post_json(
        &app.router,
        "/api/auth/register",
        json!({ "username": "a", "password": "secret123" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("email"));

    let (status, _) = post_json(
        &app.router,
        "/api/auth/register",
        json!({ "username": "a", "email": "nope", "password": "secret123" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = post_json(
        &app.router,
        "/api/auth/register",
        json!({ "username": "a", "email": "a@x.com", "password": "pw", "role": "OWNER" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("role"));

    let (status, _) = post_json(&app.router, "/api/auth/login", json!({ "email": "a@x.com" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn empty_password_and_bad_email_domain_are_rejected() {
    let app = test_app("users.json");

    let (status, body) = post_json(
        &app.router,
        "/api/auth/register",
        json!({ "username": "a", "email": "a@x.com", "password": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "password: must not be empty");

    let (status, body) = post_json(
        &app.router,
        "/api/auth/register",
        json!({ "username": "a", "email": "<script>@x_y.com", "password": "secret123" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "email: value is not a valid email address");
    assert!(app.store.load_all().unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_duplicate_check_folds_non_ascii_case() {
    let app = test_app("auth.db");

    // Internationalized domain; SQLite's NOCASE alone would treat Ä and ä as distinct
    assert_eq!(register(&app.router, "a@bär.de", "secret123", None).await, StatusCode::OK);
    assert_eq!(
        register(&app.router, "a@BÄR.de", "secret123", None).await,
        StatusCode::BAD_REQUEST
    );

    let token = token_for(&app.router, "A@BÄR.DE", "secret123").await;
    let (status, body) = get_with_token(&app.router, "/api/user/data", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hello a@bär.de! You have USER access.");
}

#[tokio::test]
async fn sqlite_backend_serves_the_same_flow() {
    let app = test_app("auth.db");

    assert_eq!(register(&app.router, "a@x.com", "secret123", None).await, StatusCode::OK);
    assert_eq!(
        register(&app.router, "A@X.COM", "secret123", None).await,
        StatusCode::BAD_REQUEST
    );

    let token = token_for(&app.router, "A@x.com", "secret123").await;
    let (status, _) = get_with_token(&app.router, "/api/user/data", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn corrupt_store_is_a_server_error_without_detail() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("users.json");
    std::fs::write(&path, "[{ broken").unwrap();

    let store: Arc<dyn UserStore> = Arc::from(open_user_store(path.to_str().unwrap()).unwrap());
    let state = AuthState::new(
        store,
        Arc::new(JwtHandler::new(SECRET)),
        Arc::new(PasswordHasher::new(4)),
    )
    .unwrap();
    let router = build_router(state);

    let (status, body) = login(&router, "a@x.com", "secret123").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Internal Server Error");

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{ broken");
}

#[tokio::test]
async fn concurrent_registrations_are_all_kept() {
    let app = test_app("users.json");

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let router = app.router.clone();
            tokio::spawn(async move {
                register(&router, &format!("user{i}@x.com"), "secret123", None).await
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(app.store.load_all().unwrap().len(), 10);
}

#[tokio::test]
async fn health_check_is_public() {
    let app = test_app("users.json");
    let (status, body) = get_with_token(&app.router, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
