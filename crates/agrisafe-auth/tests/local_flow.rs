//! Registration, verification and session endpoints against the in-memory
//! backend.

use std::sync::Arc;

use agrisafe_auth::{
    AuthConfig, AuthError, AuthOrchestrator, AuthState, FixedClock, FixedRandom,
    MemoryAuthStorage, RegisterRequest, Role, UserStorage, auth_router,
};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

const T0: i64 = 1_700_000_000;

struct Harness {
    clock: Arc<FixedClock>,
    storage: Arc<MemoryAuthStorage>,
    orchestrator: Arc<AuthOrchestrator>,
    router: Router,
}

fn harness() -> Harness {
    let mut config = AuthConfig::default();
    config.token.secret = "integration-test-secret-0123456789abcdef".into();

    let clock = Arc::new(FixedClock::at(T0));
    let storage = Arc::new(MemoryAuthStorage::new());
    let orchestrator = Arc::new(
        AuthOrchestrator::from_config(
            &config,
            storage.clone(),
            storage.clone(),
            clock.clone(),
            Arc::new(FixedRandom::new(7)),
        )
        .unwrap(),
    );
    let router = auth_router(AuthState::new(orchestrator.clone(), &config));

    Harness {
        clock,
        storage,
        orchestrator,
        router,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<String>, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookies = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, cookies, json)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn registration() -> Value {
    json!({ "name": "Alice", "email": "a@example.com", "password": "correct horse" })
}

#[tokio::test]
async fn register_then_verify_email() {
    let h = harness();

    let session = h
        .orchestrator
        .register(RegisterRequest {
            name: "Alice".into(),
            email: "a@example.com".into(),
            password: "correct horse".into(),
        })
        .await
        .unwrap();

    let claims = h.orchestrator.codec().decode(session.token.as_str()).unwrap();
    assert_eq!(claims.role, Role::Member);
    assert!(!claims.email_verified);
    assert_eq!(claims.email, "a@example.com");

    let stored = h.storage.tokens_for_user(session.user.id).await.remove(0);
    h.orchestrator.verify_email(&stored.token).await.unwrap();

    let user = h.storage.find_by_email("a@example.com").await.unwrap().unwrap();
    assert!(user.email_verified);
    assert!(user.active);
}

#[tokio::test]
async fn register_endpoint_sets_session_cookie() {
    let h = harness();

    let (status, cookies, body) = send(&h.router, post_json("/auth/register", registration())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "a@example.com");
    assert_eq!(body["user"]["name"], "Alice");
    assert!(body["user"].get("password_hash").is_none());

    let token = body["token"].as_str().unwrap();
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with(&format!("auth_token={token}")) && c.contains("HttpOnly"))
    );

    let (status, _, me) = send(&h.router, with_bearer("GET", "/auth/me", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@example.com");
    assert_eq!(me["role"], "member");
    assert_eq!(me["email_verified"], false);
}

#[tokio::test]
async fn register_conflict_and_validation() {
    let h = harness();

    let (status, _, _) = send(&h.router, post_json("/auth/register", registration())).await;
    assert_eq!(status, StatusCode::CREATED);

    let mut again = registration();
    again["email"] = json!("A@Example.com");
    let (status, _, body) = send(&h.router, post_json("/auth/register", again)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "email_already_registered");
    assert_eq!(h.storage.user_count().await, 1);

    let mut weak = registration();
    weak["email"] = json!("b@example.com");
    weak["password"] = json!("short");
    let (status, _, body) = send(&h.router, post_json("/auth/register", weak)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn verify_email_endpoint_is_single_use() {
    let h = harness();
    let (_, _, body) = send(&h.router, post_json("/auth/register", registration())).await;
    let user_id = body["user"]["id"].as_str().unwrap().parse().unwrap();
    let token = h.storage.tokens_for_user(user_id).await.remove(0).token;

    let (status, _, body) = send(
        &h.router,
        Request::get(format!("/auth/verify-email?token={token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email verified");

    let (status, _, body) = send(
        &h.router,
        post_json("/auth/verify-email", json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "verification_token_used");

    let (status, _, body) = send(
        &h.router,
        post_json("/auth/verify-email", json!({ "token": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "verification_token_not_found");
}

#[tokio::test]
async fn verify_email_after_expiry() {
    let h = harness();
    let (_, _, body) = send(&h.router, post_json("/auth/register", registration())).await;
    let user_id = body["user"]["id"].as_str().unwrap().parse().unwrap();
    let token = h.storage.tokens_for_user(user_id).await.remove(0).token;

    h.clock.advance(25 * 3600);
    let err = h.orchestrator.verify_email(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenExpired));
}

#[tokio::test]
async fn refresh_endpoint_window() {
    let h = harness();
    let (_, _, body) = send(&h.router, post_json("/auth/register", registration())).await;
    let token = body["token"].as_str().unwrap().to_string();

    h.clock.advance(100);
    let (status, _, body) = send(&h.router, with_bearer("POST", "/auth/refresh", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "not_eligible_for_refresh");

    h.clock.advance(1800);
    let (status, cookies, body) =
        send(&h.router, with_bearer("POST", "/auth/refresh", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let renewed = body["token"].as_str().unwrap();
    assert_ne!(renewed, token);
    assert!(cookies.iter().any(|c| c.starts_with("auth_token=")));

    h.clock.advance(3600);
    let (status, _, body) = send(&h.router, with_bearer("GET", "/auth/me", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_expired");
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let h = harness();
    let (_, _, body) = send(&h.router, post_json("/auth/register", registration())).await;
    let token = body["token"].as_str().unwrap();

    let request = Request::get("/auth/me")
        .header(header::COOKIE, format!("auth_token={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, me) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@example.com");
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let h = harness();

    let (status, _, body) = send(
        &h.router,
        Request::get("/auth/me").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, _, body) = send(&h.router, with_bearer("GET", "/auth/me", "garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "malformed_token");
}

#[tokio::test]
async fn logout_clears_cookie() {
    let h = harness();

    let (_, _, body) = send(&h.router, post_json("/auth/register", registration())).await;
    let token = body["token"].as_str().unwrap();

    let request = Request::post("/auth/logout")
        .header(header::COOKIE, format!("auth_token={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, cookies, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("auth_token=") && c.contains("Max-Age=0"))
    );
}

#[tokio::test]
async fn logout_without_session_succeeds() {
    let h = harness();
    let (status, _, body) = send(
        &h.router,
        Request::post("/auth/logout").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");
}

#[tokio::test]
async fn oidc_routes_without_provider() {
    let h = harness();

    let (status, _, body) = send(
        &h.router,
        Request::get("/auth/login").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "oidc_not_configured");
}
