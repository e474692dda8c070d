#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use signoff_api::auth::jwt::{generate_access_token, JwtConfig, TokenSubject};
use signoff_api::config::ServerConfig;
use signoff_api::router::build_app_router;
use signoff_api::state::AppState;
use signoff_core::ApprovalEngine;
use signoff_events::EventBus;

pub const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Build a test `ServerConfig` with safe defaults and the in-memory store.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
        max_conflict_retries: 3,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// Build the full application over a fresh in-memory engine.
///
/// The returned state shares the engine and event bus with the router, so
/// tests can subscribe to events or inspect the engine directly.
pub fn build_test_app() -> (Router, AppState) {
    let config = test_config();
    let state = AppState {
        engine: Arc::new(ApprovalEngine::in_memory()),
        pool: None,
        config: Arc::new(config.clone()),
        event_bus: Arc::new(EventBus::default()),
    };
    (build_app_router(state.clone(), &config), state)
}

/// Issue a token for `user_id` with the given role. Name and email are
/// derived from the id.
pub fn token_for(user_id: &str, role: &str) -> String {
    let name = format!("User {user_id}");
    let email = format!("{user_id}@example.com");
    let subject = TokenSubject {
        user_id,
        name: &name,
        email: &email,
        role,
    };
    generate_access_token(&subject, &test_config().jwt).expect("token generation should succeed")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send_json(app, Method::POST, uri, body, None).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send_json(app, Method::POST, uri, body, Some(token)).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send_json(app, Method::PUT, uri, body, Some(token)).await
}

async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// An approver entry as accepted in step definitions.
pub fn approver(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("User {id}"),
        "email": format!("{id}@example.com"),
        "role": "architect",
    })
}
