#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sentinel_api::config::{LedgerBackend, ServerConfig};
use sentinel_api::router::build_app_router;
use sentinel_api::state::AppState;
use sentinel_core::types::DbId;
use sentinel_db::MemoryTokenLedger;
use sentinel_events::EventBus;
use sentinel_rotation::issuer::jwt::encode_access_token;
use sentinel_rotation::issuer::{JwtConfig, JwtIssuer};
use sentinel_rotation::{RotationConfig, RotationService};
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults and an in-memory ledger.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        ledger_backend: LedgerBackend::Memory,
        jwt: JwtConfig::with_secret("integration-test-secret-long-enough-for-hmac"),
        rotation: RotationConfig {
            purge_on_rotate: false,
            ..RotationConfig::default()
        },
    }
}

/// A router over a fresh in-memory ledger, plus handles for assertions.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub config: ServerConfig,
}

impl TestApp {
    /// Mint a bearer access token for `user_id`.
    pub fn bearer(&self, user_id: DbId) -> String {
        encode_access_token(user_id, "user", &self.config.jwt)
            .expect("test token generation should succeed")
    }

    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application with the production middleware stack.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config())
}

pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let ledger = Arc::new(MemoryTokenLedger::new());
    let event_bus = Arc::new(EventBus::default());
    let rotation = Arc::new(RotationService::new(
        ledger,
        Arc::new(JwtIssuer::new(config.jwt.clone())),
        Arc::clone(&event_bus),
        config.rotation.clone(),
    ));

    let state = AppState {
        rotation,
        config: Arc::new(config.clone()),
        event_bus,
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        config,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("request should complete")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be valid JSON")
}
