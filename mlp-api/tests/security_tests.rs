//! Security tests for mlp-api
//!
//! - Stored and requested file paths cannot leave the library root
//! - Request bodies are capped at MAX_BODY_BYTES
//! - Forged session cookies grant nothing

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use mlp_api::{build_router, AppState, MAX_BODY_BYTES};
use mlp_common::db::Permissions;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use tower::util::ServiceExt;

/// Test helper: app over a pool that never connects
fn setup_app() -> axum::Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://mlp@127.0.0.1:1/mlp_unreachable")
        .expect("Lazy pool URL should parse");
    let state = AppState::new(pool, Permissions::defaults(), PathBuf::from("/srv/library"));
    build_router(state)
}

async fn error_code(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    let json: Value = serde_json::from_slice(&bytes).expect("Should parse JSON");
    json["error"]["code"].clone()
}

// =============================================================================
// Path traversal
// =============================================================================

#[tokio::test]
async fn test_raw_download_rejects_traversal() {
    let app = setup_app();

    for path in ["../etc/passwd", "surveys/../../etc/passwd", "/etc/passwd", "%2E%2E/secret"] {
        let request = Request::builder()
            .uri(format!("/api/files/download/raw?path={}", path))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "path {}", path);
        assert_eq!(error_code(response.into_body()).await, "invalid");
    }
}

#[tokio::test]
async fn test_download_rejects_non_numeric_id() {
    let app = setup_app();

    let request = Request::builder()
        .uri("/api/files/download/..%2F..%2Fetc%2Fpasswd")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Body size limit
// =============================================================================

#[tokio::test]
async fn test_oversized_body_rejected() {
    let app = setup_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(vec![b'x'; MAX_BODY_BYTES + 1024]))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// =============================================================================
// Session cookies
// =============================================================================

#[tokio::test]
async fn test_empty_session_cookie_is_a_visitor() {
    let app = setup_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/stations/remove/1")
        .header(header::COOKIE, "mlp_session=")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(response.into_body()).await, "restrict");
}
