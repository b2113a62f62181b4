//! Tests for the router shell: root, health, CORS and body limits.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{MultipartForm, TestApp, assert_status};
use pagediff_server::ServerConfig;

#[tokio::test]
async fn root_names_the_service() {
    let app = TestApp::new();
    let response = app.get("/").await;
    assert_status(&response, StatusCode::OK);
    assert_eq!(response.json()["message"], "Page Diff Checker API");
}

#[tokio::test]
async fn health_check_answers_ok() {
    let app = TestApp::new();
    let response = app.get("/health").await;
    assert_status(&response, StatusCode::OK);
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = TestApp::new();
    let response = app.get("/api/nothing-here").await;
    assert_status(&response, StatusCode::NOT_FOUND);
}

fn preflight(origin: &str) -> Request<Body> {
    Request::options("/api/compare")
        .header("origin", origin)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn preflight_from_allowed_origin_is_granted() {
    let app = TestApp::new();
    let response = app.request(preflight("http://localhost:5173")).await;

    assert_status(&response, StatusCode::OK);
    assert_eq!(
        response.header("access-control-allow-origin"),
        Some("http://localhost:5173")
    );
    assert_eq!(
        response.header("access-control-allow-credentials"),
        Some("true")
    );
    assert_eq!(response.header("access-control-allow-methods"), Some("POST"));
}

#[tokio::test]
async fn preflight_from_unknown_origin_gets_no_grant() {
    let app = TestApp::new();
    let response = app.request(preflight("http://evil.example")).await;
    assert_eq!(response.header("access-control-allow-origin"), None);
}

#[tokio::test]
async fn configured_origins_replace_the_defaults() {
    let config = ServerConfig {
        allowed_origins: vec!["https://diff.example".into()],
        ..ServerConfig::default()
    };
    let app = TestApp::with_config(&config);

    let allowed = app.request(preflight("https://diff.example")).await;
    assert_eq!(
        allowed.header("access-control-allow-origin"),
        Some("https://diff.example")
    );
    let default_origin = app.request(preflight("http://localhost:5173")).await;
    assert_eq!(default_origin.header("access-control-allow-origin"), None);
}

#[test]
fn invalid_origin_fails_router_construction() {
    let config = ServerConfig {
        allowed_origins: vec!["bad\norigin".into()],
        ..ServerConfig::default()
    };
    assert!(pagediff_server::build_router(pagediff_server::AppState::default(), &config).is_err());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let config = ServerConfig {
        body_limit: 1024,
        ..ServerConfig::default()
    };
    let app = TestApp::with_config(&config);

    let form = MultipartForm::new().file("file1", &[0_u8; 4096]);
    let body = form.finish();
    let request = Request::post("/api/compare")
        .header("content-type", MultipartForm::content_type())
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();
    let response = app.request(request).await;

    assert_status(&response, StatusCode::PAYLOAD_TOO_LARGE);
}
