//! HTTP server setup and configuration.
//!
//! This module provides the router and application state used by both
//! the production server and integration tests.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use pagediff_pipeline::{ImageRasterizer, Rasterizer};
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::api;
use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Turns uploaded files into page rasters.
    pub rasterizer: Arc<dyn Rasterizer + Send + Sync>,
}

impl AppState {
    /// State using a custom rasterizer.
    pub fn new(rasterizer: Arc<dyn Rasterizer + Send + Sync>) -> Self {
        Self { rasterizer }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(ImageRasterizer))
    }
}

/// Build the API router with all endpoints and middleware.
///
/// This is the core router used by both production and tests.
///
/// # Errors
///
/// Returns an error if a configured CORS origin is not a valid header
/// value.
pub fn build_router(state: AppState, config: &ServerConfig) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(config.origin_headers()?))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Ok(Router::new()
        .route("/", get(root))
        .route("/health", get(|| async { "OK" }))
        .route("/api/diff", post(api::handle_diff))
        .route("/api/compare", post(api::handle_compare))
        .route("/api/compare-pages", post(api::handle_compare_pages))
        .route(
            "/api/compare-independent",
            post(api::handle_compare_independent),
        )
        .route("/api/realign", post(api::handle_realign))
        .route("/api/crop", post(api::handle_crop))
        .route("/api/crop-independent", post(api::handle_crop_independent))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Page Diff Checker API" }))
}
