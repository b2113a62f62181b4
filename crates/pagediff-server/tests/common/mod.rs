//! Shared test infrastructure for the server integration tests.
//!
//! Each test file compiles its own copy of this module, so items may
//! appear unused from the perspective of a single test file.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use http_body_util::BodyExt;
use image::{Rgb, RgbImage};
use tower::ServiceExt;

use pagediff_server::{AppState, ServerConfig, build_router};

const BOUNDARY: &str = "pagediff-test-boundary";

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Router under test, built exactly as production builds it.
pub struct TestApp {
    router: axum::Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(&ServerConfig::default())
    }

    pub fn with_config(config: &ServerConfig) -> Self {
        let router = build_router(AppState::default(), config).expect("router should build");
        Self { router }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_form(&self, path: &str, form: MultipartForm) -> TestResponse {
        let request = Request::post(path)
            .header("content-type", MultipartForm::content_type())
            .body(Body::from(form.finish()))
            .unwrap();
        self.request(request).await
    }

    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response should be JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Assert the status, showing the body on failure.
pub fn assert_status(response: &TestResponse, expected: StatusCode) {
    assert_eq!(
        response.status,
        expected,
        "expected {expected}, got {}. Body: {}",
        response.status,
        response.text()
    );
}

/// Builder for a `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn image(self, name: &str, image: &RgbImage) -> Self {
        self.file(name, &png(image))
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub fn png(image: &RgbImage) -> Vec<u8> {
    pagediff_export::encode_png_rgb(image).expect("PNG encoding should succeed")
}

/// A white page with a black square of side `size` at `(x, y)`.
pub fn page_with_square(width: u32, height: u32, x: u32, y: u32, size: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |px, py| {
        if (x..x + size).contains(&px) && (y..y + size).contains(&py) {
            BLACK
        } else {
            WHITE
        }
    })
}

/// Decode a base64 PNG field of a JSON payload.
pub fn decode_b64_png(value: &serde_json::Value) -> image::DynamicImage {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value.as_str().expect("field should be a string"))
        .expect("field should be base64");
    image::load_from_memory(&bytes).expect("field should be a PNG")
}
