//! HTTP transport for the pagediff comparison pipeline.
//!
//! Uploads arrive as multipart forms; results leave as JSON payloads with
//! base64 PNGs, or as a bare PNG for `/api/diff`.

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, build_router};
