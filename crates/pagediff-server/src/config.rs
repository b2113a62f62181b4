//! Server configuration from command-line flags and environment.

use std::net::SocketAddr;

use axum::http::HeaderValue;
use clap::Args;

/// Local development origins allowed by default.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "http://localhost:5173",
    "http://localhost:5174",
    "http://localhost:3000",
];

/// Default request body limit: 64 MiB, enough for a pair of
/// high-resolution page scans.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Network and transport settings.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "PAGEDIFF_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Origins allowed to call the API from a browser (comma-separated).
    #[arg(
        long,
        env = "PAGEDIFF_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_values_t = DEFAULT_ALLOWED_ORIGINS.map(String::from)
    )]
    pub allowed_origins: Vec<String>,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "PAGEDIFF_BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,
}

impl ServerConfig {
    /// Parse the allowed origins into header values.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first origin that is not a valid
    /// header value.
    pub fn origin_headers(&self) -> anyhow::Result<Vec<HeaderValue>> {
        self.allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim())
                    .map_err(|e| anyhow::anyhow!("invalid allowed origin {origin:?}: {e}"))
            })
            .collect()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.map(String::from).to_vec(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}
