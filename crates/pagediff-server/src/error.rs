use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pagediff_export::ExportError;
use pagediff_pipeline::PipelineError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing form field: {0}")]
    MissingField(&'static str),

    #[error("Invalid form field {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("Encoding error: {0}")]
    Export(#[from] ExportError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::Multipart(e.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingField(_)
            | Self::InvalidField { .. }
            | Self::Multipart(_)
            | Self::Pipeline(_) => StatusCode::BAD_REQUEST,
            Self::Export(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = Json(json!({
            "status": status.as_u16(),
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
