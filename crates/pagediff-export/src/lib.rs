//! pagediff-export: Pure result encoders (sans-IO)
//!
//! Turns comparison and crop results into PNG bytes and JSON-ready
//! payloads with base64-embedded images.

pub mod payload;
pub mod png;

pub use payload::{ComparisonPayload, CropPayload, EncodedRegion};
pub use png::{encode_png_rgb, encode_png_rgba};

/// Errors that can occur while encoding results.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The PNG encoder rejected the image.
    #[error("failed to encode PNG: {0}")]
    Encode(String),
}

impl From<image::ImageError> for ExportError {
    fn from(err: image::ImageError) -> Self {
        Self::Encode(err.to_string())
    }
}
