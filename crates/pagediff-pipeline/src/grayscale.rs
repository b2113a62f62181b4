//! Intensity conversion.
//!
//! Every stage that works on a single channel (alignment, part
//! extraction, template matching) goes through here so they all agree
//! on the same luminance weights.

use image::{GrayImage, RgbImage};

/// Convert an RGB image to single-channel intensity.
///
/// Uses the BT.601 luma weights `0.299*R + 0.587*G + 0.114*B`, rounded
/// to the nearest integer, so a pure white page stays at 255 and pure
/// black at 0.
#[must_use = "returns the intensity image"]
pub fn intensity(image: &RgbImage) -> GrayImage {
    let raw: Vec<u8> = image
        .as_raw()
        .chunks_exact(3)
        .map(|px| luma(px[0], px[1], px[2]))
        .collect();
    GrayImage::from_raw(image.width(), image.height(), raw)
        .unwrap_or_else(|| GrayImage::new(image.width(), image.height()))
}

/// Intensity field as `f64` samples in row-major order.
///
/// Input to the frequency-domain stages.
#[must_use]
pub fn intensity_field(image: &GrayImage) -> Vec<f64> {
    image.as_raw().iter().map(|&v| f64::from(v)).collect()
}

/// BT.601 luma of one pixel in fixed-point arithmetic.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    u8::try_from((weighted + 500) / 1000).unwrap_or(u8::MAX)
}
