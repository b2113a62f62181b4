//! Edge mask: exclude the border a translation drags into frame.
//!
//! After alignment the aligned image carries a band of fill pixels on
//! the side(s) it was shifted away from. Those pixels are not content
//! and must not be scored as differences.

use image::{GrayImage, Luma};

use crate::types::{Dimensions, ShiftVector};

/// Mask value for pixels eligible for comparison.
pub const VALID: u8 = 255;

/// Mask value for excluded border pixels.
pub const EXCLUDED: u8 = 0;

/// Build the exclusion mask for an alignment correction.
///
/// `correction` is the translation applied to the second image (the
/// negated estimated shift). For the vertical axis: a positive shift
/// zeroes rows `[0, floor(shift_y))`, a negative one zeroes rows
/// `[rows - floor(|shift_y|), rows)`. Columns follow the same rule with
/// `shift_x`. Band thickness is clamped to the image size.
#[must_use = "returns the edge mask"]
pub fn edge_mask(dimensions: Dimensions, correction: ShiftVector) -> GrayImage {
    let Dimensions { width, height } = dimensions;
    let mut mask = GrayImage::from_pixel(width, height, Luma([VALID]));

    let rows = band(correction.dy, height);
    let cols = band(correction.dx, width);

    for y in rows {
        for x in 0..width {
            mask.put_pixel(x, y, Luma([EXCLUDED]));
        }
    }
    for x in cols {
        for y in 0..height {
            mask.put_pixel(x, y, Luma([EXCLUDED]));
        }
    }
    mask
}

/// Index range of the excluded band along one axis of length `len`.
fn band(shift: f64, len: u32) -> std::ops::Range<u32> {
    let thickness = band_thickness(shift).min(len);
    if shift > 0.0 {
        0..thickness
    } else if shift < 0.0 {
        len - thickness..len
    } else {
        0..0
    }
}

/// `floor(|shift|)` as a pixel count.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn band_thickness(shift: f64) -> u32 {
    let magnitude = shift.abs().floor();
    if magnitude >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        magnitude as u32
    }
}
