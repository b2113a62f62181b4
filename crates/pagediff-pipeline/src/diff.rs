//! Difference detection and highlight rendering.
//!
//! Detection is a single pass over the raw RGB buffers and the mask
//! buffer zipped together, so it scales with the pixel count without
//! per-pixel coordinate lookups. Rendering draws one red square outline
//! per flagged position; overlapping outlines are left as they fall.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::types::{DiffPixelSet, PipelineError};

/// Outline color of difference markers.
pub const HIGHLIGHT: Rgb<u8> = Rgb([255, 0, 0]);

/// Bound on an outline's half-width and center coordinates, so every
/// edge coordinate of the drawn square fits in `i32`.
const MAX_REACH_I32: i32 = i32::MAX / 4;
#[allow(clippy::cast_sign_loss)]
const MAX_REACH: u32 = MAX_REACH_I32 as u32;

/// Largest possible [`color_distance`] between two 8-bit RGB pixels.
pub const MAX_COLOR_DISTANCE: u32 = 3 * 255;

/// Sum of absolute per-channel differences between two RGB pixels.
///
/// Symmetric, zero iff the pixels are equal, and bounded by
/// [`MAX_COLOR_DISTANCE`].
#[must_use]
pub fn color_distance(a: Rgb<u8>, b: Rgb<u8>) -> u32 {
    channel_distance(&a.0, &b.0)
}

fn channel_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&p, &q)| u32::from(p.abs_diff(q)))
        .sum()
}

/// Find positions where `first` and `second` differ by more than
/// `threshold`, skipping positions where `mask` is zero.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the two images (or
/// the mask) do not share the same size.
pub fn detect_differences(
    first: &RgbImage,
    second: &RgbImage,
    mask: &GrayImage,
    threshold: u32,
) -> Result<DiffPixelSet, PipelineError> {
    crate::align::ensure_same_dimensions(first, second)?;
    if mask.dimensions() != first.dimensions() {
        return Err(PipelineError::DimensionMismatch {
            left: crate::types::Dimensions::of(first),
            right: crate::types::Dimensions::of(mask),
        });
    }

    let width = first.width() as usize;
    let positions = first
        .as_raw()
        .chunks_exact(3)
        .zip(second.as_raw().chunks_exact(3))
        .zip(mask.as_raw())
        .enumerate()
        .filter(|&(_, ((a, b), &m))| m != 0 && channel_distance(a, b) > threshold)
        .map(|(i, _)| position(i, width))
        .collect();

    Ok(DiffPixelSet::new(positions))
}

/// Draw a `2 * box_size + 1` red square outline centered on every
/// difference, on a copy of `base`.
#[must_use = "returns the highlighted image"]
pub fn render_highlights(base: &RgbImage, diffs: &DiffPixelSet, box_size: u32) -> RgbImage {
    let mut output = base.clone();
    // An outline reaching past the longer side lies wholly off the image.
    let reach = box_size
        .min(base.width().max(base.height()))
        .min(MAX_REACH);
    let Ok(half) = i32::try_from(reach) else {
        return output;
    };
    let side = reach * 2 + 1;
    for &(x, y) in diffs.positions() {
        let (Ok(x), Ok(y)) = (i32::try_from(x), i32::try_from(y)) else {
            continue;
        };
        if x > MAX_REACH_I32 || y > MAX_REACH_I32 {
            continue;
        }
        let rect = Rect::at(x - half, y - half).of_size(side, side);
        draw_hollow_rect_mut(&mut output, rect, HIGHLIGHT);
    }
    output
}

#[allow(clippy::cast_possible_truncation)]
const fn position(index: usize, width: usize) -> (u32, u32) {
    ((index % width) as u32, (index / width) as u32)
}
