//! Global translational alignment.
//!
//! Estimates how far the second page drifted relative to the first by
//! phase correlation on the two intensity fields, then translates the
//! second page back. Only translation is modeled; rotation, scale, or
//! skew between the pages goes undetected and shows up downstream as
//! differences.

use image::{Rgb, RgbImage};

use crate::fft::Spectrum;
use crate::grayscale::{intensity, intensity_field};
use crate::types::{Dimensions, PipelineError, ShiftVector};

/// Translations are sampled on a 1/32-pixel grid.
const SUBPIXEL_STEPS: f64 = 32.0;

/// The aligned second image together with the displacement it undid.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// The second image translated onto the first image's frame.
    pub aligned: RgbImage,
    /// Estimated displacement of the second image.
    pub shift: ShiftVector,
}

/// Fail with [`PipelineError::DimensionMismatch`] unless both images
/// have the same size.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] on unequal dimensions.
pub fn ensure_same_dimensions(first: &RgbImage, second: &RgbImage) -> Result<(), PipelineError> {
    let left = Dimensions::of(first);
    let right = Dimensions::of(second);
    if left == right {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch { left, right })
    }
}

/// Estimate the displacement of `second` relative to `first`.
///
/// Phase correlation: the normalized cross-power spectrum of the two
/// intensity fields is transformed back, its peak gives the integer
/// offset (wrapped to signed values), and the weighted centroid of its
/// 3x3 neighborhood refines it to sub-pixel precision.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the images differ in
/// size.
pub fn estimate_shift(first: &RgbImage, second: &RgbImage) -> Result<ShiftVector, PipelineError> {
    ensure_same_dimensions(first, second)?;
    let width = first.width() as usize;
    let height = first.height() as usize;
    if width == 0 || height == 0 {
        return Ok(ShiftVector::default());
    }

    let reference = Spectrum::forward(&intensity_field(&intensity(first)), width, height);
    let moved = Spectrum::forward(&intensity_field(&intensity(second)), width, height);
    let surface = moved.correlate(&reference, true);

    Ok(locate_peak(&surface, width, height))
}

/// Align `second` onto `first`.
///
/// The correction `(-dx, -dy)` is applied as a translation; pixels
/// shifted out of frame are lost and pixels shifted in are black.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the images differ in
/// size.
pub fn align(first: &RgbImage, second: &RgbImage) -> Result<Alignment, PipelineError> {
    let shift = estimate_shift(first, second)?;
    let correction = shift.correction();
    tracing::debug!(dx = shift.dx, dy = shift.dy, "estimated page shift");
    let aligned = translate(second, correction.dx, correction.dy);
    Ok(Alignment { aligned, shift })
}

/// Translate an image by `(shift_x, shift_y)` without changing its size.
///
/// Content moves by the given amount: output `(x, y)` samples input
/// `(x - shift_x, y - shift_y)` with bilinear interpolation. The shift
/// is quantized to 1/32 pixel, so near-integer shifts copy pixels
/// exactly. Samples outside the source read as black.
#[must_use = "returns the translated image"]
#[allow(clippy::cast_possible_truncation)]
pub fn translate(image: &RgbImage, shift_x: f64, shift_y: f64) -> RgbImage {
    let source_x = -quantize(shift_x);
    let source_y = -quantize(shift_y);
    let base_x = source_x.floor();
    let base_y = source_y.floor();
    let frac_x = source_x - base_x;
    let frac_y = source_y - base_y;
    let base_x = base_x as i64;
    let base_y = base_y as i64;

    let sample = |x: i64, y: i64| -> [f64; 3] {
        match (u32::try_from(x), u32::try_from(y)) {
            (Ok(x), Ok(y)) if x < image.width() && y < image.height() => {
                let Rgb([r, g, b]) = *image.get_pixel(x, y);
                [f64::from(r), f64::from(g), f64::from(b)]
            }
            _ => [0.0; 3],
        }
    };

    let weights = [
        (0, 0, (1.0 - frac_x) * (1.0 - frac_y)),
        (1, 0, frac_x * (1.0 - frac_y)),
        (0, 1, (1.0 - frac_x) * frac_y),
        (1, 1, frac_x * frac_y),
    ];

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let sx = i64::from(x) + base_x;
        let sy = i64::from(y) + base_y;
        let mut acc = [0.0_f64; 3];
        for &(ox, oy, weight) in &weights {
            if weight <= 0.0 {
                continue;
            }
            let px = sample(sx + ox, sy + oy);
            for (a, p) in acc.iter_mut().zip(px) {
                *a += weight * p;
            }
        }
        Rgb(acc.map(to_channel))
    })
}

/// Pad two images to their common bounding size, each centered on a
/// white background.
///
/// This is how the independent-image comparison reconciles regions of
/// different sizes before alignment.
#[must_use]
pub fn pad_to_common_size(first: &RgbImage, second: &RgbImage) -> (RgbImage, RgbImage) {
    let width = first.width().max(second.width());
    let height = first.height().max(second.height());
    (
        pad_centered(first, width, height),
        pad_centered(second, width, height),
    )
}

fn pad_centered(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let x = (width - image.width()) / 2;
    let y = (height - image.height()) / 2;
    image::imageops::overlay(&mut canvas, image, i64::from(x), i64::from(y));
    canvas
}

/// Find the correlation peak and refine it to sub-pixel precision.
#[allow(clippy::cast_precision_loss)]
fn locate_peak(surface: &[f64], width: usize, height: usize) -> ShiftVector {
    // First maximum in row-major order wins ties.
    let (index, _) = surface
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 { (i, v) } else { best }
        });
    let px = index % width;
    let py = index / width;
    let (offset_x, offset_y) = centroid_offset(surface, width, height, px, py);

    ShiftVector::new(
        wrap_signed(px, width) + offset_x,
        wrap_signed(py, height) + offset_y,
    )
}

/// Weighted centroid of the 3x3 neighborhood around `(px, py)`,
/// relative to the peak. Neighbors wrap around the surface edges and
/// negative responses carry no weight.
#[allow(clippy::cast_precision_loss)]
fn centroid_offset(
    surface: &[f64],
    width: usize,
    height: usize,
    px: usize,
    py: usize,
) -> (f64, f64) {
    let mut total = 0.0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for dy in -1_i64..=1 {
        for dx in -1_i64..=1 {
            let x = wrap_index(px, dx, width);
            let y = wrap_index(py, dy, height);
            let weight = surface[y * width + x].max(0.0);
            total += weight;
            sum_x += weight * dx as f64;
            sum_y += weight * dy as f64;
        }
    }
    if total <= 0.0 {
        return (0.0, 0.0);
    }
    (sum_x / total, sum_y / total)
}

/// `index + step` on a circle of `n` positions.
fn wrap_index(index: usize, step: i64, n: usize) -> usize {
    match step {
        -1 => (index + n - 1) % n,
        1 => (index + 1) % n,
        _ => index,
    }
}

/// Map a circular index to a signed offset in `(-n/2, n/2]`.
#[allow(clippy::cast_precision_loss)]
fn wrap_signed(p: usize, n: usize) -> f64 {
    if p > n / 2 {
        p as f64 - n as f64
    } else {
        p as f64
    }
}

/// Snap a shift to the nearest 1/32 pixel.
fn quantize(v: f64) -> f64 {
    (v * SUBPIXEL_STEPS).round() / SUBPIXEL_STEPS
}

/// Round and clamp an interpolated sample to a channel value.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
