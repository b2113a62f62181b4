//! Local realignment of a single part by template matching.
//!
//! After global alignment one region may still sit in the wrong place,
//! for example a moved logo on an otherwise identical page. The region
//! is cut out of the aligned image and searched for in the first image
//! with zero-mean normalized cross-correlation; the aligned image is
//! then patched so the region sits where it matched.

use image::{GrayImage, Rgb, RgbImage};

use crate::fft::Spectrum;
use crate::grayscale::{intensity, intensity_field};
use crate::types::{Dimensions, PartRectangle, PipelineError};

/// Best placement of a template within a larger image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    /// Left edge of the best window.
    pub x: u32,
    /// Top edge of the best window.
    pub y: u32,
    /// Correlation coefficient in `[-1, 1]`; 0 for flat windows.
    pub score: f64,
}

/// Find where `template` best matches inside `image`.
///
/// Scores every window position with the correlation coefficient
/// between the template and the window. The numerator for all windows
/// comes from one FFT cross-correlation; window energies come from
/// exact integer prefix sums. Windows or templates with no variance
/// score 0. The first maximum in row-major order wins.
///
/// Returns `None` if the template is empty or larger than the image.
#[must_use]
pub fn match_template(image: &GrayImage, template: &GrayImage) -> Option<TemplateMatch> {
    let (width, height) = image.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > width || th > height {
        return None;
    }

    let (w, h) = (width as usize, height as usize);
    let (tw_us, th_us) = (tw as usize, th as usize);
    let n = u128::from(tw) * u128::from(th);

    let t_sum: u128 = template.pixels().map(|p| u128::from(p.0[0])).sum();
    let t_sq: u128 = template
        .pixels()
        .map(|p| u128::from(p.0[0]) * u128::from(p.0[0]))
        .sum();
    let template_energy = centered_energy(n, t_sum, t_sq);

    #[allow(clippy::cast_precision_loss)]
    let t_mean = t_sum as f64 / n as f64;
    let centered: Vec<f64> = template
        .pixels()
        .map(|p| f64::from(p.0[0]) - t_mean)
        .collect();

    let field = Spectrum::forward(&intensity_field(image), w, h);
    let pattern = Spectrum::forward_padded(&centered, tw_us, th_us, w, h);
    let numerators = field.correlate(&pattern, false);

    let sums = PrefixSums::new(image);
    let mut best = TemplateMatch {
        x: 0,
        y: 0,
        score: f64::NEG_INFINITY,
    };
    for y in 0..=height - th {
        for x in 0..=width - tw {
            let (s, sq) = sums.window(x, y, tw, th);
            let window_energy = centered_energy(n, s, sq);
            let denominator = (template_energy * window_energy).sqrt();
            let score = if denominator > 0.0 {
                (numerators[y as usize * w + x as usize] / denominator).clamp(-1.0, 1.0)
            } else {
                0.0
            };
            if score > best.score {
                best = TemplateMatch { x, y, score };
            }
        }
    }
    Some(best)
}

/// Move one rectangle of the aligned image to where it best matches in
/// `first`.
///
/// The rectangle is clipped to the image. The returned image is a copy
/// of `aligned` with the rectangle filled white and the original content
/// pasted at the best match. The match is accepted whatever its score.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the images differ in
/// size, or [`PipelineError::EmptyRegion`] if the rectangle lies
/// outside the image.
pub fn relocate_part(
    first: &RgbImage,
    aligned: &RgbImage,
    rect: PartRectangle,
) -> Result<RgbImage, PipelineError> {
    crate::align::ensure_same_dimensions(first, aligned)?;
    let rect = rect
        .clip_to(Dimensions::of(aligned))
        .ok_or(PipelineError::EmptyRegion)?;

    let template = image::imageops::crop_imm(aligned, rect.x, rect.y, rect.w, rect.h).to_image();
    let found = match_template(&intensity(first), &intensity(&template))
        .ok_or(PipelineError::EmptyRegion)?;
    tracing::debug!(
        from_x = rect.x,
        from_y = rect.y,
        to_x = found.x,
        to_y = found.y,
        score = found.score,
        "relocated part"
    );

    let mut patched = aligned.clone();
    for y in rect.y..rect.y + rect.h {
        for x in rect.x..rect.x + rect.w {
            patched.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }
    image::imageops::replace(
        &mut patched,
        &template,
        i64::from(found.x),
        i64::from(found.y),
    );
    Ok(patched)
}

/// `n * sum(v^2) - sum(v)^2`, scaled back by `n`: the sum of squared
/// deviations from the mean. Exact in integers before the final divide.
#[allow(clippy::cast_precision_loss)]
fn centered_energy(n: u128, sum: u128, sum_sq: u128) -> f64 {
    let scaled = (n * sum_sq).saturating_sub(sum * sum);
    scaled as f64 / n as f64
}

/// Summed-area tables of intensity and squared intensity.
struct PrefixSums {
    stride: usize,
    sum: Vec<u128>,
    sum_sq: Vec<u128>,
}

impl PrefixSums {
    fn new(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let stride = width as usize + 1;
        let mut sum = vec![0_u128; stride * (height as usize + 1)];
        let mut sum_sq = sum.clone();
        for (y, row) in image.rows().enumerate() {
            let mut row_sum = 0_u128;
            let mut row_sq = 0_u128;
            for (x, p) in row.enumerate() {
                let v = u128::from(p.0[0]);
                row_sum += v;
                row_sq += v * v;
                let at = (y + 1) * stride + x + 1;
                sum[at] = sum[at - stride] + row_sum;
                sum_sq[at] = sum_sq[at - stride] + row_sq;
            }
        }
        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    /// `(sum, sum of squares)` over the `w x h` window at `(x, y)`.
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (u128, u128) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let s = self.stride;
        let area = |t: &[u128]| t[y1 * s + x1] + t[y0 * s + x0] - t[y0 * s + x1] - t[y1 * s + x0];
        (area(&self.sum), area(&self.sum_sq))
    }
}
