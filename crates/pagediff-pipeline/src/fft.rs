//! Two-dimensional FFT over row-major grids.
//!
//! Thin layer over `rustfft`: rows are transformed in place, then
//! columns via a transpose. Shared by phase correlation and template
//! matching, which both need circular cross-correlation of two fields
//! of the same size.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// Bins weaker than this fraction of the strongest bin are treated as
/// zero during phase normalization.
const NEGLIGIBLE_BIN_RATIO: f64 = 1e-12;

/// A complex-valued grid in row-major order.
#[derive(Debug, Clone)]
pub struct Spectrum {
    width: usize,
    height: usize,
    data: Vec<Complex<f64>>,
}

impl Spectrum {
    /// Forward transform of a real field.
    ///
    /// `field.len()` must equal `width * height`; shorter fields are
    /// zero-padded at the end and longer ones truncated.
    #[must_use]
    pub fn forward(field: &[f64], width: usize, height: usize) -> Self {
        let len = width * height;
        let mut data: Vec<Complex<f64>> = field
            .iter()
            .take(len)
            .map(|&v| Complex::new(v, 0.0))
            .collect();
        data.resize(len, Complex::new(0.0, 0.0));
        transform_2d(&mut data, width, height, false);
        Self {
            width,
            height,
            data,
        }
    }

    /// Forward transform of a `sub_width x sub_height` field placed at
    /// the origin of a zero-filled `width x height` grid.
    #[must_use]
    pub fn forward_padded(
        field: &[f64],
        sub_width: usize,
        sub_height: usize,
        width: usize,
        height: usize,
    ) -> Self {
        let mut grid = vec![0.0; width * height];
        if sub_width == 0 || sub_width > width {
            return Self::forward(&grid, width, height);
        }
        for (row, chunk) in field.chunks_exact(sub_width).take(sub_height).enumerate() {
            let start = row * width;
            grid[start..start + sub_width].copy_from_slice(chunk);
        }
        Self::forward(&grid, width, height)
    }

    /// Circular cross-correlation of `self` (the field being searched)
    /// with `other` (the pattern): entry `(x, y)` of the result is
    /// `sum over (u, v) of pattern(u, v) * field(x + u, y + v)`.
    ///
    /// When `normalize` is set, each frequency bin is divided by its
    /// magnitude first (phase correlation). Bins whose magnitude is
    /// negligible next to the strongest bin carry only rounding noise and
    /// are dropped.
    #[must_use]
    pub fn correlate(&self, other: &Self, normalize: bool) -> Vec<f64> {
        let mut product: Vec<Complex<f64>> = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(f, g)| f * g.conj())
            .collect();
        if normalize {
            let peak = product.iter().map(|c| c.norm()).fold(0.0, f64::max);
            let floor = (peak * NEGLIGIBLE_BIN_RATIO).max(f64::MIN_POSITIVE);
            for c in &mut product {
                let magnitude = c.norm();
                *c = if magnitude > floor {
                    *c / magnitude
                } else {
                    Complex::new(0.0, 0.0)
                };
            }
        }
        transform_2d(&mut product, self.width, self.height, true);
        #[allow(clippy::cast_precision_loss)]
        let scale = 1.0 / (self.width * self.height) as f64;
        product.iter().map(|c| c.re * scale).collect()
    }
}

/// In-place unnormalized 2D transform.
fn transform_2d(data: &mut [Complex<f64>], width: usize, height: usize, inverse: bool) {
    if width == 0 || height == 0 {
        return;
    }
    let mut planner = FftPlanner::<f64>::new();
    let (row_fft, col_fft) = if inverse {
        (
            planner.plan_fft_inverse(width),
            planner.plan_fft_inverse(height),
        )
    } else {
        (
            planner.plan_fft_forward(width),
            planner.plan_fft_forward(height),
        )
    };

    // Rows: the buffer is a whole number of rows, processed back to back.
    row_fft.process(data);

    // Columns: transpose, transform as rows, transpose back.
    let mut transposed = transpose(data, width, height);
    col_fft.process(&mut transposed);
    let restored = transpose(&transposed, height, width);
    data.copy_from_slice(&restored);
}

/// Transpose a `width x height` row-major grid.
fn transpose(data: &[Complex<f64>], width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    for y in 0..height {
        for x in 0..width {
            out[x * height + y] = data[y * width + x];
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn argmax(values: &[f64]) -> usize {
        values
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0
    }

    #[test]
    fn correlation_of_field_with_itself_peaks_at_origin() {
        let field: Vec<f64> = (0..48).map(|i| f64::from(i * 7 % 11)).collect();
        let spectrum = Spectrum::forward(&field, 8, 6);
        let corr = spectrum.correlate(&spectrum, false);
        assert_eq!(argmax(&corr), 0);
        let energy: f64 = field.iter().map(|v| v * v).sum();
        assert!((corr[0] - energy).abs() < 1e-6);
    }

    #[test]
    fn correlation_finds_circular_shift() {
        let width = 8;
        let height = 4;
        let field: Vec<f64> = (0..32).map(|i| f64::from((i * i * 7 + i * 3 + 1) % 17)).collect();
        // shifted(x, y) = field(x - 3, y - 1)
        let mut shifted = vec![0.0; 32];
        for y in 0..height {
            for x in 0..width {
                let sx = (x + width - 3) % width;
                let sy = (y + height - 1) % height;
                shifted[y * width + x] = field[sy * width + sx];
            }
        }
        let a = Spectrum::forward(&field, width, height);
        let b = Spectrum::forward(&shifted, width, height);
        let corr = b.correlate(&a, true);
        assert_eq!(argmax(&corr), width + 3);
    }

    #[test]
    fn padded_pattern_sums_window() {
        // Pattern of ones over a 2x2 window sums the field window.
        let field: Vec<f64> = (0..16_i32).map(f64::from).collect();
        let spectrum = Spectrum::forward(&field, 4, 4);
        let pattern = Spectrum::forward_padded(&[1.0; 4], 2, 2, 4, 4);
        let corr = spectrum.correlate(&pattern, false);
        // Window at (1, 1): 5 + 6 + 9 + 10.
        assert!((corr[4 + 1] - 30.0).abs() < 1e-9);
    }
}
