//! Part extraction: bounding rectangles of connected ink regions.
//!
//! The aligned page is binarized (dark pixels are ink), optionally grown
//! by square dilation so nearby strokes merge, and traced with
//! Suzuki-Abe border following via `imageproc::contours::find_contours`.
//! Only outer borders without a parent are kept, so holes and shapes
//! nested inside other shapes never produce their own part.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use crate::grayscale::intensity;
use crate::types::PartRectangle;

/// Intensity below which a pixel counts as ink.
pub const INK_CUTOFF: u8 = 240;

/// Contours enclosing this much area or less are treated as noise.
pub const MIN_PART_AREA: f64 = 50.0;

const INK: u8 = 255;
const BACKGROUND: u8 = 0;

/// Binary ink map: 255 where intensity is below [`INK_CUTOFF`], else 0.
#[must_use = "returns the binary ink map"]
pub fn binarize(image: &RgbImage) -> GrayImage {
    let mut gray = intensity(image);
    for p in gray.pixels_mut() {
        *p = Luma([if p.0[0] < INK_CUTOFF { INK } else { BACKGROUND }]);
    }
    gray
}

/// Apply `iterations` passes of 3x3 square dilation.
///
/// Repeated 3x3 passes equal one dilation by the L-infinity ball of the
/// same radius, which `imageproc` takes as a `u8`; larger counts run in
/// chunks. Passes beyond the longer image side change nothing and are
/// skipped.
#[must_use = "returns the dilated map"]
pub fn dilate_passes(ink: &GrayImage, iterations: u32) -> GrayImage {
    let mut out = ink.clone();
    let mut remaining = iterations.min(ink.width().max(ink.height()));
    while remaining > 0 {
        let step = u8::try_from(remaining).unwrap_or(u8::MAX);
        out = dilate(&out, Norm::LInf, step);
        remaining -= u32::from(step);
    }
    out
}

/// Extract part rectangles from the aligned second image.
///
/// Rectangles are returned in contour discovery order (raster scan of
/// each region's first border pixel).
#[must_use]
pub fn extract_parts(aligned: &RgbImage, dilation_iterations: u32) -> Vec<PartRectangle> {
    let ink = dilate_passes(&binarize(aligned), dilation_iterations);
    let contours: Vec<Contour<u32>> = find_contours(&ink);

    let parts: Vec<PartRectangle> = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| shoelace_area(c) > MIN_PART_AREA)
        .filter_map(bounding_rect)
        .collect();

    tracing::debug!(count = parts.len(), "extracted parts");
    parts
}

/// Polygon area enclosed by the contour's border pixels.
fn shoelace_area(contour: &Contour<u32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| {
            let (ax, ay) = (f64::from(a.x), f64::from(a.y));
            let (bx, by) = (f64::from(b.x), f64::from(b.y));
            ax.mul_add(by, -(bx * ay))
        })
        .sum();
    twice.abs() / 2.0
}

/// Inclusive bounding box of the contour's pixels.
fn bounding_rect(contour: &Contour<u32>) -> Option<PartRectangle> {
    let first = contour.points.first()?;
    let init = (first.x, first.y, first.x, first.y);
    let (min_x, min_y, max_x, max_y) = contour.points.iter().fold(init, |(x0, y0, x1, y1), p| {
        (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y))
    });
    Some(PartRectangle::new(
        min_x,
        min_y,
        max_x - min_x + 1,
        max_y - min_y + 1,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgb;

    fn page_with(rects: &[(u32, u32, u32, u32)], width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let inside = rects
                .iter()
                .any(|&(rx, ry, rw, rh)| (rx..rx + rw).contains(&x) && (ry..ry + rh).contains(&y));
            if inside {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn binarize_uses_strict_cutoff() {
        let img = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([239, 239, 239]),
            1 => Rgb([240, 240, 240]),
            _ => Rgb([0, 0, 0]),
        });
        let ink = binarize(&img);
        assert_eq!(ink.get_pixel(0, 0).0[0], INK);
        assert_eq!(ink.get_pixel(1, 0).0[0], BACKGROUND);
        assert_eq!(ink.get_pixel(2, 0).0[0], INK);
    }

    #[test]
    fn blank_page_has_no_parts() {
        let img = page_with(&[], 40, 40);
        assert!(extract_parts(&img, 0).is_empty());
        assert!(extract_parts(&img, 3).is_empty());
    }

    #[test]
    fn square_yields_its_bounding_rect() {
        let img = page_with(&[(20, 20, 10, 10)], 100, 100);
        assert_eq!(extract_parts(&img, 0), vec![PartRectangle::new(20, 20, 10, 10)]);
    }

    #[test]
    fn small_specks_are_filtered() {
        // 5x5 speck encloses 16 square pixels, well under the floor.
        let img = page_with(&[(10, 10, 5, 5), (40, 40, 12, 12)], 80, 80);
        assert_eq!(extract_parts(&img, 0), vec![PartRectangle::new(40, 40, 12, 12)]);
    }

    #[test]
    fn parts_follow_raster_order() {
        let img = page_with(&[(60, 5, 10, 10), (5, 40, 10, 10)], 80, 80);
        let parts = extract_parts(&img, 0);
        assert_eq!(
            parts,
            vec![
                PartRectangle::new(60, 5, 10, 10),
                PartRectangle::new(5, 40, 10, 10)
            ]
        );
    }

    #[test]
    fn nested_shape_is_not_a_separate_part() {
        // A hollow frame with a filled square inside its hole.
        let mut img = page_with(&[(10, 10, 40, 40)], 60, 60);
        for y in 14..46 {
            for x in 14..46 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        for y in 22..38 {
            for x in 22..38 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        assert_eq!(extract_parts(&img, 0), vec![PartRectangle::new(10, 10, 40, 40)]);
    }

    #[test]
    fn dilation_merges_nearby_parts() {
        let img = page_with(&[(10, 10, 10, 10), (22, 10, 10, 10)], 60, 40);
        assert_eq!(extract_parts(&img, 0).len(), 2);
        let merged = extract_parts(&img, 1);
        assert_eq!(merged, vec![PartRectangle::new(9, 9, 24, 12)]);
    }

    #[test]
    fn more_dilation_never_adds_parts_or_loses_area() {
        let img = page_with(
            &[(10, 10, 10, 10), (24, 10, 10, 10), (10, 40, 12, 8), (50, 50, 9, 9)],
            80,
            80,
        );
        let mut previous: Option<(usize, u64)> = None;
        for iterations in 0..5 {
            let parts = extract_parts(&img, iterations);
            let area: u64 = parts.iter().map(PartRectangle::area).sum();
            if let Some((count, total)) = previous {
                assert!(parts.len() <= count, "iterations = {iterations}");
                assert!(area >= total, "iterations = {iterations}");
            }
            previous = Some((parts.len(), area));
        }
    }

    #[test]
    fn dilation_passes_grow_by_one_pixel_each() {
        let mut ink = GrayImage::new(11, 11);
        ink.put_pixel(5, 5, Luma([INK]));
        let grown = dilate_passes(&ink, 2);
        assert_eq!(grown.get_pixel(3, 3).0[0], INK);
        assert_eq!(grown.get_pixel(7, 7).0[0], INK);
        assert_eq!(grown.get_pixel(2, 5).0[0], BACKGROUND);
        assert_eq!(dilate_passes(&ink, 0), ink);
    }

    #[test]
    fn oversized_dilation_runs_in_chunks() {
        let mut ink = GrayImage::new(300, 1);
        ink.put_pixel(0, 0, Luma([INK]));
        let grown = dilate_passes(&ink, 299);
        assert!(grown.pixels().all(|p| p.0[0] == INK));
        let short = dilate_passes(&ink, 256);
        assert_eq!(short.get_pixel(256, 0).0[0], INK);
        assert_eq!(short.get_pixel(257, 0).0[0], BACKGROUND);
    }

    #[test]
    fn dilation_count_is_capped_by_image_size() {
        let mut ink = GrayImage::new(6, 4);
        ink.put_pixel(1, 1, Luma([INK]));
        let grown = dilate_passes(&ink, u32::MAX);
        assert!(grown.pixels().all(|p| p.0[0] == INK));
        assert_eq!(grown, dilate_passes(&ink, 6));
    }
}
