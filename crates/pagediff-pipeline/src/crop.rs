//! Polygon-masked region cropping.
//!
//! One cropper serves every selection mode: the caller decides which
//! image and which polygon, this module cuts the polygon's bounding
//! rectangle out and makes everything outside the polygon transparent.

use image::{GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point as PixelPoint;

use crate::types::{CroppedRegion, PipelineError, PolygonSelection};

const OPAQUE: u8 = 255;
const TRANSPARENT: u8 = 0;

/// Smallest half-width of the frame polygons are clipped to before
/// filling. Keeps every coordinate exact in `f32` and every edge delta
/// within `i32`.
const MIN_FRAME: i64 = 1 << 20;

/// Crop `image` to `polygon`.
///
/// Vertices are rounded to pixel positions. The output is sized to their
/// bounding rectangle intersected with the image; alpha is 255 on and
/// inside the polygon outline and 0 elsewhere.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyRegion`] if the bounding rectangle does
/// not overlap the image.
pub fn crop_polygon(
    image: &RgbImage,
    polygon: &PolygonSelection,
) -> Result<CroppedRegion, PipelineError> {
    let vertices: Vec<(i64, i64)> = polygon.points().iter().map(|p| p.round()).collect();
    let (x0, y0, width, height) = clipped_bounds(&vertices, image.width(), image.height())
        .ok_or(PipelineError::EmptyRegion)?;

    let local: Vec<(i64, i64)> = vertices
        .iter()
        .map(|&(x, y)| (x - i64::from(x0), y - i64::from(y0)))
        .collect();
    let mask = polygon_mask(&local, width, height);

    let source = image::imageops::crop_imm(image, x0, y0, width, height).to_image();
    let region = RgbaImage::from_fn(width, height, |x, y| {
        let [r, g, b] = source.get_pixel(x, y).0;
        Rgba([r, g, b, mask.get_pixel(x, y).0[0]])
    });

    Ok(CroppedRegion {
        image: region,
        origin: (x0, y0),
    })
}

/// Rasterize a filled polygon, boundary included, into a
/// `width x height` mask.
///
/// One vertex marks a single pixel and two mark a line segment. Repeated
/// consecutive vertices are collapsed first.
#[must_use = "returns the polygon mask"]
pub fn polygon_mask(vertices: &[(i64, i64)], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::from_pixel(width, height, Luma([TRANSPARENT]));
    let frame = MIN_FRAME.max(i64::from(width.max(height)) + 2);
    let mut points: Vec<PixelPoint<i32>> = clip_to_frame(vertices, frame)
        .into_iter()
        .map(|(x, y)| PixelPoint::new(saturate(x), saturate(y)))
        .collect();
    points.dedup();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }

    match points.as_slice() {
        [] => {}
        [only] => {
            if let (Ok(x), Ok(y)) = (u32::try_from(only.x), u32::try_from(only.y))
                && x < width
                && y < height
            {
                mask.put_pixel(x, y, Luma([OPAQUE]));
            }
        }
        [a, b] => draw_line_segment_mut(&mut mask, as_f32(*a), as_f32(*b), Luma([OPAQUE])),
        _ => draw_polygon_mut(&mut mask, &points, Luma([OPAQUE])),
    }
    mask
}

/// Bounding rectangle of the vertices (inclusive of the extreme pixels)
/// intersected with a `width x height` image, as `(x, y, w, h)`.
fn clipped_bounds(
    vertices: &[(i64, i64)],
    width: u32,
    height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let &(fx, fy) = vertices.first()?;
    let (min_x, min_y, max_x, max_y) = vertices
        .iter()
        .fold((fx, fy, fx, fy), |(x0, y0, x1, y1), &(x, y)| {
            (x0.min(x), y0.min(y), x1.max(x), y1.max(y))
        });

    let left = min_x.max(0);
    let top = min_y.max(0);
    let right = max_x.saturating_add(1).min(i64::from(width));
    let bottom = max_y.saturating_add(1).min(i64::from(height));
    if left >= right || top >= bottom {
        return None;
    }
    Some((
        u32::try_from(left).ok()?,
        u32::try_from(top).ok()?,
        u32::try_from(right - left).ok()?,
        u32::try_from(bottom - top).ok()?,
    ))
}

/// Clip a closed polygon to the square `[-frame, frame]` on both axes
/// (Sutherland-Hodgman). Polygons already inside come back unchanged.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn clip_to_frame(vertices: &[(i64, i64)], frame: i64) -> Vec<(i64, i64)> {
    let bound = frame as f64;
    let mut points: Vec<(f64, f64)> = vertices
        .iter()
        .map(|&(x, y)| (x as f64, y as f64))
        .collect();
    for (axis, limit) in [(0, -bound), (0, bound), (1, -bound), (1, bound)] {
        points = clip_half_plane(&points, axis, limit);
    }
    points
        .into_iter()
        .map(|(x, y)| (x.round() as i64, y.round() as i64))
        .collect()
}

/// Keep the side of `coordinate[axis] = limit` facing the origin.
fn clip_half_plane(points: &[(f64, f64)], axis: usize, limit: f64) -> Vec<(f64, f64)> {
    let coord = |p: (f64, f64)| if axis == 0 { p.0 } else { p.1 };
    let inside = |p: (f64, f64)| {
        if limit < 0.0 {
            coord(p) >= limit
        } else {
            coord(p) <= limit
        }
    };
    let crossing = |a: (f64, f64), b: (f64, f64)| {
        let t = (limit - coord(a)) / (coord(b) - coord(a));
        let point = (a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1));
        // Pin the clipped coordinate exactly onto the frame.
        if axis == 0 { (limit, point.1) } else { (point.0, limit) }
    };

    let mut clipped = Vec::with_capacity(points.len() + 2);
    let Some(&last) = points.last() else {
        return clipped;
    };
    let mut previous = last;
    for &current in points {
        match (inside(previous), inside(current)) {
            (true, true) => clipped.push(current),
            (true, false) => clipped.push(crossing(previous, current)),
            (false, true) => {
                clipped.push(crossing(previous, current));
                clipped.push(current);
            }
            (false, false) => {}
        }
        previous = current;
    }
    clipped
}

fn saturate(v: i64) -> i32 {
    i32::try_from(v).unwrap_or(if v < 0 { i32::MIN } else { i32::MAX })
}

#[allow(clippy::cast_precision_loss)]
fn as_f32(p: PixelPoint<i32>) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}
