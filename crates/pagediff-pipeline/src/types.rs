//! Shared types for the pagediff comparison pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference masks and
/// intensity fields without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage`, the pixel layout every comparison runs on.
pub use image::RgbImage;

/// Re-export `RgbaImage`, the pixel layout of cropped regions.
pub use image::RgbaImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Round to the nearest integer pixel position.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn round(self) -> (i64, i64) {
        (self.x.round() as i64, self.y.round() as i64)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Translational offset between two images.
///
/// `dx`/`dy` is the displacement of the second image relative to the
/// first: content at `(x, y)` in the first image appears near
/// `(x + dx, y + dy)` in the second. [`correction`](Self::correction)
/// is the translation that undoes it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShiftVector {
    /// Horizontal displacement in pixels.
    pub dx: f64,
    /// Vertical displacement in pixels.
    pub dy: f64,
}

impl ShiftVector {
    /// Create a new shift vector.
    #[must_use]
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// The translation applied to the second image to align it onto the
    /// first: `(-dx, -dy)`.
    #[must_use]
    pub fn correction(self) -> Self {
        Self {
            dx: -self.dx,
            dy: -self.dy,
        }
    }
}

/// Axis-aligned rectangle in aligned-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartRectangle {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub w: u32,
    /// Height in pixels.
    pub h: u32,
}

impl PartRectangle {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Covered area in square pixels.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    /// Intersect with an image of the given dimensions.
    ///
    /// Returns `None` when nothing of the rectangle lies inside the image.
    #[must_use]
    pub fn clip_to(&self, dimensions: Dimensions) -> Option<Self> {
        let right = self.x.saturating_add(self.w).min(dimensions.width);
        let bottom = self.y.saturating_add(self.h).min(dimensions.height);
        if self.x >= right || self.y >= bottom {
            return None;
        }
        Some(Self {
            x: self.x,
            y: self.y,
            w: right - self.x,
            h: bottom - self.y,
        })
    }
}

/// Pixel positions where two images differ beyond the threshold, in
/// row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffPixelSet(Vec<(u32, u32)>);

impl DiffPixelSet {
    /// Wrap a list of `(x, y)` positions.
    #[must_use]
    pub const fn new(positions: Vec<(u32, u32)>) -> Self {
        Self(positions)
    }

    /// Returns `true` if no position differs.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of differing positions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all positions.
    #[must_use]
    pub fn positions(&self) -> &[(u32, u32)] {
        &self.0
    }
}

/// A polygon drawn by the user in one image's coordinate space.
///
/// Always holds at least one point; construction from an empty list
/// fails with [`PipelineError::EmptySelection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct PolygonSelection(Vec<Point>);

impl PolygonSelection {
    /// Create a selection from its vertices.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptySelection`] if `points` is empty.
    pub fn new(points: Vec<Point>) -> Result<Self, PipelineError> {
        if points.is_empty() {
            return Err(PipelineError::EmptySelection);
        }
        Ok(Self(points))
    }

    /// Returns a slice of all vertices.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Number of vertices (never zero).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<Point>> for PolygonSelection {
    type Error = PipelineError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<PolygonSelection> for Vec<Point> {
    fn from(selection: PolygonSelection) -> Self {
        selection.0
    }
}

/// A polygon-shaped region cut out of a source image.
///
/// `image` is sized to the polygon's bounding rectangle clipped to the
/// source; alpha is 255 inside the polygon and 0 outside. `origin` is
/// the top-left corner of that rectangle in source coordinates.
#[derive(Debug, Clone)]
pub struct CroppedRegion {
    /// The masked RGBA pixels.
    pub image: RgbaImage,
    /// Top-left corner of the clipped rectangle in the source image.
    pub origin: (u32, u32),
}

/// Configuration shared by every comparison call.
///
/// Passed explicitly into each entry point; there is no process-wide
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Per-pixel color-distance cutoff. A position is a difference when
    /// `|dR| + |dG| + |dB|` strictly exceeds this value.
    pub threshold: u32,

    /// Half-width of the rendered difference-highlight square.
    pub box_size: u32,

    /// Number of 3x3 dilation passes applied before part extraction.
    /// Higher values merge nearby ink into larger parts.
    pub dilation_iterations: u32,
}

impl CompareConfig {
    /// Default color-distance cutoff.
    pub const DEFAULT_THRESHOLD: u32 = 30;
    /// Default highlight half-width.
    pub const DEFAULT_BOX_SIZE: u32 = 5;
    /// Default dilation passes (no merging).
    pub const DEFAULT_DILATION_ITERATIONS: u32 = 0;
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            box_size: Self::DEFAULT_BOX_SIZE,
            dilation_iterations: Self::DEFAULT_DILATION_ITERATIONS,
        }
    }
}

/// Result of comparing two pages.
///
/// Does not derive serde traits; the export crate turns it into
/// encoded payloads.
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    /// The first image with a red square drawn around every difference.
    pub diff_image: RgbImage,
    /// The first image, unchanged.
    pub before: RgbImage,
    /// The second image after global alignment.
    pub after: RgbImage,
    /// Ink regions found in the aligned second image.
    pub parts: Vec<PartRectangle>,
    /// Estimated displacement of the second image.
    pub shift: ShiftVector,
    /// Number of positions flagged by the difference detector.
    pub diff_pixel_count: usize,
    /// 1-based page number for multi-page runs.
    pub page: Option<u32>,
}

impl ComparisonResult {
    /// Dimensions shared by all three images.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.before)
    }
}

/// Errors that can occur during comparison.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// Two images that must share a coordinate frame have different sizes.
    #[error("image dimensions differ: {left} vs {right}")]
    DimensionMismatch {
        /// Size of the first image.
        left: Dimensions,
        /// Size of the second image.
        right: Dimensions,
    },

    /// A page index past the end of a document.
    #[error("page index {index} out of range for document with {page_count} page(s)")]
    InvalidPageIndex {
        /// Requested 0-based index.
        index: usize,
        /// Number of pages in the document.
        page_count: usize,
    },

    /// A polygon selection with no points.
    #[error("selection polygon has no points")]
    EmptySelection,

    /// A rectangle or polygon that lies entirely outside the image.
    #[error("selected region lies outside the image")]
    EmptyRegion,

    /// Input bytes are not a valid raster image or document.
    #[error("failed to decode input: {0}")]
    DecodeFailure(String),

    /// The input bytes were empty.
    #[error("input data is empty")]
    EmptyInput,

    /// A document without pages.
    #[error("document has no pages")]
    EmptyDocument,
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        Self::DecodeFailure(err.to_string())
    }
}
