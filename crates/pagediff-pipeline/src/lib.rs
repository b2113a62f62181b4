//! pagediff-pipeline: Pure page comparison pipeline (sans-IO).
//!
//! Compares two rasterized pages while tolerating small positional
//! drift:
//! align -> edge mask -> difference detection -> part extraction.
//!
//! Alternate entry points realign a single part by template matching
//! and crop polygon-shaped regions. This crate has **no I/O
//! dependencies**: it operates on in-memory rasters and returns
//! structured data. HTTP and filesystem handling live in
//! `pagediff-server` and `pagediff-cli`.

pub mod align;
pub mod crop;
pub mod diff;
pub mod fft;
pub mod grayscale;
pub mod mask;
pub mod parts;
pub mod pipeline;
pub mod rasterize;
pub mod realign;
pub mod types;

pub use pipeline::Pipeline;
pub use rasterize::{Document, ImageRasterizer, Rasterizer, decode_rgb, rasterize_pair};
pub use types::{
    CompareConfig, ComparisonResult, CroppedRegion, DiffPixelSet, Dimensions, GrayImage,
    PartRectangle, PipelineError, Point, PolygonSelection, RgbImage, RgbaImage, ShiftVector,
};

/// Compare `image2` against `image1`.
///
/// # Pipeline steps
///
/// 1. Estimate the shift of `image2` and translate it back
/// 2. Mask the border the translation dragged in
/// 3. Flag pixels whose color distance exceeds `config.threshold`
/// 4. Draw a red square around each flagged pixel on `image1`
/// 5. Extract part rectangles from the aligned `image2`
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the images differ in
/// size.
#[tracing::instrument(skip_all)]
pub fn compare(
    image1: &RgbImage,
    image2: &RgbImage,
    config: &CompareConfig,
) -> Result<ComparisonResult, PipelineError> {
    Ok(Pipeline::new(image1.clone(), image2.clone(), *config)
        .align()?
        .mask()
        .detect_differences()?
        .extract_parts()
        .into_result())
}

/// Compare two documents page by page.
///
/// Pages are paired by index up to the shorter document; extra pages
/// are ignored. Each result carries its 1-based page number. The first
/// failing page fails the whole call.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyDocument`] if either page list is
/// empty, or the first error from [`compare`].
#[tracing::instrument(skip_all, fields(pages1 = doc1.len(), pages2 = doc2.len()))]
pub fn compare_pages(
    doc1: &[RgbImage],
    doc2: &[RgbImage],
    config: &CompareConfig,
) -> Result<Vec<ComparisonResult>, PipelineError> {
    if doc1.is_empty() || doc2.is_empty() {
        return Err(PipelineError::EmptyDocument);
    }
    doc1.iter()
        .zip(doc2)
        .zip(1_u32..)
        .map(|((page1, page2), number)| {
            let mut result = compare(page1, page2, config)?;
            result.page = Some(number);
            Ok(result)
        })
        .collect()
}

/// Compare two images that may differ in size.
///
/// Both are padded to their common bounding size, centered on white,
/// before the normal comparison runs.
///
/// # Errors
///
/// Never fails on size; propagates any other error from [`compare`].
#[tracing::instrument(skip_all)]
pub fn compare_independent(
    image1: &RgbImage,
    image2: &RgbImage,
    config: &CompareConfig,
) -> Result<ComparisonResult, PipelineError> {
    let (padded1, padded2) = align::pad_to_common_size(image1, image2);
    compare(&padded1, &padded2, config)
}

/// Move one part of `image2` onto its best match in `image1`, then
/// compare.
///
/// `rectangle` is in aligned coordinates (as reported in
/// [`ComparisonResult::parts`]). The part is cut from the globally
/// aligned `image2`, located in `image1` by template matching, and
/// pasted there over a white fill of its old position.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the images differ in
/// size, or [`PipelineError::EmptyRegion`] if the rectangle lies
/// outside the image.
#[tracing::instrument(skip_all, fields(x = rectangle.x, y = rectangle.y, w = rectangle.w, h = rectangle.h))]
pub fn realign_part(
    image1: &RgbImage,
    image2: &RgbImage,
    rectangle: PartRectangle,
    config: &CompareConfig,
) -> Result<ComparisonResult, PipelineError> {
    let alignment = align::align(image1, image2)?;
    let patched = realign::relocate_part(image1, &alignment.aligned, rectangle)?;
    compare(image1, &patched, config)
}

/// Crop the same polygon out of both images.
///
/// With `same_frame`, `image2` is first aligned onto `image1` so the
/// polygon covers the same content in both. Without it, both images are
/// cropped as given.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `same_frame` is set
/// and the images differ in size, or [`PipelineError::EmptyRegion`] if
/// the polygon misses either image.
#[tracing::instrument(skip_all, fields(points = polygon.len(), same_frame))]
pub fn crop_by_selection(
    image1: &RgbImage,
    image2: &RgbImage,
    polygon: &PolygonSelection,
    same_frame: bool,
) -> Result<(CroppedRegion, CroppedRegion), PipelineError> {
    let first = crop::crop_polygon(image1, polygon)?;
    let second = if same_frame {
        let alignment = align::align(image1, image2)?;
        crop::crop_polygon(&alignment.aligned, polygon)?
    } else {
        crop::crop_polygon(image2, polygon)?
    };
    Ok((first, second))
}

/// Crop each image with its own polygon, without alignment.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyRegion`] if a polygon misses its image.
#[tracing::instrument(skip_all, fields(points1 = polygon1.len(), points2 = polygon2.len()))]
pub fn crop_by_independent_selections(
    image1: &RgbImage,
    image2: &RgbImage,
    polygon1: &PolygonSelection,
    polygon2: &PolygonSelection,
) -> Result<(CroppedRegion, CroppedRegion), PipelineError> {
    Ok((
        crop::crop_polygon(image1, polygon1)?,
        crop::crop_polygon(image2, polygon2)?,
    ))
}
