//! Incremental comparison: advance stage by stage, inspecting each
//! intermediate before continuing.
//!
//! [`crate::compare`] runs every stage in one call. [`Pipeline`] lets
//! the caller drive it one step at a time:
//!
//! ```rust
//! # use pagediff_pipeline::{CompareConfig, Pipeline, PipelineError, RgbImage};
//! # fn run(first: RgbImage, second: RgbImage) -> Result<(), PipelineError> {
//! let result = Pipeline::new(first, second, CompareConfig::default())
//!     .align()?
//!     .mask()
//!     .detect_differences()?
//!     .extract_parts()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, so
//! stages cannot be skipped or reordered.

use crate::types::{
    CompareConfig, ComparisonResult, DiffPixelSet, Dimensions, GrayImage, PartRectangle,
    PipelineError, RgbImage, ShiftVector,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Both images and the config, untouched.
///
/// Call [`align`](Self::align) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .align() to continue"]
pub struct Pending {
    config: CompareConfig,
    first: RgbImage,
    second: RgbImage,
}

impl Pending {
    /// The reference image.
    #[must_use]
    pub const fn first(&self) -> &RgbImage {
        &self.first
    }

    /// The image being aligned onto the reference.
    #[must_use]
    pub const fn second(&self) -> &RgbImage {
        &self.second
    }

    /// Estimate the shift and translate the second image onto the first.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the images differ
    /// in size.
    pub fn align(self) -> Result<Aligned, PipelineError> {
        let alignment = crate::align::align(&self.first, &self.second)?;
        Ok(Aligned {
            config: self.config,
            first: self.first,
            aligned: alignment.aligned,
            shift: alignment.shift,
        })
    }
}

// ───────────────────────── Stage 1: Aligned ──────────────────────────

/// The second image has been translated onto the first.
///
/// Call [`mask`](Self::mask) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .mask() to continue"]
pub struct Aligned {
    config: CompareConfig,
    first: RgbImage,
    aligned: RgbImage,
    shift: ShiftVector,
}

impl Aligned {
    /// The aligned second image.
    #[must_use]
    pub const fn aligned(&self) -> &RgbImage {
        &self.aligned
    }

    /// The estimated displacement of the second image.
    #[must_use]
    pub const fn shift(&self) -> ShiftVector {
        self.shift
    }

    /// Build the edge mask for the applied correction.
    pub fn mask(self) -> Masked {
        let mask = crate::mask::edge_mask(Dimensions::of(&self.first), self.shift.correction());
        Masked {
            config: self.config,
            first: self.first,
            aligned: self.aligned,
            shift: self.shift,
            mask,
        }
    }
}

// ───────────────────────── Stage 2: Masked ───────────────────────────

/// The translation border has been excluded.
///
/// Call [`detect_differences`](Self::detect_differences) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .detect_differences() to continue"]
pub struct Masked {
    config: CompareConfig,
    first: RgbImage,
    aligned: RgbImage,
    shift: ShiftVector,
    mask: GrayImage,
}

impl Masked {
    /// The edge mask (0 excluded, 255 compared).
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Flag differing pixels and render the highlight image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the aligned image
    /// and the first image disagree in size (not reachable through
    /// [`Pending::align`]).
    pub fn detect_differences(self) -> Result<Diffed, PipelineError> {
        let diffs = crate::diff::detect_differences(
            &self.first,
            &self.aligned,
            &self.mask,
            self.config.threshold,
        )?;
        tracing::debug!(count = diffs.len(), "detected differing pixels");
        let diff_image = crate::diff::render_highlights(&self.first, &diffs, self.config.box_size);
        Ok(Diffed {
            config: self.config,
            first: self.first,
            aligned: self.aligned,
            shift: self.shift,
            diffs,
            diff_image,
        })
    }
}

// ───────────────────────── Stage 3: Diffed ───────────────────────────

/// Differences are known and drawn.
///
/// Call [`extract_parts`](Self::extract_parts) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .extract_parts() to continue"]
pub struct Diffed {
    config: CompareConfig,
    first: RgbImage,
    aligned: RgbImage,
    shift: ShiftVector,
    diffs: DiffPixelSet,
    diff_image: RgbImage,
}

impl Diffed {
    /// Positions flagged as different.
    #[must_use]
    pub const fn diffs(&self) -> &DiffPixelSet {
        &self.diffs
    }

    /// The first image with highlight squares.
    #[must_use]
    pub const fn diff_image(&self) -> &RgbImage {
        &self.diff_image
    }

    /// Extract part rectangles from the aligned image.
    pub fn extract_parts(self) -> Finished {
        let parts = crate::parts::extract_parts(&self.aligned, self.config.dilation_iterations);
        Finished {
            first: self.first,
            aligned: self.aligned,
            shift: self.shift,
            diff_pixel_count: self.diffs.len(),
            diff_image: self.diff_image,
            parts,
        }
    }
}

// ───────────────────────── Stage 4: Finished ─────────────────────────

/// Every stage has run.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`ComparisonResult`].
#[must_use = "call .into_result() to extract the ComparisonResult"]
pub struct Finished {
    first: RgbImage,
    aligned: RgbImage,
    shift: ShiftVector,
    diff_pixel_count: usize,
    diff_image: RgbImage,
    parts: Vec<PartRectangle>,
}

impl Finished {
    /// Part rectangles in discovery order.
    #[must_use]
    pub fn parts(&self) -> &[PartRectangle] {
        &self.parts
    }

    /// Consume the pipeline and return the [`ComparisonResult`].
    ///
    /// The page number is left unset; multi-page callers fill it in.
    #[must_use]
    pub fn into_result(self) -> ComparisonResult {
        ComparisonResult {
            diff_image: self.diff_image,
            before: self.first,
            after: self.aligned,
            parts: self.parts,
            shift: self.shift,
            diff_pixel_count: self.diff_pixel_count,
            page: None,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental comparison pipeline.
///
/// Created via [`Pipeline::new`], which stores both images and the
/// config without doing any work.
pub struct Pipeline;

impl Pipeline {
    /// Start a comparison of `second` against `first`.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(first: RgbImage, second: RgbImage, config: CompareConfig) -> Pending {
        Pending {
            config,
            first,
            second,
        }
    }
}
