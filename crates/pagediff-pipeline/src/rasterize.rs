//! Rasterization boundary: source bytes in, page rasters out.
//!
//! The comparison core never parses document formats itself. It
//! consumes a [`Rasterizer`], and ships only [`ImageRasterizer`], which
//! treats an encoded raster image (PNG, JPEG, BMP, WebP) as a one-page
//! document. Transports that accept real documents plug in their own
//! implementation.

use image::RgbImage;

use crate::types::PipelineError;

/// An ordered list of rasterized pages.
///
/// Never empty.
#[derive(Debug, Clone)]
pub struct Document {
    pages: Vec<RgbImage>,
}

impl Document {
    /// Build a document from already-rasterized pages.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyDocument`] if `pages` is empty.
    pub fn from_pages(pages: Vec<RgbImage>) -> Result<Self, PipelineError> {
        if pages.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }
        Ok(Self { pages })
    }

    /// Number of pages.
    #[must_use]
    pub const fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All pages in order.
    #[must_use]
    pub fn pages(&self) -> &[RgbImage] {
        &self.pages
    }

    /// The page at a 0-based index.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidPageIndex`] if `index` is past
    /// the last page.
    pub fn page(&self, index: usize) -> Result<&RgbImage, PipelineError> {
        self.pages
            .get(index)
            .ok_or(PipelineError::InvalidPageIndex {
                index,
                page_count: self.pages.len(),
            })
    }

    /// Consume the document, returning its pages.
    #[must_use]
    pub fn into_pages(self) -> Vec<RgbImage> {
        self.pages
    }
}

/// Turns source bytes into a [`Document`].
pub trait Rasterizer {
    /// Rasterize every page of the source.
    ///
    /// # Errors
    ///
    /// Implementations return [`PipelineError::EmptyInput`] for empty
    /// input and [`PipelineError::DecodeFailure`] for bytes they cannot
    /// interpret.
    fn rasterize(&self, bytes: &[u8]) -> Result<Document, PipelineError>;
}

/// Decodes a single encoded raster image as a one-page document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRasterizer;

impl Rasterizer for ImageRasterizer {
    fn rasterize(&self, bytes: &[u8]) -> Result<Document, PipelineError> {
        Document::from_pages(vec![decode_rgb(bytes)?])
    }
}

/// Decode raw image bytes into an RGB raster.
///
/// Alpha is discarded, matching what a page rasterizer produces.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::DecodeFailure`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Rasterize two sources concurrently and join the results.
///
/// The two decodes have no data dependency; the first runs on a scoped
/// thread while the second runs on the caller's thread. Either failure
/// fails the whole call.
///
/// # Errors
///
/// Propagates the first rasterizer error (checking the first source
/// before the second).
pub fn rasterize_pair<R>(
    rasterizer: &R,
    first: &[u8],
    second: &[u8],
) -> Result<(Document, Document), PipelineError>
where
    R: Rasterizer + Sync + ?Sized,
{
    let (first_doc, second_doc) = std::thread::scope(|scope| {
        let handle = scope.spawn(|| rasterizer.rasterize(first));
        let second_doc = rasterizer.rasterize(second);
        let first_doc = handle
            .join()
            .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
        (first_doc, second_doc)
    });
    Ok((first_doc?, second_doc?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode_rgb(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_return_decode_failure() {
        let result = decode_rgb(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::DecodeFailure(_))));
    }

    #[test]
    fn valid_png_decodes_to_rgb() {
        let img = RgbImage::from_fn(4, 3, |x, y| image::Rgb([x as u8 * 10, y as u8 * 20, 7]));
        let decoded = decode_rgb(&encode_png(&img)).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn image_rasterizer_yields_one_page() {
        let img = RgbImage::from_pixel(5, 5, image::Rgb([1, 2, 3]));
        let doc = ImageRasterizer.rasterize(&encode_png(&img)).unwrap();
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.page(0).unwrap(), &img);
    }

    #[test]
    fn page_past_end_is_invalid() {
        let doc = Document::from_pages(vec![RgbImage::new(1, 1)]).unwrap();
        let err = doc.page(1).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidPageIndex {
                index: 1,
                page_count: 1
            }
        ));
    }

    #[test]
    fn empty_document_is_rejected() {
        assert!(matches!(
            Document::from_pages(vec![]),
            Err(PipelineError::EmptyDocument)
        ));
    }

    #[test]
    fn rasterize_pair_decodes_both() {
        let a = RgbImage::from_pixel(3, 3, image::Rgb([0, 0, 0]));
        let b = RgbImage::from_pixel(6, 2, image::Rgb([255, 255, 255]));
        let (doc_a, doc_b) =
            rasterize_pair(&ImageRasterizer, &encode_png(&a), &encode_png(&b)).unwrap();
        assert_eq!(doc_a.page(0).unwrap(), &a);
        assert_eq!(doc_b.page(0).unwrap(), &b);
    }

    #[test]
    fn rasterize_pair_fails_if_either_fails() {
        let a = RgbImage::from_pixel(3, 3, image::Rgb([0, 0, 0]));
        let result = rasterize_pair(&ImageRasterizer, &encode_png(&a), &[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }
}
