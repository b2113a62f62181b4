//! JSON-ready payloads with base64-embedded PNG images.
//!
//! Field names are what HTTP clients and `--json` consumers see, so they
//! stay stable even when the pipeline types change shape.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pagediff_pipeline::{ComparisonResult, CroppedRegion, PartRectangle, ShiftVector};
use serde::{Deserialize, Serialize};

use crate::ExportError;
use crate::png::{encode_png_rgb, encode_png_rgba};

/// One comparison, ready to serialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPayload {
    /// First image with difference highlights, base64 PNG.
    pub diff_image: String,
    /// First image, base64 PNG.
    pub before_image: String,
    /// Aligned second image, base64 PNG.
    pub after_image: String,
    /// Part rectangles in aligned coordinates.
    pub parts: Vec<PartRectangle>,
    /// Estimated displacement of the second image.
    pub shift: ShiftVector,
    /// Number of differing pixel positions.
    pub diff_pixel_count: usize,
    /// Width shared by all three images.
    pub width: u32,
    /// Height shared by all three images.
    pub height: u32,
    /// 1-based page number, for multi-page runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl ComparisonPayload {
    /// Encode a [`ComparisonResult`].
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Encode`] if any image fails to encode.
    pub fn from_result(result: &ComparisonResult) -> Result<Self, ExportError> {
        let dimensions = result.dimensions();
        Ok(Self {
            diff_image: STANDARD.encode(encode_png_rgb(&result.diff_image)?),
            before_image: STANDARD.encode(encode_png_rgb(&result.before)?),
            after_image: STANDARD.encode(encode_png_rgb(&result.after)?),
            parts: result.parts.clone(),
            shift: result.shift,
            diff_pixel_count: result.diff_pixel_count,
            width: dimensions.width,
            height: dimensions.height,
            page: result.page,
        })
    }
}

/// A cropped region, ready to serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRegion {
    /// Masked region, base64 RGBA PNG.
    pub image: String,
    /// Left edge of the region in its source image.
    pub x: u32,
    /// Top edge of the region in its source image.
    pub y: u32,
    /// Region width.
    pub width: u32,
    /// Region height.
    pub height: u32,
}

impl EncodedRegion {
    /// Encode a [`CroppedRegion`].
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Encode`] if the image fails to encode.
    pub fn from_region(region: &CroppedRegion) -> Result<Self, ExportError> {
        Ok(Self {
            image: STANDARD.encode(encode_png_rgba(&region.image)?),
            x: region.origin.0,
            y: region.origin.1,
            width: region.image.width(),
            height: region.image.height(),
        })
    }
}

/// The pair of regions produced by one crop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropPayload {
    /// Region cut from the first image.
    pub first: EncodedRegion,
    /// Region cut from the second image.
    pub second: EncodedRegion,
}

impl CropPayload {
    /// Encode both regions of a crop.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Encode`] if either image fails to encode.
    pub fn from_regions(first: &CroppedRegion, second: &CroppedRegion) -> Result<Self, ExportError> {
        Ok(Self {
            first: EncodedRegion::from_region(first)?,
            second: EncodedRegion::from_region(second)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pagediff_pipeline::{RgbImage, RgbaImage};

    fn decode_b64_png(encoded: &str) -> image::DynamicImage {
        let bytes = STANDARD.decode(encoded).unwrap();
        image::load_from_memory(&bytes).unwrap()
    }

    fn sample_result(page: Option<u32>) -> ComparisonResult {
        let before = RgbImage::from_pixel(6, 4, image::Rgb([255, 255, 255]));
        let mut diff_image = before.clone();
        diff_image.put_pixel(1, 1, image::Rgb([255, 0, 0]));
        ComparisonResult {
            diff_image,
            before: before.clone(),
            after: before,
            parts: vec![PartRectangle::new(1, 1, 2, 2)],
            shift: ShiftVector::new(0.5, -1.0),
            diff_pixel_count: 1,
            page,
        }
    }

    #[test]
    fn comparison_payload_embeds_decodable_images() {
        let result = sample_result(None);
        let payload = ComparisonPayload::from_result(&result).unwrap();
        assert_eq!((payload.width, payload.height), (6, 4));
        assert_eq!(decode_b64_png(&payload.diff_image).to_rgb8(), result.diff_image);
        assert_eq!(decode_b64_png(&payload.after_image).to_rgb8(), result.after);
        assert_eq!(payload.parts, result.parts);
    }

    #[test]
    fn page_is_omitted_when_unset() {
        let json = serde_json::to_value(ComparisonPayload::from_result(&sample_result(None)).unwrap())
            .unwrap();
        assert!(json.get("page").is_none());
        assert_eq!(json["diff_pixel_count"], 1);
        assert_eq!(json["shift"]["dx"], 0.5);
        assert_eq!(json["parts"][0]["w"], 2);
    }

    #[test]
    fn page_is_serialized_when_set() {
        let payload = ComparisonPayload::from_result(&sample_result(Some(3))).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["page"], 3);
        let back: ComparisonPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn crop_payload_keeps_origin_and_alpha() {
        let region = CroppedRegion {
            image: RgbaImage::from_fn(3, 2, |x, _| {
                image::Rgba([0, 0, 0, if x == 2 { 0 } else { 255 }])
            }),
            origin: (7, 9),
        };
        let payload = CropPayload::from_regions(&region, &region).unwrap();
        assert_eq!(
            (payload.first.x, payload.first.y, payload.first.width, payload.first.height),
            (7, 9, 3, 2)
        );
        let decoded = decode_b64_png(&payload.second.image).to_rgba8();
        assert_eq!(decoded.get_pixel(2, 0).0[3], 0);
        assert_eq!(decoded.get_pixel(0, 1).0[3], 255);
    }
}
