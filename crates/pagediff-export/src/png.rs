//! PNG encoding of result rasters.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use pagediff_pipeline::{RgbImage, RgbaImage};

use crate::ExportError;

/// Encode an RGB image as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails.
pub fn encode_png_rgb(image: &RgbImage) -> Result<Vec<u8>, ExportError> {
    encode(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)
}

/// Encode an RGBA image as PNG bytes, keeping the alpha channel.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails.
pub fn encode_png_rgba(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    encode(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgba8)
}

fn encode(
    raw: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(raw, width, height, color)?;
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn rgb_png_decodes_back_to_same_pixels() {
        let img = RgbImage::from_fn(7, 3, |x, y| image::Rgb([x as u8 * 30, y as u8 * 80, 5]));
        let bytes = encode_png_rgb(&img).unwrap();
        assert_eq!(bytes[..8], PNG_SIGNATURE);
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn rgba_png_keeps_alpha() {
        let img = RgbaImage::from_fn(2, 2, |x, _| {
            image::Rgba([10, 20, 30, if x == 0 { 0 } else { 255 }])
        });
        let bytes = encode_png_rgba(&img).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.to_rgba8(), img);
    }
}
