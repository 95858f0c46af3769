//! Image encoding for the two directions images travel.
//!
//! * Pages going **to** the model: lossless PNG wrapped in `ImageData`, so
//!   subscripts and thin strokes stay crisp.
//! * Crops going **to** the client: JPEG data URLs, which are a fraction of
//!   the PNG size and end up inline in a JSON response.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// JPEG quality used for cropped diagrams.
pub const CROP_JPEG_QUALITY: u8 = 85;

/// Encode a rasterised page as a base64 PNG ready for the VLM API.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Encode an image as `data:image/jpeg;base64,…`.
///
/// JPEG has no alpha channel, so the image is flattened to RGB first.
pub fn encode_jpeg_data_url(img: &DynamicImage) -> Result<String, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, CROP_JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;

    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&buf)))
}

/// Wrap raw image bytes (a `/solve` reference image) for the VLM API.
///
/// The MIME type is sniffed from the bytes; anything `image` cannot
/// recognise is rejected rather than sent to the provider.
pub fn image_data_from_bytes(bytes: &[u8]) -> Result<ImageData, image::ImageError> {
    let format = image::guess_format(bytes)?;
    let mime = format.to_mime_type();
    Ok(ImageData::new(STANDARD.encode(bytes), mime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn encode_small_image() {
        let data = encode_page(&red_square()).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[..4], b"\x89PNG");
    }

    #[test]
    fn jpeg_data_url_flattens_alpha() {
        let url = encode_jpeg_data_url(&red_square()).expect("jpeg encode");
        let payload = url
            .strip_prefix("data:image/jpeg;base64,")
            .expect("data URL prefix");
        let decoded = STANDARD.decode(payload).expect("valid base64");
        assert_eq!(&decoded[..2], &[0xFF, 0xD8], "JPEG SOI marker");
    }

    #[test]
    fn reference_image_mime_is_sniffed() {
        let mut png = Vec::new();
        red_square()
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let data = image_data_from_bytes(&png).expect("png is recognised");
        assert_eq!(data.mime_type, "image/png");
    }

    #[test]
    fn unknown_reference_bytes_are_rejected() {
        assert!(image_data_from_bytes(b"definitely not an image").is_err());
    }
}
