use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use crate::canvas::EncodedImage;
use crate::model::PhotoPayload;
use crate::types::Size;

/// Raster resolution budget for embedded photos: six source pixels per
/// placed millimeter. A cell is placed in mm on the page; anything sharper
/// only bloats the file.
const PX_PER_MM: f32 = 6.0;

const JPEG_QUALITY: u8 = 85;

/// Decodes an uploaded photo payload and prepares it for embedding: decode,
/// force RGB8, downsample to the cell's resolution budget, re-encode as
/// baseline JPEG. Returns `None` on any decode failure; a bad upload must
/// never abort the certificate.
pub fn normalize_photo(payload: &PhotoPayload, cell: Size) -> Option<EncodedImage> {
    let bytes = match decode_payload(payload) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("photo payload base64 decode failed, slot left empty: {err}");
            return None;
        }
    };
    normalize_bytes(&bytes, cell)
}

/// Same pipeline for rasters already held as raw bytes (logos, stamps).
pub fn normalize_bytes(bytes: &[u8], cell: Size) -> Option<EncodedImage> {
    let decoded = match image::load_from_memory(bytes) {
        Ok(decoded) => decoded,
        Err(err) => {
            log::warn!("image decode failed, slot left empty: {err}");
            return None;
        }
    };
    let max_w = (cell.width.to_mm_f32() * PX_PER_MM).max(1.0) as u32;
    let max_h = (cell.height.to_mm_f32() * PX_PER_MM).max(1.0) as u32;
    let decoded = if decoded.width() > max_w || decoded.height() > max_h {
        decoded.resize(max_w, max_h, FilterType::Lanczos3)
    } else {
        decoded
    };
    encode_rgb(decoded.into_rgb8())
}

/// JPEG-encodes an RGB raster for the PDF serializer's DCTDecode path.
pub fn encode_rgb(image: RgbImage) -> Option<EncodedImage> {
    let (width, height) = image.dimensions();
    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    match DynamicImage::ImageRgb8(image).write_with_encoder(encoder) {
        Ok(()) => Some(EncodedImage {
            width,
            height,
            jpeg,
        }),
        Err(err) => {
            log::warn!("jpeg encode failed, slot left empty: {err}");
            None
        }
    }
}

fn decode_payload(payload: &PhotoPayload) -> Result<Vec<u8>, base64::DecodeError> {
    match payload {
        PhotoPayload::Binary(bytes) => Ok(bytes.clone()),
        PhotoPayload::Base64(text) => {
            // Browsers hand over data URIs; the persisted form strips to the
            // payload after the comma.
            let text = match text.split_once(',') {
                Some((prefix, rest)) if prefix.starts_with("data:") => rest,
                _ => text.as_str(),
            };
            let cleaned: String = text.chars().filter(|ch| !ch.is_whitespace()).collect();
            BASE64.decode(cleaned.as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::mm;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
        let mut out = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    fn cell() -> Size {
        Size {
            width: mm(55.0),
            height: mm(45.0),
        }
    }

    #[test]
    fn binary_payload_round_trips_to_jpeg() {
        let payload = PhotoPayload::Binary(png_bytes(32, 24));
        let encoded = normalize_photo(&payload, cell()).expect("normalized");
        assert_eq!((encoded.width, encoded.height), (32, 24));
        assert_eq!(&encoded.jpeg[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn base64_payload_with_data_uri_prefix_decodes() {
        let raw = BASE64.encode(png_bytes(16, 16));
        let payload = PhotoPayload::Base64(format!("data:image/png;base64,{raw}"));
        assert!(normalize_photo(&payload, cell()).is_some());
    }

    #[test]
    fn oversized_raster_is_downsampled_within_budget() {
        let payload = PhotoPayload::Binary(png_bytes(2000, 1500));
        let encoded = normalize_photo(&payload, cell()).expect("normalized");
        let max_w = (55.0 * PX_PER_MM) as u32;
        let max_h = (45.0 * PX_PER_MM) as u32;
        assert!(encoded.width <= max_w);
        assert!(encoded.height <= max_h);
        // Aspect is preserved by fit-within resize.
        let ratio = encoded.width as f32 / encoded.height as f32;
        assert!((ratio - 2000.0 / 1500.0).abs() < 0.05);
    }

    #[test]
    fn garbage_payloads_degrade_to_none() {
        assert!(normalize_photo(&PhotoPayload::Binary(vec![0, 1, 2, 3]), cell()).is_none());
        assert!(
            normalize_photo(&PhotoPayload::Base64("!!not-base64!!".to_string()), cell()).is_none()
        );
    }
}
