use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::ColorType;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::error::CaptureError;

pub const JPEG_MIME: &str = "image/jpeg";

/// Scale `width`×`height` so the longer edge is at most `max_edge`,
/// keeping the aspect ratio. Images that already fit are returned as-is.
/// A `max_edge` of 0 is treated as 1.
#[must_use]
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let max_edge = max_edge.max(1);
    let longer = width.max(height);
    if longer <= max_edge || longer == 0 {
        return (width, height);
    }
    let scale = |edge: u32| -> u32 {
        let scaled = (u64::from(edge) * u64::from(max_edge) + u64::from(longer) / 2) / u64::from(longer);
        (scaled as u32).max(1)
    };
    if width >= height {
        (max_edge, scale(height))
    } else {
        (scale(width), max_edge)
    }
}

/// Decode any supported image, shrink it to `max_edge` and re-encode it as a
/// JPEG data URI.
pub fn downsample_to_data_uri(bytes: &[u8], max_edge: u32, quality: u8) -> Result<String, CaptureError> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = fit_within(img.width(), img.height(), max_edge);
    let img = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::CatmullRom)
    };

    let rgb = img.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode(
        rgb.as_raw(),
        width,
        height,
        ColorType::Rgb8,
    )?;
    Ok(format!("data:{JPEG_MIME};base64,{}", STANDARD.encode(&jpeg)))
}

/// Split a `data:<mime>;base64,<payload>` URI into its MIME type and bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), CaptureError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| CaptureError::InvalidData("not a data URI".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| CaptureError::InvalidData("data URI has no payload".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| CaptureError::InvalidData("only base64 data URIs are supported".to_string()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| CaptureError::InvalidData(e.to_string()))?;
    Ok((mime.to_string(), bytes))
}

/// A flat-colour PNG of the given size.
#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 120, 40])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .unwrap();
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_within_landscape() {
        assert_eq!(fit_within(1200, 800, 600), (600, 400));
    }

    #[test]
    fn test_fit_within_portrait() {
        assert_eq!(fit_within(800, 1200, 600), (400, 600));
        assert_eq!(fit_within(3000, 4000, 800), (600, 800));
    }

    #[test]
    fn test_fit_within_square() {
        assert_eq!(fit_within(1000, 1000, 600), (600, 600));
    }

    #[test]
    fn test_fit_within_never_upscales() {
        assert_eq!(fit_within(400, 300, 600), (400, 300));
        assert_eq!(fit_within(600, 200, 600), (600, 200));
        assert_eq!(fit_within(0, 0, 600), (0, 0));
    }

    #[test]
    fn test_fit_within_keeps_thin_edge() {
        assert_eq!(fit_within(10_000, 1, 600), (600, 1));
    }

    #[test]
    fn test_fit_within_zero_edge() {
        assert_eq!(fit_within(800, 600, 0), (1, 1));
        assert_eq!(fit_within(10, 40, 0), (1, 1));
    }

    #[test]
    fn test_downsample_with_zero_edge() {
        let uri = downsample_to_data_uri(&png_bytes(40, 30), 0, 70).unwrap();
        let (_, bytes) = decode_data_uri(&uri).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (1, 1));
    }

    #[test]
    fn test_downsample_produces_jpeg_data_uri() {
        let uri = downsample_to_data_uri(&png_bytes(1200, 800), 600, 70).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));

        let (mime, bytes) = decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "image/jpeg");
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (600, 400));
    }

    #[test]
    fn test_downsample_small_image_keeps_size() {
        let uri = downsample_to_data_uri(&png_bytes(320, 240), 600, 70).unwrap();
        let (_, bytes) = decode_data_uri(&uri).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (320, 240));
    }

    #[test]
    fn test_downsample_rejects_non_image() {
        assert!(matches!(
            downsample_to_data_uri(b"definitely not an image", 600, 70),
            Err(CaptureError::Image(_))
        ));
    }

    #[test]
    fn test_decode_data_uri_invalid() {
        assert!(decode_data_uri("").is_err());
        assert!(decode_data_uri("http://example.com/a.jpg").is_err());
        assert!(decode_data_uri("data:image/png,raw").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_decode_data_uri_png() {
        let uri = format!("data:image/png;base64,{}", STANDARD.encode([1u8, 2, 3]));
        let (mime, bytes) = decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, [1, 2, 3]);
    }
}
