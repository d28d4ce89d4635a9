//! Image loading and encoding utilities.
//!
//! Supports loading images from files and base64 or percent-encoded data
//! URIs, and encoding to the formats the raster engine exports.

use std::io::Cursor;

use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageEncoder};

use crate::error::{ImageError, ImageResult};

/// Formats the raster engine can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// Windows bitmap.
    Bmp,
    /// Unknown/other format.
    Unknown,
}

impl RasterFormat {
    /// Detect format from a MIME type or a bare format name (`png`, `jpeg`).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        match name.strip_prefix("image/").unwrap_or(&name) {
            "png" => Self::Png,
            "jpeg" | "jpg" => Self::Jpeg,
            "bmp" => Self::Bmp,
            _ => Self::Unknown,
        }
    }

    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        // BMP: "BM"
        if data.len() >= 14 && data.starts_with(b"BM") {
            return Self::Bmp;
        }

        Self::Unknown
    }

    /// MIME type of the format.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Bmp => "image/bmp",
            Self::Unknown => "application/octet-stream",
        }
    }
}

/// Decode the payload of a data URI.
///
/// Supports formats like: `data:image/png;base64,iVBORw0KGgo...`
///
/// # Errors
///
/// Returns an error if the URI is malformed or its payload cannot be decoded.
pub fn decode_data_uri(uri: &str) -> ImageResult<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ImageError::DataUri("missing data: prefix".to_string()))?;
    let (metadata, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageError::DataUri("missing comma".to_string()))?;

    if metadata.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ImageError::DataUri(format!("bad base64 payload: {e}")))
    } else {
        percent_decode(payload)
    }
}

fn percent_decode(input: &str) -> ImageResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = input
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| ImageError::DataUri("invalid percent encoding".to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }
    Ok(result)
}

/// Decode an image from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not a supported image.
pub fn decode_bytes(data: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory(data).map_err(|e| ImageError::Decode(e.to_string()))
}

/// Load an image from a data URI or a filesystem path.
///
/// # Errors
///
/// Returns an error for remote URLs, unreadable files, or undecodable data.
pub fn load_source(src: &str) -> ImageResult<DynamicImage> {
    let src = src.trim();
    if src.starts_with("data:") {
        return decode_bytes(&decode_data_uri(src)?);
    }
    if src.starts_with("http://") || src.starts_with("https://") {
        return Err(ImageError::Unsupported(format!(
            "remote sources must be fetched by the caller: {src}"
        )));
    }
    let path = src.strip_prefix("file://").unwrap_or(src);
    let bytes = std::fs::read(path)?;
    decode_bytes(&bytes)
}

/// Shrink an image to fit within max dimensions, preserving aspect ratio.
///
/// Images that already fit are returned unchanged.
#[must_use]
pub fn fit_within(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if max_width == 0 || max_height == 0 {
        return img;
    }
    if img.width() <= max_width && img.height() <= max_height {
        return img;
    }
    img.resize(max_width, max_height, image::imageops::FilterType::Lanczos3)
}

/// Encode an image. `quality` (0-100) applies to JPEG only.
///
/// # Errors
///
/// Returns an error for [`RasterFormat::Unknown`] or encoder failures.
pub fn encode(img: &DynamicImage, format: RasterFormat, quality: u8) -> ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        RasterFormat::Png => img
            .write_to(&mut buf, image::ImageFormat::Png)
            .map_err(|e| ImageError::Encode(format!("PNG encoding failed: {e}")))?,
        RasterFormat::Bmp => img
            .write_to(&mut buf, image::ImageFormat::Bmp)
            .map_err(|e| ImageError::Encode(format!("BMP encoding failed: {e}")))?,
        RasterFormat::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
                .write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ColorType::Rgb8.into(),
                )
                .map_err(|e| ImageError::Encode(format!("JPEG encoding failed: {e}")))?;
        }
        RasterFormat::Unknown => {
            return Err(ImageError::Unsupported("unknown export format".to_string()))
        }
    }
    Ok(buf.into_inner())
}

/// Parse a `#rrggbb` or `#rrggbbaa` color.
#[must_use]
pub fn parse_hex_color(color: &str) -> Option<image::Rgba<u8>> {
    let hex = color.trim().strip_prefix('#')?;
    let channel = |i: usize| hex.get(i..i + 2).and_then(|c| u8::from_str_radix(c, 16).ok());
    match hex.len() {
        6 => Some(image::Rgba([channel(0)?, channel(2)?, channel(4)?, 255])),
        8 => Some(image::Rgba([channel(0)?, channel(2)?, channel(4)?, channel(6)?])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 red pixel
    const PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    #[test]
    fn test_format_from_name() {
        assert_eq!(RasterFormat::from_name("image/png"), RasterFormat::Png);
        assert_eq!(RasterFormat::from_name("PNG"), RasterFormat::Png);
        assert_eq!(RasterFormat::from_name("image/jpg"), RasterFormat::Jpeg);
        assert_eq!(RasterFormat::from_name("jpeg"), RasterFormat::Jpeg);
        assert_eq!(RasterFormat::from_name("image/bmp"), RasterFormat::Bmp);
        assert_eq!(RasterFormat::from_name("image/webp"), RasterFormat::Unknown);
    }

    #[test]
    fn test_format_detection_from_magic_bytes() {
        assert_eq!(
            RasterFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            RasterFormat::Png
        );
        assert_eq!(
            RasterFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            RasterFormat::Jpeg
        );
        assert_eq!(RasterFormat::from_magic_bytes(b"GIF8"), RasterFormat::Unknown);
    }

    #[test]
    fn test_data_uri_parsing() {
        let data_uri = format!("data:image/png;base64,{PNG_BASE64}");
        let img = load_source(&data_uri).expect("valid data URI");
        assert_eq!((img.width(), img.height()), (1, 1));
    }

    #[test]
    fn test_invalid_data_uri() {
        assert!(matches!(
            decode_data_uri("not a data uri"),
            Err(ImageError::DataUri(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png"),
            Err(ImageError::DataUri(_))
        ));
        assert!(matches!(
            decode_data_uri("data:text/plain,%zz"),
            Err(ImageError::DataUri(_))
        ));
    }

    #[test]
    fn test_percent_encoded_payload() {
        let bytes = decode_data_uri("data:text/plain,a%20b").expect("decodes");
        assert_eq!(bytes, b"a b");
    }

    #[test]
    fn test_remote_sources_are_unsupported() {
        assert!(matches!(
            load_source("https://example.com/a.png"),
            Err(ImageError::Unsupported(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_source("/definitely/not/here.png"),
            Err(ImageError::Io(_))
        ));
    }

    #[test]
    fn test_fit_within_preserves_aspect() {
        let img = DynamicImage::new_rgba8(400, 200);
        let fitted = fit_within(img, 100, 100);
        assert_eq!((fitted.width(), fitted.height()), (100, 50));

        let small = fit_within(DynamicImage::new_rgba8(10, 10), 100, 100);
        assert_eq!((small.width(), small.height()), (10, 10));
    }

    #[test]
    fn test_encode_formats() {
        let img = DynamicImage::new_rgba8(4, 4);
        let png = encode(&img, RasterFormat::Png, 100).expect("png");
        assert_eq!(RasterFormat::from_magic_bytes(&png), RasterFormat::Png);

        let jpeg = encode(&img, RasterFormat::Jpeg, 0).expect("jpeg");
        assert_eq!(RasterFormat::from_magic_bytes(&jpeg), RasterFormat::Jpeg);

        let bmp = encode(&img, RasterFormat::Bmp, 100).expect("bmp");
        assert_eq!(RasterFormat::from_magic_bytes(&bmp), RasterFormat::Bmp);

        assert!(encode(&img, RasterFormat::Unknown, 100).is_err());
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff0000"), Some(image::Rgba([255, 0, 0, 255])));
        assert_eq!(parse_hex_color("#00ff0080"), Some(image::Rgba([0, 255, 0, 128])));
        assert_eq!(parse_hex_color("red"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }
}
