//! Pure Rust codec backend on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Sniff | `image::guess_format` (magic bytes) |
//! | Verify | [`structure::check`](super::structure::check) + decoder header parse |
//! | Read header | `ImageReader::into_decoder` → `dimensions` / `color_type` |
//! | Thumbnail | `ImageReader::decode` under [`Limits`](image::Limits), `to_rgb8`, Lanczos3 resize |
//!
//! The thumbnail stays an in-memory RGB raster. Its reported `format` is the
//! container it was decoded from.

use super::backend::{BackendError, Header, ImageBackend};
use super::calculations::calculate_fit_dimensions;
use super::params::ThumbnailParams;
use super::structure;
use crate::types::{ColorMode, Dimensions, ProcessedResult, format_tag};
use image::error::ImageError;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::LazyLock;

/// Formats whose decoders are compiled in and accepted from clients.
const ACCEPTED_CANDIDATES: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
    ImageFormat::WebP,
];

static ACCEPTED_FORMATS: LazyLock<Vec<ImageFormat>> = LazyLock::new(|| {
    ACCEPTED_CANDIDATES
        .iter()
        .copied()
        .filter(|fmt| fmt.reading_enabled())
        .collect()
});

/// Returns the set of input formats that have working decoders compiled in.
pub fn accepted_formats() -> &'static [ImageFormat] {
    &ACCEPTED_FORMATS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Open a fresh reader over `bytes` with the format already pinned.
fn open(bytes: &[u8], format: ImageFormat) -> ImageReader<Cursor<&[u8]>> {
    ImageReader::with_format(Cursor::new(bytes), format)
}

fn decode_error(e: ImageError) -> BackendError {
    match e {
        ImageError::Limits(limit) => BackendError::LimitExceeded(limit.to_string()),
        ImageError::Unsupported(_) => BackendError::UnrecognizedFormat,
        ImageError::IoError(io) => BackendError::Io(io),
        other => BackendError::Decode(other.to_string()),
    }
}

/// Error mapping for a full decode. The format was already recognized by
/// sniff and verify, so an unsupported feature here is a decode failure.
fn full_decode_error(e: ImageError) -> BackendError {
    match e {
        ImageError::Unsupported(unsupported) => BackendError::Decode(unsupported.to_string()),
        other => decode_error(other),
    }
}

impl ImageBackend for RustBackend {
    fn sniff(&self, bytes: &[u8]) -> Result<ImageFormat, BackendError> {
        let format = image::guess_format(bytes).map_err(|_| BackendError::UnrecognizedFormat)?;
        if !accepted_formats().contains(&format) {
            return Err(BackendError::UnrecognizedFormat);
        }
        Ok(format)
    }

    fn verify(&self, bytes: &[u8]) -> Result<(), BackendError> {
        let format = self.sniff(bytes)?;
        structure::check(format, bytes)?;
        // Header parse on a throwaway decoder; it is dropped here.
        open(bytes, format).into_decoder().map_err(decode_error)?;
        Ok(())
    }

    fn read_header(&self, bytes: &[u8]) -> Result<Header, BackendError> {
        let format = self.sniff(bytes)?;
        let decoder = open(bytes, format).into_decoder().map_err(decode_error)?;
        let (width, height) = decoder.dimensions();
        Ok(Header {
            format,
            dimensions: Dimensions::new(width, height),
            color: ColorMode::from(decoder.color_type()),
        })
    }

    fn thumbnail(
        &self,
        bytes: &[u8],
        params: &ThumbnailParams,
    ) -> Result<ProcessedResult, BackendError> {
        let format = self.sniff(bytes)?;
        let mut reader = open(bytes, format);
        reader.limits(params.limits());
        let img = reader.decode().map_err(full_decode_error)?;

        // Normalize color mode before resizing
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let source = Dimensions::new(rgb.width(), rgb.height());
        let target = calculate_fit_dimensions(source, params.max_dimension);
        let resized = if target == source {
            rgb
        } else {
            rgb.resize_exact(target.width, target.height, FilterType::Lanczos3)
        };

        Ok(ProcessedResult {
            format: format_tag(format).to_string(),
            size: Dimensions::new(resized.width(), resized.height()),
            mode: ColorMode::Rgb,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{jpeg_bytes, noise_bytes, png_bytes, png_with_declared_size};

    #[test]
    fn accepted_formats_match_compiled_decoders() {
        let formats = accepted_formats();
        for expected in [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP] {
            assert!(
                formats.contains(&expected),
                "expected {expected:?} in accepted formats"
            );
        }
        assert!(!formats.contains(&ImageFormat::Avif));
    }

    #[test]
    fn sniff_png_and_jpeg() {
        let backend = RustBackend::new();
        assert_eq!(backend.sniff(&png_bytes(8, 8)).unwrap(), ImageFormat::Png);
        assert_eq!(backend.sniff(&jpeg_bytes(8, 8)).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn sniff_noise_is_unrecognized() {
        let backend = RustBackend::new();
        assert!(matches!(
            backend.sniff(&noise_bytes(1024)),
            Err(BackendError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn sniff_empty_is_unrecognized() {
        let backend = RustBackend::new();
        assert!(matches!(
            backend.sniff(&[]),
            Err(BackendError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn verify_synthetic_png() {
        RustBackend::new().verify(&png_bytes(32, 24)).unwrap();
    }

    #[test]
    fn verify_truncated_png_fails() {
        let png = png_bytes(32, 24);
        let result = RustBackend::new().verify(&png[..png.len() / 2]);
        assert!(matches!(result, Err(BackendError::Structure(_))));
    }

    #[test]
    fn verify_passes_header_only_bomb() {
        RustBackend::new()
            .verify(&png_with_declared_size(10_000, 6_000))
            .unwrap();
    }

    #[test]
    fn header_of_synthetic_jpeg() {
        let header = RustBackend::new().read_header(&jpeg_bytes(200, 150)).unwrap();
        assert_eq!(header.format, ImageFormat::Jpeg);
        assert_eq!(header.dimensions, Dimensions::new(200, 150));
        assert_eq!(header.color, ColorMode::Rgb);
    }

    #[test]
    fn header_reports_declared_dimensions() {
        let header = RustBackend::new()
            .read_header(&png_with_declared_size(10_000, 6_000))
            .unwrap();
        assert_eq!(header.dimensions, Dimensions::new(10_000, 6_000));
    }

    #[test]
    fn thumbnail_shrinks_large_image() {
        let result = RustBackend::new()
            .thumbnail(&png_bytes(1024, 768), &ThumbnailParams::new(512, 50_000_000))
            .unwrap();
        assert_eq!(result.size, Dimensions::new(512, 384));
        assert_eq!(result.mode, ColorMode::Rgb);
        assert_eq!(result.format, "PNG");
    }

    #[test]
    fn thumbnail_keeps_small_image() {
        let result = RustBackend::new()
            .thumbnail(&jpeg_bytes(100, 100), &ThumbnailParams::new(512, 50_000_000))
            .unwrap();
        assert_eq!(result.size, Dimensions::new(100, 100));
    }

    #[test]
    fn thumbnail_reports_source_container() {
        let result = RustBackend::new()
            .thumbnail(&jpeg_bytes(64, 64), &ThumbnailParams::new(512, 50_000_000))
            .unwrap();
        assert_eq!(result.format, "JPEG");
        assert_eq!(result.mode, ColorMode::Rgb);
    }

    #[test]
    fn unsupported_feature_in_full_decode_is_decode_failure() {
        use image::error::{ImageFormatHint, UnsupportedError, UnsupportedErrorKind};
        let err = ImageError::Unsupported(UnsupportedError::from_format_and_kind(
            ImageFormatHint::Exact(ImageFormat::Tiff),
            UnsupportedErrorKind::GenericFeature("exotic compression".to_string()),
        ));
        assert!(matches!(full_decode_error(err), BackendError::Decode(_)));
    }

    #[test]
    fn thumbnail_respects_allocation_limit() {
        let result = RustBackend::new()
            .thumbnail(&png_bytes(64, 64), &ThumbnailParams::new(512, 10));
        assert!(matches!(result, Err(BackendError::LimitExceeded(_))));
    }
}
