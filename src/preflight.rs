//! In-process preflight gate.
//!
//! The cheap first stage: it decides whether bytes are worth handing to the
//! isolated worker at all. It sniffs the format, walks the container
//! structure, and enforces the pixel ceiling using header fields only. It
//! never decodes pixel data and never touches the filesystem.
//!
//! ```text
//! bytes ─ sniff ──✗──▶ Rejected(UnrecognizedFormat)
//!           │
//!         verify ─✗──▶ Rejected(VerificationFailed)     (handle discarded)
//!           │
//!      read_header (fresh handle)
//!           │
//!         ceiling ─✗─▶ Rejected(SizeExceeded)
//!           │
//!           ▼
//!     Accepted(ImageMetadata)
//! ```

use crate::config::PreflightConfig;
use crate::imaging::{BackendError, ImageBackend, RustBackend, within_pixel_ceiling};
use crate::types::{ImageMetadata, format_tag};
use std::fmt;

/// Why preflight refused an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnrecognizedFormat,
    VerificationFailed,
    SizeExceeded,
}

impl RejectReason {
    /// Human-readable reason, safe to show to the client.
    pub fn message(self) -> &'static str {
        match self {
            RejectReason::UnrecognizedFormat => "Unrecognized image format",
            RejectReason::VerificationFailed => "Image verification failed",
            RejectReason::SizeExceeded => "Image size invalid or exceeds configured maximum",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for RejectReason {}

/// Outcome of a preflight check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightResult {
    Accepted(ImageMetadata),
    Rejected(RejectReason),
}

impl PreflightResult {
    pub fn into_result(self) -> Result<ImageMetadata, RejectReason> {
        match self {
            PreflightResult::Accepted(meta) => Ok(meta),
            PreflightResult::Rejected(reason) => Err(reason),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, PreflightResult::Accepted(_))
    }
}

/// The in-process gate. Holds only read-only configuration, so one instance
/// can serve any number of concurrent requests.
pub struct PreflightChecker<B: ImageBackend = RustBackend> {
    backend: B,
    max_pixels: u64,
}

impl PreflightChecker<RustBackend> {
    pub fn new(config: &PreflightConfig) -> Self {
        Self::with_backend(RustBackend::new(), config)
    }
}

impl<B: ImageBackend> PreflightChecker<B> {
    /// Build a checker over a specific backend (allows testing with mock).
    pub fn with_backend(backend: B, config: &PreflightConfig) -> Self {
        Self {
            backend,
            max_pixels: config.max_pixels,
        }
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run the gate over `bytes`.
    ///
    /// Never panics on hostile input and never returns metadata for bytes that
    /// did not pass verification.
    pub fn check(&self, bytes: &[u8]) -> PreflightResult {
        if let Err(e) = self.backend.sniff(bytes) {
            tracing::debug!(error = %e, len = bytes.len(), "preflight: format not recognized");
            return PreflightResult::Rejected(RejectReason::UnrecognizedFormat);
        }

        match self.backend.verify(bytes) {
            Ok(()) => {}
            Err(BackendError::UnrecognizedFormat) => {
                return PreflightResult::Rejected(RejectReason::UnrecognizedFormat);
            }
            Err(e) => {
                tracing::debug!(error = %e, "preflight: verification failed");
                return PreflightResult::Rejected(RejectReason::VerificationFailed);
            }
        }

        // The verify handle is gone; read the header from a fresh one.
        let header = match self.backend.read_header(bytes) {
            Ok(header) => header,
            Err(e) => {
                tracing::debug!(error = %e, "preflight: header read failed after verify");
                return PreflightResult::Rejected(RejectReason::VerificationFailed);
            }
        };

        if !within_pixel_ceiling(header.dimensions, self.max_pixels) {
            tracing::debug!(
                dimensions = %header.dimensions,
                max_pixels = self.max_pixels,
                "preflight: size rejected"
            );
            return PreflightResult::Rejected(RejectReason::SizeExceeded);
        }

        PreflightResult::Accepted(ImageMetadata::verified(
            format_tag(header.format).to_string(),
            header.dimensions,
            header.color,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::test_helpers::{
        jpeg_bytes, noise_bytes, png_bytes, png_with_corrupt_idat, png_with_declared_size,
    };
    use crate::types::{ColorMode, Dimensions};

    fn checker() -> PreflightChecker {
        PreflightChecker::new(&PreflightConfig::default())
    }

    fn mock_checker(backend: MockBackend, max_pixels: u64) -> PreflightChecker<MockBackend> {
        PreflightChecker::with_backend(backend, &PreflightConfig { max_pixels })
    }

    // =========================================================================
    // Real backend
    // =========================================================================

    #[test]
    fn accepts_well_formed_png() {
        let meta = checker().check(&png_bytes(100, 100)).into_result().unwrap();
        assert_eq!(meta.format(), "PNG");
        assert_eq!(meta.width(), 100);
        assert_eq!(meta.height(), 100);
        assert_eq!(meta.color_mode(), ColorMode::Rgb);
    }

    #[test]
    fn accepts_well_formed_jpeg() {
        let meta = checker().check(&jpeg_bytes(320, 200)).into_result().unwrap();
        assert_eq!(meta.format(), "JPEG");
        assert_eq!(meta.size(), Dimensions::new(320, 200));
    }

    #[test]
    fn rejects_noise_as_unrecognized() {
        assert_eq!(
            checker().check(&noise_bytes(4096)),
            PreflightResult::Rejected(RejectReason::UnrecognizedFormat)
        );
    }

    #[test]
    fn rejects_empty_input_as_unrecognized() {
        assert_eq!(
            checker().check(&[]),
            PreflightResult::Rejected(RejectReason::UnrecognizedFormat)
        );
    }

    #[test]
    fn rejects_truncated_png_as_verification_failure() {
        let png = png_bytes(64, 64);
        assert_eq!(
            checker().check(&png[..40]),
            PreflightResult::Rejected(RejectReason::VerificationFailed)
        );
    }

    #[test]
    fn rejects_corrupt_idat_as_verification_failure() {
        assert_eq!(
            checker().check(&png_with_corrupt_idat(16, 16)),
            PreflightResult::Rejected(RejectReason::VerificationFailed)
        );
    }

    #[test]
    fn rejects_sixty_megapixel_header() {
        assert_eq!(
            checker().check(&png_with_declared_size(10_000, 6_000)),
            PreflightResult::Rejected(RejectReason::SizeExceeded)
        );
    }

    #[test]
    fn admits_header_at_exact_ceiling() {
        let checker = PreflightChecker::new(&PreflightConfig { max_pixels: 10_000 });
        assert!(checker.check(&png_with_declared_size(100, 100)).is_accepted());
        assert_eq!(
            checker.check(&png_with_declared_size(101, 100)),
            PreflightResult::Rejected(RejectReason::SizeExceeded)
        );
    }

    #[test]
    fn repeated_checks_agree() {
        let checker = checker();
        let png = png_bytes(48, 32);
        assert_eq!(checker.check(&png), checker.check(&png));
    }

    // =========================================================================
    // Mock backend
    // =========================================================================

    #[test]
    fn header_read_uses_fresh_handle_after_verify() {
        let checker = mock_checker(MockBackend::with_header(10, 10), 1_000);
        assert!(checker.check(b"x").is_accepted());
        assert_eq!(
            checker.backend.get_operations(),
            vec![RecordedOp::Sniff, RecordedOp::Verify, RecordedOp::ReadHeader]
        );
    }

    #[test]
    fn verify_failure_stops_before_header_read() {
        let checker = mock_checker(MockBackend::failing_verify("bad crc"), 1_000);
        assert_eq!(
            checker.check(b"x"),
            PreflightResult::Rejected(RejectReason::VerificationFailed)
        );
        assert_eq!(
            checker.backend.get_operations(),
            vec![RecordedOp::Sniff, RecordedOp::Verify]
        );
    }

    #[test]
    fn unrecognized_stops_after_sniff() {
        let checker = mock_checker(MockBackend::unrecognized(), 1_000);
        assert_eq!(
            checker.check(b"x"),
            PreflightResult::Rejected(RejectReason::UnrecognizedFormat)
        );
        assert_eq!(checker.backend.get_operations(), vec![RecordedOp::Sniff]);
    }

    #[test]
    fn zero_dimension_header_rejected() {
        let checker = mock_checker(MockBackend::with_header(0, 10), 1_000);
        assert_eq!(
            checker.check(b"x"),
            PreflightResult::Rejected(RejectReason::SizeExceeded)
        );
    }

    #[test]
    fn accepted_metadata_never_exceeds_ceiling() {
        for (w, h) in [(1, 1), (10, 100), (100, 10), (33, 31), (1000, 1), (1, 1000)] {
            let checker = mock_checker(MockBackend::with_header(w, h), 1_000);
            if let PreflightResult::Accepted(meta) = checker.check(b"x") {
                assert!(meta.size().pixel_count() <= 1_000, "{w}x{h} admitted");
            } else {
                assert!(u64::from(w) * u64::from(h) > 1_000, "{w}x{h} rejected");
            }
        }
    }

    #[test]
    fn reason_messages() {
        assert_eq!(
            RejectReason::SizeExceeded.to_string(),
            "Image size invalid or exceeds configured maximum"
        );
        assert_eq!(
            RejectReason::UnrecognizedFormat.to_string(),
            "Unrecognized image format"
        );
    }
}
