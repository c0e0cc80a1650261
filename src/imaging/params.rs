//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They sit between
//! the worker (which decides what artifact to derive) and the
//! [`backend`](super::backend) (which does the actual pixel work), so a mock
//! backend can be swapped in without changing worker logic.

use image::Limits;

/// Widest sample a supported decoder can produce: RGBA with 32-bit float channels.
const MAX_BYTES_PER_PIXEL: u64 = 16;

/// Parameters for deriving a bounded thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailParams {
    /// Neither output edge may exceed this.
    pub max_dimension: u32,
    /// Pixel ceiling of the *input*; drives the decoder allocation cap.
    pub max_pixels: u64,
}

impl ThumbnailParams {
    pub fn new(max_dimension: u32, max_pixels: u64) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            max_pixels,
        }
    }

    /// Decoder limits: allocation is capped at the ceiling's worst-case buffer size.
    pub fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_pixels.saturating_mul(MAX_BYTES_PER_PIXEL));
        limits
    }
}
