//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the only way the rest of the crate touches a
//! decoder. It exposes four operations, each of which may fail:
//!
//! | Operation | Cost | Used by |
//! |---|---|---|
//! | `sniff` | magic bytes only | preflight, worker |
//! | `verify` | container walk + header parse, no pixel decode | preflight, worker |
//! | `read_header` | header parse | preflight, worker |
//! | `thumbnail` | full decode + resize | worker only |
//!
//! Every operation takes the raw bytes and builds its own decoder handle.
//! Handles are never shared between operations: a decoder that has been
//! through `verify` may be left partially consumed, so `read_header` always starts
//! from a fresh one.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::ThumbnailParams;
use super::structure::StructureError;
use crate::types::{ColorMode, Dimensions, ProcessedResult};
use image::ImageFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognized image format")]
    UnrecognizedFormat,
    #[error("malformed container: {0}")]
    Structure(#[from] StructureError),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("resource limit exceeded: {0}")]
    LimitExceeded(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Header fields read from an opened image, before any pixel data is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub format: ImageFormat,
    pub dimensions: Dimensions,
    pub color: ColorMode,
}

/// Opaque decoder capability.
///
/// Implementations must be `Sync`: one backend instance is shared by every
/// concurrent request.
pub trait ImageBackend: Sync {
    /// Detect the container format from magic bytes.
    /// Unknown or undecodable formats yield [`BackendError::UnrecognizedFormat`].
    fn sniff(&self, bytes: &[u8]) -> Result<ImageFormat, BackendError>;

    /// Structural integrity check. One-shot: its decoder handle is discarded.
    fn verify(&self, bytes: &[u8]) -> Result<(), BackendError>;

    /// Read format, dimensions and color mode from a fresh handle.
    fn read_header(&self, bytes: &[u8]) -> Result<Header, BackendError>;

    /// Decode, normalize to RGB and shrink to fit `params.max_dimension`.
    fn thumbnail(
        &self,
        bytes: &[u8],
        params: &ThumbnailParams,
    ) -> Result<ProcessedResult, BackendError>;
}
