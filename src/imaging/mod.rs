//! Image codec access: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff** | `image::guess_format` |
//! | **Verify** | custom container walkers + decoder header parse |
//! | **Read header** | `ImageDecoder::dimensions` / `color_type` |
//! | **Thumbnail** | bounded decode + Lanczos3 resize to an RGB raster |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Structure**: Container framing checks that never decode pixels
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;
pub mod structure;

pub use backend::{BackendError, Header, ImageBackend};
pub use calculations::{calculate_fit_dimensions, within_pixel_ceiling};
pub use params::ThumbnailParams;
pub use rust_backend::{RustBackend, accepted_formats};
pub use structure::StructureError;
