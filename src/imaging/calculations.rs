//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::types::Dimensions;

/// Whether an image of `dims` is admissible under a pixel ceiling.
///
/// Zero-width or zero-height images are never admissible.
pub fn within_pixel_ceiling(dims: Dimensions, max_pixels: u64) -> bool {
    dims.width > 0 && dims.height > 0 && dims.pixel_count() <= max_pixels
}

/// Calculate dimensions that fit inside a `max × max` box, preserving aspect ratio.
///
/// Never upscales: an image already inside the box is returned unchanged.
/// The shorter edge is rounded and clamped to at least 1px.
///
/// # Examples
/// ```
/// # use pixelgate::imaging::calculate_fit_dimensions;
/// # use pixelgate::types::Dimensions;
/// // 2000x1000 landscape into a 512 box → 512x256
/// assert_eq!(
///     calculate_fit_dimensions(Dimensions::new(2000, 1000), 512),
///     Dimensions::new(512, 256)
/// );
///
/// // Small images are left alone
/// assert_eq!(
///     calculate_fit_dimensions(Dimensions::new(100, 100), 512),
///     Dimensions::new(100, 100)
/// );
/// ```
pub fn calculate_fit_dimensions(source: Dimensions, max: u32) -> Dimensions {
    let Dimensions { width, height } = source;
    if width <= max && height <= max {
        return source;
    }

    if width >= height {
        // Landscape or square: width hits the box edge
        let h = (height as f64 * max as f64 / width as f64).round() as u32;
        Dimensions::new(max, h.clamp(1, max))
    } else {
        // Portrait: height hits the box edge
        let w = (width as f64 * max as f64 / height as f64).round() as u32;
        Dimensions::new(w.clamp(1, max), max)
    }
}
