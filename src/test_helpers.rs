//! Shared test utilities for the pixelgate unit and integration tests.
//!
//! Builds synthetic inputs in memory: well-formed PNG/JPEG bytes from the
//! `image` encoders, a PNG whose header declares arbitrary dimensions over a
//! tiny body, and header-less noise.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let png = png_bytes(100, 100);
//! let bomb = png_with_declared_size(10_000, 6_000);
//! let corrupt = png_with_corrupt_idat(16, 16);
//! let junk = noise_bytes(4096);
//! ```

use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::io::Cursor;

// =========================================================================
// Well-formed images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Encode a `width × height` RGB gradient as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(Cursor::new(&mut out))
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Encode a `width × height` RGB gradient as JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(Cursor::new(&mut out))
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

// =========================================================================
// Crafted and malformed inputs
// =========================================================================

/// A structurally valid 1×1 PNG whose IHDR is rewritten to declare
/// `width × height`. The header CRC is recomputed so header parsing succeeds;
/// only a full decode would notice the body is far too short.
pub fn png_with_declared_size(width: u32, height: u32) -> Vec<u8> {
    let mut png = png_bytes(1, 1);
    // signature(8) + length(4) → type at 12, data at 16..29, crc at 29..33
    png[16..20].copy_from_slice(&width.to_be_bytes());
    png[20..24].copy_from_slice(&height.to_be_bytes());
    let crc = crc32fast::hash(&png[12..29]);
    png[29..33].copy_from_slice(&crc.to_be_bytes());
    png
}

/// A well-formed PNG with one byte flipped inside its first IDAT chunk.
/// The stored CRC is left as is, so the chunk no longer matches it.
pub fn png_with_corrupt_idat(width: u32, height: u32) -> Vec<u8> {
    let mut png = png_bytes(width, height);
    let type_at = png
        .windows(4)
        .position(|w| w == b"IDAT")
        .expect("encoder always writes an IDAT chunk");
    let len = u32::from_be_bytes([
        png[type_at - 4],
        png[type_at - 3],
        png[type_at - 2],
        png[type_at - 1],
    ]) as usize;
    png[type_at + 4 + len / 2] ^= 0xFF;
    png
}

/// Deterministic pseudo-random bytes that match no image signature.
pub fn noise_bytes(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9E37_79B9;
    let mut out: Vec<u8> = (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect();
    if let Some(first) = out.first_mut() {
        *first = b'Z';
    }
    out
}
