//! Shared types that cross module and process boundaries.
//!
//! [`ImageMetadata`] describes a verified *input* image and is produced only by
//! the preflight checker. [`ProcessedResult`] describes the *derived* artifact
//! the worker produced. Both serialize to the same wire shape
//! (`{"format", "size": [w, h], "mode"}`) but are distinct types so one can
//! never be passed where the other is expected.

use image::{ColorType, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height in pixels. Serialized as a `[width, height]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count. Computed in `u64` so `u32::MAX × u32::MAX` cannot overflow.
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl From<Dimensions> for (u32, u32) {
    fn from(d: Dimensions) -> Self {
        (d.width, d.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel layout tag, named the way image tooling usually spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    #[serde(rename = "L")]
    Luma,
    #[serde(rename = "LA")]
    LumaAlpha,
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "RGBA")]
    Rgba,
    #[serde(rename = "L;16")]
    Luma16,
    #[serde(rename = "LA;16")]
    LumaAlpha16,
    #[serde(rename = "RGB;16")]
    Rgb16,
    #[serde(rename = "RGBA;16")]
    Rgba16,
    #[serde(rename = "RGB;F")]
    RgbFloat,
    #[serde(rename = "RGBA;F")]
    RgbaFloat,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ColorMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorMode::Luma => "L",
            ColorMode::LumaAlpha => "LA",
            ColorMode::Rgb => "RGB",
            ColorMode::Rgba => "RGBA",
            ColorMode::Luma16 => "L;16",
            ColorMode::LumaAlpha16 => "LA;16",
            ColorMode::Rgb16 => "RGB;16",
            ColorMode::Rgba16 => "RGBA;16",
            ColorMode::RgbFloat => "RGB;F",
            ColorMode::RgbaFloat => "RGBA;F",
            ColorMode::Unknown => "unknown",
        }
    }
}

impl From<ColorType> for ColorMode {
    fn from(color: ColorType) -> Self {
        match color {
            ColorType::L8 => ColorMode::Luma,
            ColorType::La8 => ColorMode::LumaAlpha,
            ColorType::Rgb8 => ColorMode::Rgb,
            ColorType::Rgba8 => ColorMode::Rgba,
            ColorType::L16 => ColorMode::Luma16,
            ColorType::La16 => ColorMode::LumaAlpha16,
            ColorType::Rgb16 => ColorMode::Rgb16,
            ColorType::Rgba16 => ColorMode::Rgba16,
            ColorType::Rgb32F => ColorMode::RgbFloat,
            ColorType::Rgba32F => ColorMode::RgbaFloat,
            _ => ColorMode::Unknown,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container format tag reported to callers ("PNG", "JPEG", ...), or "unknown".
pub fn format_tag(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "PNG",
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Gif => "GIF",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Tiff => "TIFF",
        ImageFormat::Ico => "ICO",
        ImageFormat::Avif => "AVIF",
        _ => "unknown",
    }
}

/// Metadata of a verified input image.
///
/// Fields are private: the only constructor is crate-internal and is called by
/// the preflight checker after verification succeeded, so a caller can never
/// hold metadata derived from unverified bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    format: String,
    size: Dimensions,
    mode: ColorMode,
}

impl ImageMetadata {
    pub(crate) fn verified(format: String, size: Dimensions, mode: ColorMode) -> Self {
        Self { format, size, mode }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn size(&self) -> Dimensions {
        self.size
    }

    pub fn color_mode(&self) -> ColorMode {
        self.mode
    }
}

/// Description of the artifact the worker derived (e.g. a thumbnail), not of the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedResult {
    pub format: String,
    pub size: Dimensions,
    pub mode: ColorMode,
}
