//! Container structure walkers.
//!
//! These walk the container framing of an image (JPEG segments, PNG chunks,
//! TIFF IFDs, RIFF/GIF headers) without touching pixel data. They catch
//! truncated files, out-of-bounds lengths and misordered headers before any
//! decoder sees the bytes. Formats without a walker here are checked only by
//! the decoder's own header parse.
//!
//! Every offset is bounds-checked against the input; nothing here allocates.

use image::ImageFormat;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("missing or wrong file signature")]
    MissingSignature,
    #[error("truncated at byte {offset}")]
    Truncated { offset: usize },
    #[error("expected marker at byte {offset}")]
    BadMarker { offset: usize },
    #[error("invalid length field at byte {offset}")]
    BadLength { offset: usize },
    #[error("invalid chunk type at byte {offset}")]
    BadChunkType { offset: usize },
    #[error("chunk checksum mismatch at byte {offset}")]
    BadChecksum { offset: usize },
    #[error("image header missing or malformed")]
    MissingHeader,
    #[error("scan data precedes frame header")]
    ScanBeforeFrame,
    #[error("no image data")]
    NoImageData,
    #[error("invalid IFD at byte {offset}")]
    BadIfd { offset: usize },
}

/// Walk the container structure of `data` as `format`.
pub fn check(format: ImageFormat, data: &[u8]) -> Result<(), StructureError> {
    match format {
        ImageFormat::Jpeg => check_jpeg(data),
        ImageFormat::Png => check_png(data),
        ImageFormat::Gif => check_gif(data),
        ImageFormat::WebP => check_riff(data),
        ImageFormat::Tiff => check_tiff(data),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// JPEG: marker segments up to start-of-scan
// ---------------------------------------------------------------------------

/// Walk JPEG marker segments from SOI to the first SOS.
///
/// Requires a frame header (SOF0..SOF15, excluding DHT/JPG/DAC) before the
/// scan. Entropy-coded data after SOS is left to the decoder.
fn check_jpeg(data: &[u8]) -> Result<(), StructureError> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err(StructureError::MissingSignature);
    }

    let mut pos = 2;
    let mut saw_frame = false;

    loop {
        if pos + 2 > data.len() {
            return Err(StructureError::Truncated { offset: pos });
        }
        if data[pos] != 0xFF {
            return Err(StructureError::BadMarker { offset: pos });
        }
        // Fill bytes
        while pos + 2 < data.len() && data[pos + 1] == 0xFF {
            pos += 1;
        }
        let marker = data[pos + 1];

        // Markers without length field
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        if marker == 0xD9 {
            return Err(StructureError::NoImageData);
        }

        if pos + 4 > data.len() {
            return Err(StructureError::Truncated { offset: pos });
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if len < 2 {
            return Err(StructureError::BadLength { offset: pos + 2 });
        }
        let end = pos + 2 + len;
        if end > data.len() {
            return Err(StructureError::Truncated { offset: pos });
        }

        match marker {
            // SOF: precision(1) + height(2) + width(2) + components(1)
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                if len < 8 || data[pos + 9] == 0 {
                    return Err(StructureError::MissingHeader);
                }
                saw_frame = true;
            }
            0xDA => {
                return if saw_frame {
                    Ok(())
                } else {
                    Err(StructureError::ScanBeforeFrame)
                };
            }
            _ => {}
        }

        pos = end;
    }
}

// ---------------------------------------------------------------------------
// PNG: chunk framing from IHDR to IEND
// ---------------------------------------------------------------------------

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const PNG_MAX_CHUNK_LEN: usize = 0x7FFF_FFFF;

/// Walk PNG chunks. IHDR must come first, at least one IDAT must appear,
/// and the stream must end with IEND. Every chunk's CRC (over type and
/// data) must match its trailer.
fn check_png(data: &[u8]) -> Result<(), StructureError> {
    if !data.starts_with(PNG_SIGNATURE) {
        return Err(StructureError::MissingSignature);
    }

    let mut pos = PNG_SIGNATURE.len();
    let mut first = true;
    let mut saw_idat = false;

    loop {
        // length(4) + type(4)
        if pos + 8 > data.len() {
            return Err(StructureError::Truncated { offset: pos });
        }
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        if len > PNG_MAX_CHUNK_LEN {
            return Err(StructureError::BadLength { offset: pos });
        }
        let chunk_type = &data[pos + 4..pos + 8];
        if !chunk_type.iter().all(u8::is_ascii_alphabetic) {
            return Err(StructureError::BadChunkType { offset: pos + 4 });
        }
        // data + crc(4)
        let end = match (pos + 12).checked_add(len) {
            Some(end) if end <= data.len() => end,
            _ => return Err(StructureError::Truncated { offset: pos }),
        };

        let crc_at = end - 4;
        let stored = u32::from_be_bytes([
            data[crc_at],
            data[crc_at + 1],
            data[crc_at + 2],
            data[crc_at + 3],
        ]);
        if crc32fast::hash(&data[pos + 4..crc_at]) != stored {
            return Err(StructureError::BadChecksum { offset: crc_at });
        }

        if first {
            if chunk_type != b"IHDR" || len != 13 {
                return Err(StructureError::MissingHeader);
            }
            first = false;
        }

        match chunk_type {
            b"IDAT" => saw_idat = true,
            b"IEND" => {
                return if saw_idat {
                    Ok(())
                } else {
                    Err(StructureError::NoImageData)
                };
            }
            _ => {}
        }

        pos = end;
    }
}

// ---------------------------------------------------------------------------
// GIF / WebP: fixed headers
// ---------------------------------------------------------------------------

/// GIF header (6) + logical screen descriptor (7).
fn check_gif(data: &[u8]) -> Result<(), StructureError> {
    if !(data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")) {
        return Err(StructureError::MissingSignature);
    }
    if data.len() < 13 {
        return Err(StructureError::Truncated { offset: data.len() });
    }
    Ok(())
}

/// RIFF container: declared size must fit inside the input.
fn check_riff(data: &[u8]) -> Result<(), StructureError> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return Err(StructureError::MissingSignature);
    }
    let riff_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    if riff_size < 4 {
        return Err(StructureError::BadLength { offset: 4 });
    }
    if riff_size.saturating_add(8) > data.len() {
        return Err(StructureError::Truncated { offset: data.len() });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TIFF: header + first IFD bounds
// ---------------------------------------------------------------------------

/// Check the TIFF header and that the first IFD's entry table is in bounds.
fn check_tiff(data: &[u8]) -> Result<(), StructureError> {
    if data.len() < 8 {
        return Err(StructureError::MissingSignature);
    }

    let big_endian = match &data[0..2] {
        b"MM" => true,
        b"II" => false,
        _ => return Err(StructureError::MissingSignature),
    };

    let read_u16 = |offset: usize| -> u16 {
        let bytes = [data[offset], data[offset + 1]];
        if big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        }
    };

    let read_u32 = |offset: usize| -> u32 {
        let bytes = [
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ];
        if big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    };

    // Classic TIFF only; BigTIFF (43) is not accepted.
    if read_u16(2) != 42 {
        return Err(StructureError::MissingSignature);
    }

    let ifd_offset = read_u32(4) as usize;
    if ifd_offset < 8 || ifd_offset + 2 > data.len() {
        return Err(StructureError::BadIfd { offset: 4 });
    }

    let entry_count = read_u16(ifd_offset) as usize;
    if entry_count == 0 {
        return Err(StructureError::BadIfd {
            offset: ifd_offset,
        });
    }
    // entries (12 each) + next-IFD offset (4)
    let table_end = ifd_offset + 2 + entry_count * 12 + 4;
    if table_end > data.len() {
        return Err(StructureError::Truncated {
            offset: ifd_offset,
        });
    }
    Ok(())
}
