//! PNG signature check and chunk walk.
//!
//! A PNG stream is the signature `137 'P' 'N' 'G' 13 10 26 10` followed by
//! chunks of `{length: u32 BE, type: 4 bytes, data: length bytes, crc: u32 BE}`,
//! ending with `IEND`. Chunk data is never decoded and CRCs are never
//! checked; the walk only records where everything is.
//!
//! The walker is used on byte ranges of unknown type (icon frames, ICO image
//! data), so a bad signature or a short stream is reported in the result
//! rather than returned as an error.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::{debug, warn};
use std::fmt;
use std::ops::Range;

use crate::cursor::ByteCursor;
use crate::fourcc::FourCC;
use crate::{Result, ToUsize, TryVec};

pub const PNG_SIGNATURE: [u8; 8] = [137, b'P', b'N', b'G', 13, 10, 26, 10];

/// The chunk that ends a PNG stream.
pub const IEND: FourCC = FourCC::new(*b"IEND");

/// Outcome of the signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    Valid,
    /// Fewer than 8 bytes from the start position.
    TooShort,
    /// The leading 8 bytes are not the PNG signature.
    Mismatch,
}

/// Where one chunk sits in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PngChunkRecord {
    /// Offset of the length field.
    pub offset: usize,
    /// Length as declared, converted from big-endian.
    pub declared_length: u32,
    pub type_tag: FourCC,
    /// The data bytes actually present; shorter than declared if truncated.
    pub payload: Range<usize>,
    /// CRC as stored, for display only.
    pub crc: Option<u32>,
}

impl PngChunkRecord {
    pub fn has_trailing_crc(&self) -> bool {
        self.crc.is_some()
    }

    pub fn crc_offset(&self) -> usize {
        self.payload.end
    }
}

/// Recoverable oddities found while walking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PngWarning {
    /// The data ended right after the payload of a chunk other than `IEND`.
    MissingCrc { offset: usize, chunk: FourCC },
    /// A chunk declares more data than the buffer holds.
    TruncatedPayload {
        offset: usize,
        chunk: FourCC,
        declared: u32,
        available: usize,
    },
    /// Fewer than 8 bytes are left, too few for another chunk header.
    TrailingBytes { offset: usize, len: usize },
}

impl fmt::Display for PngWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCrc { offset, chunk } => {
                write!(f, "crc of '{chunk}' chunk at {offset} missing since the data is too short")
            },
            Self::TruncatedPayload { offset, chunk, declared, available } => write!(
                f,
                "'{chunk}' chunk at {offset} declares {declared} bytes but only {available} remain"
            ),
            Self::TrailingBytes { offset, len } => write!(f, "{len} trailing bytes at {offset}"),
        }
    }
}

/// Result of [`walk_png`].
#[derive(Debug)]
pub struct PngWalk {
    /// Where the signature was expected.
    pub start: usize,
    pub signature: Signature,
    /// Chunks in stream order, up to and including `IEND`.
    pub chunks: TryVec<PngChunkRecord>,
    pub warnings: TryVec<PngWarning>,
}

impl PngWalk {
    pub fn is_png(&self) -> bool {
        self.signature == Signature::Valid
    }

    /// True if the walk stopped at an `IEND` chunk.
    pub fn is_complete(&self) -> bool {
        self.chunks.last().map_or(false, |c| c.type_tag == IEND)
    }

    pub fn chunk(&self, type_tag: &[u8; 4]) -> Option<&PngChunkRecord> {
        self.chunks.iter().find(|c| c.type_tag == type_tag)
    }
}

/// Check for the PNG signature at `start` and walk the chunks after it.
///
/// Never fails on malformed input: a wrong signature ends the walk with no
/// chunks, and truncation ends it with a warning. The only error is running
/// out of memory for the record lists.
pub fn walk_png(data: &[u8], start: usize) -> Result<PngWalk> {
    let mut walk = PngWalk {
        start,
        signature: Signature::Valid,
        chunks: TryVec::new(),
        warnings: TryVec::new(),
    };

    let mut src = ByteCursor::at(data, start);
    match src.peek(PNG_SIGNATURE.len()) {
        None => {
            debug!("no png signature at {start} (too small)");
            walk.signature = Signature::TooShort;
            return Ok(walk);
        },
        Some(sig) if sig != PNG_SIGNATURE => {
            debug!("no png signature at {start} (leading 8 bytes incorrect)");
            walk.signature = Signature::Mismatch;
            return Ok(walk);
        },
        Some(_) => src.skip(PNG_SIGNATURE.len(), "PNG signature")?,
    }

    while !src.is_at_end() {
        let offset = src.position();
        if src.remaining() < 8 {
            let len = src.remaining();
            warn!("{len} trailing bytes at {offset} are too short for a chunk header");
            walk.warnings.push(PngWarning::TrailingBytes { offset, len })?;
            break;
        }
        let declared_length = src.read_u32_be("chunk size")?;
        let type_tag = src.read_fourcc("chunk type")?;
        let payload_start = src.position();
        debug!("png chunk '{type_tag}' at {offset} [length={declared_length}]");

        let available = src.remaining();
        if declared_length.to_usize() > available {
            warn!("png chunk '{type_tag}' at {offset} declares {declared_length} bytes, only {available} remain");
            walk.warnings.push(PngWarning::TruncatedPayload {
                offset,
                chunk: type_tag,
                declared: declared_length,
                available,
            })?;
            walk.chunks.push(PngChunkRecord {
                offset,
                declared_length,
                type_tag,
                payload: payload_start..data.len(),
                crc: None,
            })?;
            break;
        }
        src.skip(declared_length.to_usize(), "chunk data")?;
        let payload = payload_start..src.position();

        let crc = if src.remaining() >= 4 {
            Some(src.read_u32_be("crc")?)
        } else {
            if type_tag != IEND {
                warn!("crc of png chunk '{type_tag}' at {offset} missing since the data is too short");
                walk.warnings.push(PngWarning::MissingCrc { offset, chunk: type_tag })?;
            }
            None
        };

        walk.chunks.push(PngChunkRecord { offset, declared_length, type_tag, payload, crc })?;
        if type_tag == IEND {
            break;
        }
    }

    Ok(walk)
}

#[cfg(test)]
fn png_chunk(tag: &[u8; 4], payload: &[u8], crc: Option<u32>) -> std::vec::Vec<u8> {
    let mut data = (payload.len() as u32).to_be_bytes().to_vec();
    data.extend_from_slice(tag);
    data.extend_from_slice(payload);
    if let Some(crc) = crc {
        data.extend_from_slice(&crc.to_be_bytes());
    }
    data
}

#[test]
fn signature_only() {
    let walk = walk_png(&PNG_SIGNATURE, 0).unwrap();
    assert!(walk.is_png());
    assert!(walk.chunks.is_empty());
    assert!(walk.warnings.is_empty());
    assert!(!walk.is_complete());
}

#[test]
fn not_a_png_is_not_an_error() {
    let walk = walk_png(b"GIF89a..........", 0).unwrap();
    assert_eq!(walk.signature, Signature::Mismatch);
    assert!(walk.chunks.is_empty());

    let walk = walk_png(&PNG_SIGNATURE[..7], 0).unwrap();
    assert_eq!(walk.signature, Signature::TooShort);

    let walk = walk_png(&PNG_SIGNATURE, 9).unwrap();
    assert_eq!(walk.signature, Signature::TooShort);
}

#[test]
fn walks_to_iend() {
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend(png_chunk(b"IHDR", &[0; 13], Some(0x1122_3344)));
    data.extend(png_chunk(b"IDAT", &[1, 2, 3], Some(5)));
    data.extend(png_chunk(b"IEND", &[], Some(0xae42_6082)));
    data.extend(b"junk after end");

    let walk = walk_png(&data, 0).unwrap();
    assert!(walk.is_complete());
    assert!(walk.warnings.is_empty());
    let tags: std::vec::Vec<_> = walk.chunks.iter().map(|c| c.type_tag.to_string()).collect();
    assert_eq!(tags, ["IHDR", "IDAT", "IEND"]);

    let ihdr = walk.chunk(b"IHDR").unwrap();
    assert_eq!(ihdr.offset, 8);
    assert_eq!(ihdr.declared_length, 13);
    assert_eq!(ihdr.payload, 16..29);
    assert_eq!(ihdr.crc, Some(0x1122_3344));
    assert_eq!(walk.chunk(b"IDAT").unwrap().offset, 33);
}

#[test]
fn missing_crc_is_a_warning() {
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend(png_chunk(b"IDAT", &[9; 4], None));
    let walk = walk_png(&data, 0).unwrap();
    assert_eq!(walk.chunks.len(), 1);
    assert!(!walk.chunks[0].has_trailing_crc());
    assert_eq!(&walk.warnings[..], &[PngWarning::MissingCrc { offset: 8, chunk: FourCC::new(*b"IDAT") }]);

    let mut data = PNG_SIGNATURE.to_vec();
    data.extend(png_chunk(b"IEND", &[], None));
    let walk = walk_png(&data, 0).unwrap();
    assert!(walk.is_complete());
    assert!(walk.warnings.is_empty());
}

#[test]
fn truncated_payload_stops_the_walk() {
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend(png_chunk(b"IDAT", &[9; 40], Some(0)));
    data.truncate(30);
    let walk = walk_png(&data, 0).unwrap();
    assert_eq!(walk.chunks.len(), 1);
    assert_eq!(walk.chunks[0].payload, 16..30);
    assert!(matches!(
        walk.warnings[0],
        PngWarning::TruncatedPayload { offset: 8, declared: 40, available: 14, .. }
    ));
}

#[test]
fn trailing_bytes_stop_the_walk() {
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend(png_chunk(b"tEXt", b"a", Some(1)));
    data.extend([0, 0, 0]);
    let walk = walk_png(&data, 0).unwrap();
    assert_eq!(walk.chunks.len(), 1);
    assert_eq!(&walk.warnings[..], &[PngWarning::TrailingBytes { offset: 21, len: 3 }]);
    assert_eq!(walk.warnings[0].to_string(), "3 trailing bytes at 21");
}

#[test]
fn walk_from_an_offset() {
    let mut data = b"ICO header bytes".to_vec();
    let start = data.len();
    data.extend(PNG_SIGNATURE);
    data.extend(png_chunk(b"IEND", &[], Some(0)));
    let walk = walk_png(&data, start).unwrap();
    assert_eq!(walk.start, 16);
    assert_eq!(walk.chunks[0].offset, 24);
    assert!(walk.is_complete());
}
