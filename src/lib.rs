#![deny(unsafe_code)]
//! Parsers for Windows animated cursors (`.ani`), icon/cursor containers
//! (`.ico`/`.cur`) and the PNG chunk stream an icon entry may carry.
//!
//! Every decoder works on a borrowed byte slice and never copies more than
//! the frames it hands back. Two layers are offered:
//!
//! * decode: [`AniFile::from_bytes`], [`IcoFile::from_bytes`] and
//!   [`walk_png`] build structured results and stay silent apart from `log`
//!   records;
//! * narrate: [`describe_ani`], [`describe_ico`] and [`describe_png`] yield a
//!   [`DiagnosticRecord`] for every field with its offset, size and raw bytes,
//!   which [`Table`] renders as an aligned text table.
//!
//! ```rust
//! use ani2png::AniFile;
//!
//! let mut ani = Vec::new();
//! ani.extend_from_slice(b"RIFF");
//! ani.extend_from_slice(&20u32.to_le_bytes());
//! ani.extend_from_slice(b"ACON");
//! ani.extend_from_slice(b"anih");
//! ani.extend_from_slice(&36u32.to_le_bytes());
//! ani.extend_from_slice(&[0; 36]);
//!
//! let file = AniFile::from_bytes(&ani)?;
//! assert!(file.header.is_some());
//! assert!(file.icons.is_empty());
//! # Ok::<(), ani2png::Error>(())
//! ```

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use arrayvec::ArrayVec;
use fallible_collections::TryReserveError;
use std::convert::TryInto as _;

pub mod ani;
pub mod cursor;
pub mod diagnostic;
pub mod fourcc;
pub mod ico;
pub mod png;
pub mod table;

pub use crate::ani::{AniChunk, AniChunks, AniFile, AniHeader, RiffPreamble};
pub use crate::cursor::{ByteCursor, RawStr, read_fixed_string, read_u16_le, read_u32_le, swap_endian32};
pub use crate::diagnostic::{
    AniNarration, DiagnosticRecord, IcoNarration, PngNarration, Rendering, ValueKind, describe_ani,
    describe_ani_with_config, describe_ico, describe_png,
};
pub use crate::fourcc::{ChunkTag, FourCC};
pub use crate::ico::{DirectoryEntry, IcoFile, ImageFormat, ResourceType};
pub use crate::png::{PNG_SIGNATURE, PngChunkRecord, PngWalk, PngWarning, Signature, walk_png};
pub use crate::table::Table;

/// A trait to indicate a type can be infallibly converted to `usize`.
/// This should only be implemented for infallible conversions, so only unsigned types are valid.
pub(crate) trait ToUsize {
    fn to_usize(self) -> usize;
}

/// Statically verify that the given type can fit within a `usize`.
/// If the size won't fit on the given platform, this will fail at compile time, but if a type
/// which can fail `TryInto<usize>` is used, it may panic.
macro_rules! impl_to_usize_from {
    ( $from_type:ty ) => {
        impl ToUsize for $from_type {
            fn to_usize(self) -> usize {
                const _: () = assert!(std::mem::size_of::<$from_type>() <= std::mem::size_of::<usize>());
                self.try_into().ok().unwrap()
            }
        }
    };
}

impl_to_usize_from!(u8);
impl_to_usize_from!(u16);
impl_to_usize_from!(u32);

#[doc(hidden)]
pub type TryVec<T> = fallible_collections::TryVec<T>;
/// Raw bytes of a text field. No encoding is assumed; see [`RawStr`].
pub type TryString = fallible_collections::TryVec<u8>;

/// Describes parser failures.
///
/// Every variant that comes from reading past the end of the buffer carries
/// the offset and the field being read, so malformed files can be debugged
/// from the error alone.
#[derive(Debug)]
pub enum Error {
    /// A read of `len` bytes for `field` at `offset` exceeds the buffer.
    OutOfBounds {
        offset: usize,
        len: usize,
        field: &'static str,
    },
    /// A container signature (`RIFF`, `ACON`) did not match.
    InvalidMagic {
        offset: usize,
        expected: &'static [u8],
        found: ArrayVec<u8, 8>,
    },
    /// The `anih` chunk declared a length other than 36.
    InvalidHeaderLength(u32),
    /// A chunk declares more payload than the buffer holds.
    TruncatedChunk {
        offset: usize,
        tag: FourCC,
        declared: u32,
        available: usize,
    },
    /// An unrecognized marker in the ANI chunk sequence.
    UnexpectedTag { offset: usize, byte: u8 },
    /// Resource limit exceeded during parsing
    ResourceLimitExceeded(&'static str),
    /// Out of memory
    OutOfMemory,
    /// Propagate underlying errors from `std::io`.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfBounds { offset, len, field } => {
                write!(f, "reading {len} bytes of {field} at offset {offset} runs past the end of the data")
            },
            Self::InvalidMagic { offset, expected, found } => {
                write!(f, "expected '{}' at offset {offset}, found '{}'", RawStr(expected), RawStr(found))
            },
            Self::InvalidHeaderLength(len) => {
                write!(f, "unexpected length of 'anih' chunk {len} != {}", AniHeader::SIZE)
            },
            Self::TruncatedChunk { offset, tag, declared, available } => write!(
                f,
                "'{tag}' chunk at offset {offset} declares {declared} bytes but only {available} remain"
            ),
            Self::UnexpectedTag { offset, byte } => {
                write!(f, "unexpected input at offset {offset} ('{}')", byte.escape_ascii())
            },
            Self::ResourceLimitExceeded(s) => f.write_str(s),
            Self::OutOfMemory => f.write_str("OOM"),
            Self::Io(err) => std::fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::OutOfBounds { .. } | Error::TruncatedChunk { .. } => std::io::ErrorKind::UnexpectedEof,
            Error::InvalidMagic { .. } | Error::InvalidHeaderLength(_) | Error::UnexpectedTag { .. } => {
                std::io::ErrorKind::InvalidData
            },
            Error::OutOfMemory => std::io::ErrorKind::OutOfMemory,
            Error::Io(io_err) => return io_err,
            Error::ResourceLimitExceeded(_) => std::io::ErrorKind::Other,
        };
        Self::new(kind, err)
    }
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

/// Result shorthand using our Error enum.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Configuration for decoding ANI files with resource limits and parsing options
///
/// Resource limits are checked **before** allocations occur, so a file that
/// declares absurd `icon` chunks cannot make the decoder reserve the memory.
///
/// # Examples
///
/// ```rust
/// use ani2png::DecodeConfig;
///
/// // Default limits (suitable for most apps)
/// let config = DecodeConfig::default();
///
/// // Strict limits for untrusted input
/// let config = DecodeConfig::default()
///     .with_peak_memory_limit(16_000_000)
///     .with_max_icons(256);
///
/// // Skip RIFF pad bytes and tolerate unknown chunks
/// let config = DecodeConfig::unlimited()
///     .with_word_aligned_chunks(true)
///     .lenient(true);
/// ```
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// Maximum total bytes copied into icon frames.
    /// Default: 1GB (1,000,000,000 bytes)
    pub peak_memory_limit: Option<u64>,

    /// Maximum number of `icon` chunks.
    /// Default: 10,000 frames
    pub max_icons: Option<u32>,

    /// Skip the pad byte that follows an odd-length chunk payload.
    ///
    /// RIFF pads chunk data to a WORD boundary, but many cursor writers
    /// leave the pad out, so the default walks chunks back to back.
    /// Default: false
    pub word_aligned_chunks: bool,

    /// Enable lenient parsing mode.
    ///
    /// When true, the `INFO` list type is accepted as a bare marker and
    /// chunks with an unknown but printable tag are skipped with a warning
    /// instead of failing with [`Error::UnexpectedTag`].
    /// Default: false (strict validation)
    pub lenient: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            peak_memory_limit: Some(1_000_000_000),
            max_icons: Some(10_000),
            word_aligned_chunks: false,
            lenient: false,
        }
    }
}

impl DecodeConfig {
    /// Create a configuration with no resource limits.
    ///
    /// This is what [`AniFile::from_bytes`] uses.
    pub fn unlimited() -> Self {
        Self {
            peak_memory_limit: None,
            max_icons: None,
            word_aligned_chunks: false,
            lenient: false,
        }
    }

    /// Set the limit on total icon bytes
    pub fn with_peak_memory_limit(mut self, bytes: u64) -> Self {
        self.peak_memory_limit = Some(bytes);
        self
    }

    /// Set the maximum number of icon frames
    pub fn with_max_icons(mut self, icons: u32) -> Self {
        self.max_icons = Some(icons);
        self
    }

    /// Skip RIFF pad bytes after odd-length chunks
    pub fn with_word_aligned_chunks(mut self, aligned: bool) -> Self {
        self.word_aligned_chunks = aligned;
        self
    }

    /// Enable lenient parsing mode
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }
}

#[test]
fn error_display_names_offset_and_field() {
    let err = Error::OutOfBounds { offset: 12, len: 4, field: "chunk length" };
    assert_eq!(err.to_string(), "reading 4 bytes of chunk length at offset 12 runs past the end of the data");

    let err = Error::UnexpectedTag { offset: 40, byte: b'X' };
    assert_eq!(err.to_string(), "unexpected input at offset 40 ('X')");

    let mut found = ArrayVec::new();
    found.extend(*b"ACOX");
    let err = Error::InvalidMagic { offset: 8, expected: b"ACON", found };
    assert_eq!(err.to_string(), "expected 'ACON' at offset 8, found 'ACOX'");
}

#[test]
fn error_into_io_error_kind() {
    let io: std::io::Error = Error::TruncatedChunk {
        offset: 12,
        tag: FourCC::from(*b"icon"),
        declared: 100,
        available: 3,
    }
    .into();
    assert_eq!(io.kind(), std::io::ErrorKind::UnexpectedEof);

    let io: std::io::Error = Error::InvalidHeaderLength(12).into();
    assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn decode_config_builders() {
    let config = DecodeConfig::default()
        .with_peak_memory_limit(1024)
        .with_max_icons(3)
        .with_word_aligned_chunks(true)
        .lenient(true);
    assert_eq!(config.peak_memory_limit, Some(1024));
    assert_eq!(config.max_icons, Some(3));
    assert!(config.word_aligned_chunks);
    assert!(config.lenient);

    let unlimited = DecodeConfig::unlimited();
    assert!(unlimited.peak_memory_limit.is_none());
    assert!(unlimited.max_icons.is_none());
    assert!(!unlimited.lenient);
}
