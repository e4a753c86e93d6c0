//! Animated cursors (`.ani`).
//!
//! An animated cursor is a RIFF container of form type `ACON`:
//!
//! ```text
//! "RIFF" <u32 size> "ACON"
//!   then, in no particular order:
//!   "LIST" <u32 size>           grouping marker, sub-chunks follow inline
//!   "INAM" <u32 n> <n bytes>    title
//!   "IART" <u32 n> <n bytes>    artist
//!   "fram"                      list type of the frame list, no size
//!   "icon" <u32 n> <n bytes>    one frame, an ICO/CUR (or PNG) image
//!   "anih" <u32 36> <9 × u32>   animation header
//!   "rate" <u32 n> <n bytes>    per-step display rates
//!   "seq " <u32 n> <n bytes>    frame sequence
//! ```
//!
//! `LIST` is not skipped as a unit: its length is informational and the
//! chunks it groups are walked by the same loop as the top level.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use arrayvec::ArrayVec;
use log::{debug, warn};
use std::io::Read;

use crate::cursor::{ByteCursor, RawStr};
use crate::fourcc::{ChunkTag, FourCC};
use crate::ico::IcoFile;
use crate::{DecodeConfig, Error, Result, ToUsize, TryString, TryVec};

/// Frames are ICO/CUR data rather than raw bitmaps.
pub const AF_ICON: u32 = 0x1;
/// A `seq ` chunk orders the frames.
pub const AF_SEQUENCE: u32 = 0x2;

/// The fixed 36-byte `anih` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AniHeader {
    /// Num bytes in the header (36)
    pub struct_size: u32,
    /// Number of unique frames
    pub frame_count: u32,
    /// Number of steps before the animation cycles
    pub step_count: u32,
    pub width: u32,
    pub height: u32,
    pub bit_count: u32,
    pub plane_count: u32,
    /// Default display rate in jiffies (1/60 s) when there is no `rate` chunk
    pub default_rate_jiffies: u32,
    /// `AF_ICON` | `AF_SEQUENCE`
    pub flags: u32,
}

impl AniHeader {
    pub const SIZE: u32 = 36;

    /// Field names in file order.
    pub const FIELD_NAMES: [&'static str; 9] = [
        "cbSizeOf",
        "cFrames",
        "cSteps",
        "cx",
        "cy",
        "cBitCount",
        "cPlanes",
        "JifRate",
        "flags",
    ];

    /// Parse the nine fields from an `anih` payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut src = ByteCursor::new(payload);
        let mut fields = [0u32; 9];
        for (field, name) in fields.iter_mut().zip(Self::FIELD_NAMES) {
            *field = src.read_u32_le(name)?;
        }
        let [struct_size, frame_count, step_count, width, height, bit_count, plane_count, default_rate_jiffies, flags] =
            fields;
        Ok(Self {
            struct_size,
            frame_count,
            step_count,
            width,
            height,
            bit_count,
            plane_count,
            default_rate_jiffies,
            flags,
        })
    }

    pub fn is_icon_data(&self) -> bool {
        self.flags & AF_ICON != 0
    }

    pub fn has_sequence(&self) -> bool {
        self.flags & AF_SEQUENCE != 0
    }

    /// Default display rate converted to milliseconds.
    pub fn default_rate_ms(&self) -> u32 {
        let ms = u64::from(self.default_rate_jiffies) * 1000 / 60;
        u32::try_from(ms).unwrap_or(u32::MAX)
    }
}

/// The 12 bytes every ANI file starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiffPreamble {
    pub declared_length: u32,
    pub container_tag: FourCC,
}

impl RiffPreamble {
    pub const SIZE: usize = 12;

    /// Check `RIFF` at 0 and `ACON` at 8.
    ///
    /// A buffer too short for the tag and length, or for the container tag,
    /// fails as a magic mismatch holding whatever bytes are there.
    pub fn read(src: &mut ByteCursor<'_>) -> Result<Self> {
        if src.remaining() < 8 {
            return Err(short_magic(src, b"RIFF"));
        }
        expect_magic(src, b"RIFF", "RIFF tag")?;
        let declared_length = src.read_u32_le("RIFF length")?;
        if src.remaining() < 4 {
            return Err(short_magic(src, b"ACON"));
        }
        let container_tag = expect_magic(src, b"ACON", "container tag")?;
        debug!("RIFF header found, declared length {declared_length}");
        Ok(Self { declared_length, container_tag })
    }
}

fn short_magic(src: &ByteCursor<'_>, expected: &'static [u8; 4]) -> Error {
    let offset = src.position();
    let mut found = ArrayVec::new();
    found.extend(src.data().iter().skip(offset).take(7).copied());
    Error::InvalidMagic { offset, expected, found }
}

fn expect_magic(src: &mut ByteCursor<'_>, expected: &'static [u8; 4], field: &'static str) -> Result<FourCC> {
    let offset = src.position();
    let tag = src.read_fourcc(field)?;
    if tag != expected {
        let mut found = ArrayVec::new();
        found.extend(tag.value);
        return Err(Error::InvalidMagic { offset, expected, found });
    }
    Ok(tag)
}

/// One item of the top-level chunk walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AniChunk<'a> {
    /// Offset of the tag.
    pub offset: usize,
    pub tag: ChunkTag,
    /// `None` for bare markers (`fram`, and `INFO` in lenient mode).
    pub length: Option<u32>,
    /// Offset of the first payload byte.
    pub payload_offset: usize,
    /// Empty for markers and for `LIST`, whose contents are walked separately.
    pub payload: &'a [u8],
    /// Pad bytes skipped after the payload (0 or 1).
    pub padding: usize,
}

/// Lazy walk over the chunks that follow the RIFF preamble.
///
/// Each item advances the position by at least four bytes, so the walk
/// always ends. After an error the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct AniChunks<'a> {
    src: ByteCursor<'a>,
    word_aligned: bool,
    lenient: bool,
    failed: bool,
}

impl<'a> AniChunks<'a> {
    /// Validate the preamble and position the walk after it.
    pub fn new(data: &'a [u8], config: &DecodeConfig) -> Result<(RiffPreamble, Self)> {
        let mut src = ByteCursor::new(data);
        let preamble = RiffPreamble::read(&mut src)?;
        let chunks = Self {
            src,
            word_aligned: config.word_aligned_chunks,
            lenient: config.lenient,
            failed: false,
        };
        Ok((preamble, chunks))
    }

    pub fn position(&self) -> usize {
        self.src.position()
    }

    fn next_chunk(&mut self) -> Result<AniChunk<'a>> {
        let offset = self.src.position();
        let raw = match self.src.peek(4) {
            Some(raw) => [raw[0], raw[1], raw[2], raw[3]],
            None => return Err(self.unexpected(offset)),
        };
        let tag = ChunkTag::from(raw);
        match tag {
            ChunkTag::Frame => self.marker(offset, tag),
            ChunkTag::Info if self.lenient => self.marker(offset, tag),
            ChunkTag::List => {
                self.src.skip(4, "LIST tag")?;
                let length = self.src.read_u32_le("LIST length")?;
                debug!("found 'LIST' at {offset} [length={length}]");
                Ok(AniChunk {
                    offset,
                    tag,
                    length: Some(length),
                    payload_offset: self.src.position(),
                    payload: &[],
                    padding: 0,
                })
            },
            _ if tag.is_sized() => self.sized(offset, tag),
            ChunkTag::Unknown(fourcc) if self.lenient && fourcc.is_printable() => {
                let chunk = self.sized(offset, tag)?;
                warn!("skipping unknown chunk '{fourcc}' at {offset} ({} bytes)", chunk.payload.len());
                Ok(chunk)
            },
            _ => Err(self.unexpected(offset)),
        }
    }

    fn marker(&mut self, offset: usize, tag: ChunkTag) -> Result<AniChunk<'a>> {
        self.src.skip(4, "marker")?;
        debug!("found '{:?}' at {offset}", tag);
        Ok(AniChunk {
            offset,
            tag,
            length: None,
            payload_offset: self.src.position(),
            payload: &[],
            padding: 0,
        })
    }

    fn sized(&mut self, offset: usize, tag: ChunkTag) -> Result<AniChunk<'a>> {
        self.src.skip(4, "chunk tag")?;
        let length = self.src.read_u32_le("chunk length")?;
        debug!("found '{:?}' at {offset} [length={length}]", tag);
        if tag == ChunkTag::Header && length != AniHeader::SIZE {
            return Err(Error::InvalidHeaderLength(length));
        }
        let available = self.src.remaining();
        if length.to_usize() > available {
            return Err(Error::TruncatedChunk {
                offset,
                tag: tag.into(),
                declared: length,
                available,
            });
        }
        let payload_offset = self.src.position();
        let payload = self.src.read_bytes(length.to_usize(), "chunk data")?;
        let padding = if self.word_aligned && length % 2 == 1 && !self.src.is_at_end() {
            self.src.skip(1, "pad byte")?;
            1
        } else {
            0
        };
        Ok(AniChunk { offset, tag, length: Some(length), payload_offset, payload, padding })
    }

    fn unexpected(&self, offset: usize) -> Error {
        let byte = self.src.data().get(offset).copied().unwrap_or_default();
        Error::UnexpectedTag { offset, byte }
    }
}

impl<'a> Iterator for AniChunks<'a> {
    type Item = Result<AniChunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.src.is_at_end() {
            return None;
        }
        let chunk = self.next_chunk();
        self.failed = chunk.is_err();
        Some(chunk)
    }
}

/// Tracks icon allocations against the configured limits.
struct ResourceTracker<'a> {
    config: &'a DecodeConfig,
    icon_count: u32,
    icon_bytes: u64,
}

impl<'a> ResourceTracker<'a> {
    fn new(config: &'a DecodeConfig) -> Self {
        Self { config, icon_count: 0, icon_bytes: 0 }
    }

    fn reserve_icon(&mut self, bytes: usize) -> Result<()> {
        self.icon_count = self.icon_count.saturating_add(1);
        if let Some(limit) = self.config.max_icons {
            if self.icon_count > limit {
                return Err(Error::ResourceLimitExceeded("icon count limit exceeded"));
            }
        }

        self.icon_bytes = self.icon_bytes.saturating_add(bytes as u64);
        if let Some(limit) = self.config.peak_memory_limit {
            if self.icon_bytes > limit {
                return Err(Error::ResourceLimitExceeded("peak memory limit exceeded"));
            }
        }

        Ok(())
    }
}

/// Everything decoded from an `.ani` file.
#[derive(Debug)]
pub struct AniFile {
    pub riff_declared_length: u32,
    /// Always `ACON`.
    pub container_tag: FourCC,
    /// Present only if an `anih` chunk was seen.
    pub header: Option<AniHeader>,
    /// Payload of the last `INAM` chunk.
    pub title: Option<TryString>,
    /// Payload of the last `IART` chunk.
    pub artist: Option<TryString>,
    /// Payloads of the `icon` chunks in file order.
    pub icons: TryVec<TryVec<u8>>,
}

impl AniFile {
    /// Decode with strict parsing and no resource limits.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_config(data, &DecodeConfig::unlimited())
    }

    pub fn from_bytes_with_config(data: &[u8], config: &DecodeConfig) -> Result<Self> {
        let (preamble, chunks) = AniChunks::new(data, config)?;
        let mut tracker = ResourceTracker::new(config);
        let mut file = Self {
            riff_declared_length: preamble.declared_length,
            container_tag: preamble.container_tag,
            header: None,
            title: None,
            artist: None,
            icons: TryVec::new(),
        };

        for chunk in chunks {
            let chunk = chunk?;
            match chunk.tag {
                ChunkTag::Name => {
                    if file.title.is_some() {
                        debug!("'INAM' at {} replaces the earlier title", chunk.offset);
                    }
                    file.title = Some(copy_payload(chunk.payload)?);
                },
                ChunkTag::Artist => {
                    if file.artist.is_some() {
                        debug!("'IART' at {} replaces the earlier artist", chunk.offset);
                    }
                    file.artist = Some(copy_payload(chunk.payload)?);
                },
                ChunkTag::Icon => {
                    tracker.reserve_icon(chunk.payload.len())?;
                    file.icons.push(copy_payload(chunk.payload)?)?;
                },
                ChunkTag::Header => file.header = Some(AniHeader::parse(chunk.payload)?),
                ChunkTag::Rate | ChunkTag::Sequence => {
                    debug!("'{:?}' content: '{}'", chunk.tag, chunk.payload.escape_ascii());
                },
                _ => {},
            }
        }

        Ok(file)
    }

    /// Read all of `reader`, then decode from memory.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        Self::from_reader_with_config(reader, &DecodeConfig::unlimited())
    }

    pub fn from_reader_with_config<R: Read>(reader: &mut R, config: &DecodeConfig) -> Result<Self> {
        let mut buf = std::vec::Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::from_bytes_with_config(&buf, config)
    }

    pub fn title_str(&self) -> Option<RawStr<'_>> {
        self.title.as_deref().map(RawStr)
    }

    pub fn artist_str(&self) -> Option<RawStr<'_>> {
        self.artist.as_deref().map(RawStr)
    }

    /// Decode frame `index` as an ICO/CUR buffer.
    ///
    /// `None` if there is no such frame.
    pub fn icon_directory(&self, index: usize) -> Option<Result<IcoFile>> {
        self.icons.get(index).map(|icon| IcoFile::from_bytes(icon))
    }
}

fn copy_payload(payload: &[u8]) -> Result<TryVec<u8>> {
    let mut buf = TryVec::with_capacity(payload.len())?;
    buf.extend_from_slice(payload)?;
    Ok(buf)
}

#[cfg(test)]
fn chunk(tag: &[u8; 4], payload: &[u8]) -> std::vec::Vec<u8> {
    let mut data = tag.to_vec();
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(payload);
    data
}

#[cfg(test)]
fn riff(chunks: &[&[u8]]) -> std::vec::Vec<u8> {
    let body: std::vec::Vec<u8> = chunks.concat();
    let mut data = b"RIFF".to_vec();
    data.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
    data.extend_from_slice(b"ACON");
    data.extend_from_slice(&body);
    data
}

#[test]
fn header_only() {
    let data = riff(&[&chunk(b"anih", &[0; 36])]);
    let ani = AniFile::from_bytes(&data).unwrap();
    assert_eq!(ani.header, Some(AniHeader::default()));
    assert!(ani.icons.is_empty());
    assert!(ani.title.is_none());
    assert!(ani.artist.is_none());
    assert_eq!(ani.container_tag, b"ACON");
}

#[test]
fn header_fields_in_order() {
    let mut payload = std::vec::Vec::new();
    for v in [36u32, 2, 3, 0, 0, 0, 0, 6, AF_ICON | AF_SEQUENCE] {
        payload.extend_from_slice(&v.to_le_bytes());
    }
    let header = AniHeader::parse(&payload).unwrap();
    assert_eq!(header.struct_size, 36);
    assert_eq!(header.frame_count, 2);
    assert_eq!(header.step_count, 3);
    assert_eq!(header.default_rate_jiffies, 6);
    assert_eq!(header.default_rate_ms(), 100);
    assert!(header.is_icon_data());
    assert!(header.has_sequence());
}

#[test]
fn list_length_is_not_a_skip_distance() {
    let icon = chunk(b"icon", b"abc!");
    let data = riff(&[b"LIST\x10\x00\x00\x00fram", &icon, &icon]);
    let chunks: std::vec::Vec<_> = AniChunks::new(&data, &DecodeConfig::unlimited())
        .unwrap()
        .1
        .collect::<Result<_>>()
        .unwrap();
    let tags: std::vec::Vec<_> = chunks.iter().map(|c| c.tag).collect();
    assert_eq!(tags, [ChunkTag::List, ChunkTag::Frame, ChunkTag::Icon, ChunkTag::Icon]);
    assert_eq!(chunks[0].length, Some(16));
    assert_eq!(chunks[1].offset, 20);
    assert_eq!(chunks[2].payload_offset, 32);
}

#[test]
fn zero_length_icon_still_advances() {
    let data = riff(&[&chunk(b"icon", b""), &chunk(b"icon", b"")]);
    let ani = AniFile::from_bytes(&data).unwrap();
    assert_eq!(ani.icons.len(), 2);
    assert!(ani.icons.iter().all(|icon| icon.is_empty()));
}

#[test]
fn last_title_wins() {
    let data = riff(&[&chunk(b"INAM", b"first"), &chunk(b"IART", b"me"), &chunk(b"INAM", b"second")]);
    let ani = AniFile::from_bytes(&data).unwrap();
    assert_eq!(ani.title_str().unwrap(), "second");
    assert_eq!(ani.artist_str().unwrap(), "me");
}

#[test]
fn anih_length_must_be_36() {
    let data = riff(&[&chunk(b"anih", &[0; 32])]);
    match AniFile::from_bytes(&data) {
        Err(Error::InvalidHeaderLength(32)) => {},
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_tag_carries_offset_and_byte() {
    let data = riff(&[&chunk(b"icon", b"xy"), &chunk(b"junk", b"")]);
    match AniFile::from_bytes(&data) {
        Err(Error::UnexpectedTag { offset: 22, byte: b'j' }) => {},
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn riff_tag_inside_body_is_unexpected() {
    let data = riff(&[b"RIFF"]);
    assert!(matches!(AniFile::from_bytes(&data), Err(Error::UnexpectedTag { offset: 12, byte: b'R' })));
}

#[test]
fn trailing_bytes_are_unexpected() {
    let mut data = riff(&[&chunk(b"icon", b"abc")]);
    data.push(0);
    assert!(matches!(AniFile::from_bytes(&data), Err(Error::UnexpectedTag { offset: 23, byte: 0 })));
}

#[test]
fn declared_length_past_end_is_truncated() {
    let mut data = riff(&[&chunk(b"icon", &[7; 10])]);
    data.truncate(data.len() - 4);
    match AniFile::from_bytes(&data) {
        Err(Error::TruncatedChunk { offset: 12, tag, declared: 10, available: 6 }) => assert_eq!(tag, b"icon"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn missing_length_field_is_out_of_bounds() {
    let data = riff(&[b"icon\x01"]);
    assert!(matches!(
        AniFile::from_bytes(&data),
        Err(Error::OutOfBounds { offset: 16, field: "chunk length", .. })
    ));
}

#[test]
fn bad_magic() {
    let mut data = riff(&[]);
    data[8..12].copy_from_slice(b"ACOX");
    match AniFile::from_bytes(&data) {
        Err(Error::InvalidMagic { offset: 8, expected, found }) => {
            assert_eq!(expected, b"ACON");
            assert_eq!(&found[..], b"ACOX");
        },
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(AniFile::from_bytes(b"RIFX\0\0\0\0ACON"), Err(Error::InvalidMagic { offset: 0, .. })));
}

#[test]
fn short_preamble_is_bad_magic() {
    match AniFile::from_bytes(b"RIF") {
        Err(Error::InvalidMagic { offset: 0, expected, found }) => {
            assert_eq!(expected, b"RIFF");
            assert_eq!(&found[..], b"RIF");
        },
        other => panic!("unexpected {other:?}"),
    }
    match AniFile::from_bytes(b"RIFF\x04\0\0") {
        Err(Error::InvalidMagic { offset: 0, expected, found }) => {
            assert_eq!(expected, b"RIFF");
            assert_eq!(&found[..], b"RIFF\x04\0\0");
        },
        other => panic!("unexpected {other:?}"),
    }
    match AniFile::from_bytes(b"RIFF\x04\0\0\0AC") {
        Err(Error::InvalidMagic { offset: 8, expected, found }) => {
            assert_eq!(expected, b"ACON");
            assert_eq!(&found[..], b"AC");
        },
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(AniFile::from_bytes(b""), Err(Error::InvalidMagic { offset: 0, .. })));
    assert!(matches!(crate::describe_ani(b"RIFF\0\0\0\0").err(), Some(Error::InvalidMagic { offset: 8, .. })));
}

#[test]
fn pad_bytes_need_word_alignment() {
    let data = riff(&[&chunk(b"icon", b"odd"), b"\0", &chunk(b"icon", b"even")]);
    assert!(matches!(AniFile::from_bytes(&data), Err(Error::UnexpectedTag { byte: 0, .. })));

    let config = DecodeConfig::unlimited().with_word_aligned_chunks(true);
    let ani = AniFile::from_bytes_with_config(&data, &config).unwrap();
    assert_eq!(ani.icons.len(), 2);
    assert_eq!(&ani.icons[1][..], b"even");
}

#[test]
fn lenient_skips_info_and_unknown_chunks() {
    let data = riff(&[b"LIST\x14\x00\x00\x00INFO", &chunk(b"ICOP", b"(c)"), &chunk(b"INAM", b"t"), &chunk(b"icon", b"")]);
    assert!(matches!(AniFile::from_bytes(&data), Err(Error::UnexpectedTag { offset: 20, byte: b'I' })));

    let ani = AniFile::from_bytes_with_config(&data, &DecodeConfig::unlimited().lenient(true)).unwrap();
    assert_eq!(ani.title_str().unwrap(), "t");
    assert_eq!(ani.icons.len(), 1);
}

#[test]
fn icon_limits() {
    let data = riff(&[&chunk(b"icon", &[1; 8]), &chunk(b"icon", &[2; 8])]);
    let config = DecodeConfig::unlimited().with_max_icons(1);
    assert!(matches!(
        AniFile::from_bytes_with_config(&data, &config),
        Err(Error::ResourceLimitExceeded("icon count limit exceeded"))
    ));
    let config = DecodeConfig::unlimited().with_peak_memory_limit(12);
    assert!(matches!(
        AniFile::from_bytes_with_config(&data, &config),
        Err(Error::ResourceLimitExceeded("peak memory limit exceeded"))
    ));
    assert_eq!(AniFile::from_bytes_with_config(&data, &DecodeConfig::default()).unwrap().icons.len(), 2);
}
