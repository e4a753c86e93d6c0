//! Decode-and-narrate: every field of a file as an offset, size, label and
//! rendering.
//!
//! The narrators wrap the decoders rather than duplicating them. They borrow
//! the input buffer and produce records lazily, so a caller can stop at the
//! first record it cares about. Rendering the records as text is left to
//! [`crate::Table`].

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use arrayvec::ArrayVec;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::borrow::Cow;
use std::fmt;

use crate::ani::{AniChunk, AniChunks, AniHeader, RiffPreamble};
use crate::fourcc::ChunkTag;
use crate::ico::{DirectoryEntry, IcoFile};
use crate::png::{PNG_SIGNATURE, PngChunkRecord, PngWalk, Signature, walk_png};
use crate::{DecodeConfig, Result, ToUsize};

/// How the bytes of a typed record are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Each byte as a character.
    Char,
    /// Each byte as a decimal number.
    Int,
    U16Le,
    U32Le,
    U32Be,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Char => "char",
            ValueKind::Int => "int",
            ValueKind::U16Le => "16Bit unsigned int",
            ValueKind::U32Le => "32Bit unsigned int",
            ValueKind::U32Be => "32Bit unsigned int BE",
        }
    }

    fn width(self) -> Option<usize> {
        match self {
            ValueKind::Char | ValueKind::Int => None,
            ValueKind::U16Le => Some(2),
            ValueKind::U32Le | ValueKind::U32Be => Some(4),
        }
    }
}

/// What the data column shows for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendering<'a> {
    /// Nothing; used for opaque payloads.
    Hidden,
    /// The bytes as decimals, uninterpreted.
    RawBytesOnly(&'a [u8]),
    /// The bytes as decimals followed by their value.
    Typed(ValueKind, &'a [u8]),
}

impl<'a> Rendering<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        match *self {
            Rendering::Hidden => &[],
            Rendering::RawBytesOnly(bytes) | Rendering::Typed(_, bytes) => bytes,
        }
    }

    pub fn kind(&self) -> Option<ValueKind> {
        match *self {
            Rendering::Typed(kind, _) => Some(kind),
            _ => None,
        }
    }
}

struct Decimals<'a>(&'a [u8]);

impl fmt::Display for Decimals<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b}")?;
        }
        Ok(())
    }
}

struct Chars<'a>(&'a [u8]);

impl fmt::Display for Chars<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", char::from(b))?;
        }
        Ok(())
    }
}

impl fmt::Display for Rendering<'_> {
    /// `'137 80' -> '20617' (16Bit unsigned int)` for typed values,
    /// `'1 2 3'` for raw bytes and nothing for hidden ones.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Rendering::Hidden => Ok(()),
            Rendering::RawBytesOnly(bytes) => write!(f, "'{}'", Decimals(bytes)),
            Rendering::Typed(kind, bytes) => {
                write!(f, "'{}' -> '", Decimals(bytes))?;
                match kind {
                    ValueKind::Char => write!(f, "{}", Chars(bytes))?,
                    ValueKind::Int => write!(f, "{}", Decimals(bytes))?,
                    ValueKind::U16Le if bytes.len() >= 2 => write!(f, "{}", LittleEndian::read_u16(bytes))?,
                    ValueKind::U32Le if bytes.len() >= 4 => write!(f, "{}", LittleEndian::read_u32(bytes))?,
                    ValueKind::U32Be if bytes.len() >= 4 => write!(f, "{}", BigEndian::read_u32(bytes))?,
                    _ => f.write_str("?")?,
                }
                write!(f, "' ({})", kind.name())
            },
        }
    }
}

/// One field of a file: where it is, how big, what it means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord<'a> {
    pub offset: usize,
    pub len: usize,
    pub label: Cow<'static, str>,
    pub rendering: Rendering<'a>,
}

impl<'a> DiagnosticRecord<'a> {
    /// A record whose bytes are shown as `kind`.
    ///
    /// Falls back to [`Rendering::Hidden`] if the span is not in `data` or
    /// is too short for `kind`.
    pub fn typed(
        data: &'a [u8],
        offset: usize,
        len: usize,
        label: impl Into<Cow<'static, str>>,
        kind: ValueKind,
    ) -> Self {
        let rendering = match bytes_at(data, offset, len) {
            Some(bytes) if kind.width().map_or(true, |w| bytes.len() >= w) => Rendering::Typed(kind, bytes),
            _ => Rendering::Hidden,
        };
        Self { offset, len, label: label.into(), rendering }
    }

    /// A record whose bytes are shown without interpretation.
    pub fn raw(data: &'a [u8], offset: usize, len: usize, label: impl Into<Cow<'static, str>>) -> Self {
        let rendering = bytes_at(data, offset, len).map_or(Rendering::Hidden, Rendering::RawBytesOnly);
        Self { offset, len, label: label.into(), rendering }
    }

    pub fn hidden(offset: usize, len: usize, label: impl Into<Cow<'static, str>>) -> Self {
        Self { offset, len, label: label.into(), rendering: Rendering::Hidden }
    }
}

fn bytes_at(data: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    data.get(offset..offset.checked_add(len)?)
}

/// Records of an ANI file, in file order.
///
/// Yields an error and stops where [`crate::AniFile`] decoding would fail;
/// every record before that point is still produced.
pub struct AniNarration<'a> {
    data: &'a [u8],
    chunks: AniChunks<'a>,
    pending: arrayvec::IntoIter<DiagnosticRecord<'a>, 12>,
    counter: usize,
}

/// Narrate an ANI buffer with strict parsing.
///
/// Fails up front if the `RIFF`/`ACON` preamble is missing.
pub fn describe_ani(data: &[u8]) -> Result<AniNarration<'_>> {
    describe_ani_with_config(data, &DecodeConfig::unlimited())
}

pub fn describe_ani_with_config<'a>(data: &'a [u8], config: &DecodeConfig) -> Result<AniNarration<'a>> {
    let (_, chunks) = AniChunks::new(data, config)?;
    let mut pending = ArrayVec::new();
    pending.push(DiagnosticRecord::typed(data, 0, 4, "RIFF", ValueKind::Char));
    pending.push(DiagnosticRecord::typed(data, 4, 4, "fileSize", ValueKind::U32Le));
    pending.push(DiagnosticRecord::typed(data, 8, 4, "ACON", ValueKind::Char));
    debug_assert_eq!(pending.iter().map(|r| r.len).sum::<usize>(), RiffPreamble::SIZE);
    Ok(AniNarration { data, chunks, pending: pending.into_iter(), counter: 0 })
}

impl<'a> AniNarration<'a> {
    fn records_for(&self, chunk: &AniChunk<'a>) -> ArrayVec<DiagnosticRecord<'a>, 12> {
        let n = self.counter;
        let data = self.data;
        let mut records = ArrayVec::new();
        records.push(DiagnosticRecord::typed(data, chunk.offset, 4, format!("chunk id #{n}"), ValueKind::Char));
        if chunk.length.is_some() {
            records.push(DiagnosticRecord::typed(
                data,
                chunk.offset + 4,
                4,
                format!("chunk size #{n}"),
                ValueKind::U32Le,
            ));
        }

        let at = chunk.payload_offset;
        let len = chunk.payload.len();
        match chunk.tag {
            ChunkTag::Header => {
                for (i, name) in AniHeader::FIELD_NAMES.into_iter().enumerate() {
                    records.push(DiagnosticRecord::typed(data, at + 4 * i, 4, name, ValueKind::U32Le));
                }
            },
            ChunkTag::Name | ChunkTag::Artist | ChunkTag::Rate | ChunkTag::Sequence => {
                records.push(DiagnosticRecord::typed(data, at, len, format!("chunk data #{n}"), ValueKind::Char));
            },
            ChunkTag::List | ChunkTag::Frame | ChunkTag::Info => {},
            _ => records.push(DiagnosticRecord::hidden(at, len, format!("chunk data #{n}"))),
        }

        if chunk.padding > 0 {
            records.push(DiagnosticRecord::raw(data, at + len, chunk.padding, format!("pad byte #{n}")));
        }
        records
    }
}

impl<'a> Iterator for AniNarration<'a> {
    type Item = Result<DiagnosticRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.next() {
                return Some(Ok(record));
            }
            let chunk = match self.chunks.next()? {
                Ok(chunk) => chunk,
                Err(err) => return Some(Err(err)),
            };
            self.pending = self.records_for(&chunk).into_iter();
            self.counter += 1;
        }
    }
}

const ICO_HEADER_RECORDS: usize = 3;
const ICO_ENTRY_RECORDS: usize = 8;

/// Records of an ICO/CUR file: header, directory, then one hidden record
/// per image.
pub struct IcoNarration<'a> {
    data: &'a [u8],
    ico: IcoFile,
    step: usize,
}

/// Narrate an ICO/CUR buffer. Fails if the directory cannot be decoded.
pub fn describe_ico(data: &[u8]) -> Result<IcoNarration<'_>> {
    let ico = IcoFile::from_bytes(data)?;
    Ok(IcoNarration { data, ico, step: 0 })
}

impl IcoNarration<'_> {
    /// The decoded directory the records describe.
    pub fn ico(&self) -> &IcoFile {
        &self.ico
    }

    fn total(&self) -> usize {
        ICO_HEADER_RECORDS + self.ico.image_count() * (ICO_ENTRY_RECORDS + 1)
    }
}

fn entry_record(data: &[u8], index: usize, field: usize) -> DiagnosticRecord<'_> {
    const FIELDS: [(&str, usize, usize, ValueKind); ICO_ENTRY_RECORDS] = [
        ("width", 0, 1, ValueKind::Int),
        ("height", 1, 1, ValueKind::Int),
        ("colorCount", 2, 1, ValueKind::Int),
        ("reserved", 3, 1, ValueKind::Int),
        ("planes", 4, 2, ValueKind::U16Le),
        ("bitCount", 6, 2, ValueKind::U16Le),
        ("bytesInRes", 8, 4, ValueKind::U32Le),
        ("imageOffset", 12, 4, ValueKind::U32Le),
    ];
    let (name, at, len, kind) = FIELDS[field];
    let entry_offset = IcoFile::HEADER_SIZE + index * DirectoryEntry::SIZE;
    DiagnosticRecord::typed(data, entry_offset + at, len, format!("{name} image #{index}"), kind)
}

impl<'a> Iterator for IcoNarration<'a> {
    type Item = DiagnosticRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let step = self.step;
        if step >= self.total() {
            return None;
        }
        self.step += 1;

        let data = self.data;
        let entries = self.ico.image_count() * ICO_ENTRY_RECORDS;
        let record = match step {
            0 => DiagnosticRecord::typed(data, 0, 2, "reserved", ValueKind::U16Le),
            1 => DiagnosticRecord::typed(data, 2, 2, "imageType", ValueKind::U16Le),
            2 => DiagnosticRecord::typed(data, 4, 2, "imageCount", ValueKind::U16Le),
            s if s - ICO_HEADER_RECORDS < entries => {
                let s = s - ICO_HEADER_RECORDS;
                entry_record(data, s / ICO_ENTRY_RECORDS, s % ICO_ENTRY_RECORDS)
            },
            s => {
                let index = s - ICO_HEADER_RECORDS - entries;
                let entry = self.ico.directory[index];
                DiagnosticRecord::hidden(
                    entry.data_offset.to_usize(),
                    entry.data_size.to_usize(),
                    format!("image data #{index}"),
                )
            },
        };
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total() - self.step;
        (left, Some(left))
    }
}

impl ExactSizeIterator for IcoNarration<'_> {}

/// Records of a PNG stream starting at a given offset.
///
/// Yields nothing when the signature check failed; look at
/// [`PngNarration::signature`] to tell why.
pub struct PngNarration<'a> {
    data: &'a [u8],
    walk: PngWalk,
    next_chunk: usize,
    pending: arrayvec::IntoIter<DiagnosticRecord<'a>, 4>,
}

/// Walk the PNG stream at `start` and narrate it.
///
/// Only fails when out of memory; malformed input shows up in
/// [`PngNarration::walk`].
pub fn describe_png(data: &[u8], start: usize) -> Result<PngNarration<'_>> {
    let walk = walk_png(data, start)?;
    let mut pending = ArrayVec::new();
    if walk.signature == Signature::Valid {
        pending.push(DiagnosticRecord::raw(data, start, PNG_SIGNATURE.len(), "PNG signature"));
    }
    Ok(PngNarration { data, walk, next_chunk: 0, pending: pending.into_iter() })
}

impl<'a> PngNarration<'a> {
    pub fn signature(&self) -> Signature {
        self.walk.signature
    }

    pub fn walk(&self) -> &PngWalk {
        &self.walk
    }

    fn records_for(data: &'a [u8], chunk: &PngChunkRecord) -> ArrayVec<DiagnosticRecord<'a>, 4> {
        let mut records = ArrayVec::new();
        records.push(DiagnosticRecord::typed(
            data,
            chunk.offset,
            4,
            "chunk size (only data)",
            ValueKind::U32Be,
        ));
        records.push(DiagnosticRecord::typed(data, chunk.offset + 4, 4, "chunk type", ValueKind::Char));
        if chunk.declared_length > 0 {
            records.push(DiagnosticRecord::hidden(chunk.payload.start, chunk.payload.len(), "chunk data"));
        }
        if chunk.has_trailing_crc() {
            records.push(DiagnosticRecord::raw(data, chunk.crc_offset(), 4, "crc (Cyclic Redundancy Check)"));
        }
        records
    }
}

impl<'a> Iterator for PngNarration<'a> {
    type Item = DiagnosticRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.next() {
                return Some(record);
            }
            let chunk = self.walk.chunks.get(self.next_chunk)?;
            self.pending = Self::records_for(self.data, chunk).into_iter();
            self.next_chunk += 1;
        }
    }
}


#[cfg(test)]
fn labels<'a>(records: impl IntoIterator<Item = DiagnosticRecord<'a>>) -> std::vec::Vec<std::string::String> {
    records.into_iter().map(|r| r.label.into_owned()).collect()
}

#[test]
fn typed_rendering() {
    let data = [0x24, 0, 0, 0, b'a', b'n', 0, 0, 0, 13];
    let r = DiagnosticRecord::typed(&data, 0, 4, "cbSizeOf", ValueKind::U32Le);
    assert_eq!(r.rendering.to_string(), "'36 0 0 0' -> '36' (32Bit unsigned int)");
    let r = DiagnosticRecord::typed(&data, 4, 2, "id", ValueKind::Char);
    assert_eq!(r.rendering.to_string(), "'97 110' -> 'a n' (char)");
    let r = DiagnosticRecord::typed(&data, 6, 4, "length", ValueKind::U32Be);
    assert_eq!(r.rendering.to_string(), "'0 0 0 13' -> '13' (32Bit unsigned int BE)");
    let r = DiagnosticRecord::typed(&data, 4, 2, "planes", ValueKind::U16Le);
    assert_eq!(r.rendering.to_string(), "'97 110' -> '28257' (16Bit unsigned int)");
    let r = DiagnosticRecord::typed(&data, 0, 1, "width", ValueKind::Int);
    assert_eq!(r.rendering.to_string(), "'36' -> '36' (int)");
    let r = DiagnosticRecord::raw(&data, 7, 3, "crc");
    assert_eq!(r.rendering.to_string(), "'0 0 13'");
    assert_eq!(DiagnosticRecord::hidden(0, 10, "data").rendering.to_string(), "");
}

#[test]
fn out_of_range_records_are_hidden() {
    let data = [1, 2, 3];
    assert_eq!(DiagnosticRecord::typed(&data, 0, 4, "x", ValueKind::U32Le).rendering, Rendering::Hidden);
    assert_eq!(DiagnosticRecord::typed(&data, 0, 2, "x", ValueKind::U32Le).rendering, Rendering::Hidden);
    assert_eq!(DiagnosticRecord::raw(&data, usize::MAX, 2, "x").rendering, Rendering::Hidden);
    assert_eq!(Rendering::Typed(ValueKind::U16Le, &[1]).to_string(), "'1' -> '?' (16Bit unsigned int)");
}

#[cfg(test)]
fn ani_fixture() -> std::vec::Vec<u8> {
    let mut data = b"RIFF\0\0\0\0ACON".to_vec();
    data.extend_from_slice(b"INAM\x02\0\0\0hi");
    data.extend_from_slice(b"LIST\x0c\0\0\0fram");
    data.extend_from_slice(b"icon\x03\0\0\0abc");
    data.extend_from_slice(b"anih\x24\0\0\0");
    for v in [36u32, 1, 1, 0, 0, 0, 0, 10, 1] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    let len = (data.len() - 8) as u32;
    data[4..8].copy_from_slice(&len.to_le_bytes());
    data
}

#[test]
fn ani_records_follow_the_chunks() {
    let data = ani_fixture();
    let records = describe_ani(&data).unwrap().collect::<Result<std::vec::Vec<_>>>().unwrap();
    let mut expected: std::vec::Vec<std::string::String> = [
        "RIFF", "fileSize", "ACON",
        "chunk id #0", "chunk size #0", "chunk data #0",
        "chunk id #1", "chunk size #1",
        "chunk id #2",
        "chunk id #3", "chunk size #3", "chunk data #3",
        "chunk id #4", "chunk size #4",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    expected.extend(AniHeader::FIELD_NAMES.iter().map(|s| s.to_string()));
    assert_eq!(labels(records.iter().cloned()), expected);

    assert_eq!(records[5].rendering.to_string(), "'104 105' -> 'h i' (char)");
    assert_eq!(records[5].offset, 20);
    assert_eq!(records[11].rendering, Rendering::Hidden);
    assert_eq!((records[11].offset, records[11].len), (42, 3));
    let jif_rate = &records[14 + 7];
    assert_eq!(jif_rate.offset, 53 + 28);
    assert_eq!(jif_rate.rendering.to_string(), "'10 0 0 0' -> '10' (32Bit unsigned int)");
}

#[test]
fn ani_narration_stops_at_the_error() {
    let mut data = ani_fixture();
    data.truncate(48);
    let mut narration = describe_ani(&data).unwrap();
    let ok = narration.by_ref().take_while(|r| r.is_ok()).count();
    assert_eq!(ok, 12);
    assert!(narration.next().is_none());

    assert!(describe_ani(b"RIFF\0\0\0\0AVI ").is_err());
}

#[test]
fn ani_pad_bytes_are_shown() {
    let mut data = b"RIFF\x14\0\0\0ACON".to_vec();
    data.extend_from_slice(b"icon\x01\0\0\0x\0");
    data.extend_from_slice(b"fram");
    let config = DecodeConfig::unlimited().with_word_aligned_chunks(true);
    let records = describe_ani_with_config(&data, &config).unwrap().collect::<Result<std::vec::Vec<_>>>().unwrap();
    let pad = records.iter().find(|r| r.label == "pad byte #0").unwrap();
    assert_eq!(pad.offset, 21);
    assert_eq!(pad.rendering, Rendering::RawBytesOnly(&[0]));
}

#[test]
fn ico_records() {
    let mut data = std::vec::Vec::new();
    data.extend_from_slice(&[0, 0, 2, 0, 1, 0]);
    data.extend_from_slice(&[32, 32, 0, 0, 5, 0, 7, 0]);
    data.extend_from_slice(&4u32.to_le_bytes());
    data.extend_from_slice(&22u32.to_le_bytes());
    data.extend_from_slice(b"DIB!");

    let narration = describe_ico(&data).unwrap();
    assert_eq!(narration.len(), 12);
    assert_eq!(narration.ico().image_count(), 1);
    let records: std::vec::Vec<_> = narration.collect();
    assert_eq!(
        labels(records.iter().cloned()),
        [
            "reserved", "imageType", "imageCount",
            "width image #0", "height image #0", "colorCount image #0", "reserved image #0",
            "planes image #0", "bitCount image #0", "bytesInRes image #0", "imageOffset image #0",
            "image data #0",
        ]
    );
    assert_eq!(records[1].rendering.to_string(), "'2 0' -> '2' (16Bit unsigned int)");
    assert_eq!(records[7].offset, 10);
    assert_eq!(records[7].rendering.to_string(), "'5 0' -> '5' (16Bit unsigned int)");
    assert_eq!((records[11].offset, records[11].len), (22, 4));
    assert!(describe_ico(&data[..10]).is_err());
}

#[test]
fn png_records() {
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend_from_slice(&[0, 0, 0, 2]);
    data.extend_from_slice(b"tEXt");
    data.extend_from_slice(b"ab");
    data.extend_from_slice(&[1, 2, 3, 4]);
    data.extend_from_slice(&[0, 0, 0, 0]);
    data.extend_from_slice(b"IEND");
    data.extend_from_slice(&[0xae, 0x42, 0x60, 0x82]);

    let narration = describe_png(&data, 0).unwrap();
    assert_eq!(narration.signature(), Signature::Valid);
    let records: std::vec::Vec<_> = narration.collect();
    assert_eq!(
        labels(records.iter().cloned()),
        [
            "PNG signature",
            "chunk size (only data)", "chunk type", "chunk data", "crc (Cyclic Redundancy Check)",
            "chunk size (only data)", "chunk type", "crc (Cyclic Redundancy Check)",
        ]
    );
    assert_eq!(records[0].rendering.to_string(), "'137 80 78 71 13 10 26 10'");
    assert_eq!(records[2].rendering.to_string(), "'116 69 88 116' -> 't E X t' (char)");
    assert_eq!(records[7].offset, 30);

    let narration = describe_png(b"nope", 0).unwrap();
    assert_eq!(narration.signature(), Signature::TooShort);
    assert_eq!(narration.count(), 0);
}
