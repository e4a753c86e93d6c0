//! Bounds-checked reads over a borrowed byte buffer.
//!
//! Every multi-byte field in ICO and ANI files is little-endian. PNG stores
//! its chunk lengths big-endian; those are read little-endian and flipped
//! with [`swap_endian32`].

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

use crate::fourcc::FourCC;
use crate::{Error, Result};

/// Borrow `len` bytes at `pos`, or describe which `field` ran off the end.
pub(crate) fn span<'a>(data: &'a [u8], pos: usize, len: usize, field: &'static str) -> Result<&'a [u8]> {
    pos.checked_add(len)
        .and_then(|end| data.get(pos..end))
        .ok_or(Error::OutOfBounds { offset: pos, len, field })
}

/// Read a little-endian `u32` at `pos`.
pub fn read_u32_le(data: &[u8], pos: usize) -> Result<u32> {
    span(data, pos, 4, "u32").map(LittleEndian::read_u32)
}

/// Read a little-endian `u16` at `pos`.
pub fn read_u16_le(data: &[u8], pos: usize) -> Result<u16> {
    span(data, pos, 2, "u16").map(LittleEndian::read_u16)
}

/// Read `len` bytes at `pos` as raw characters.
pub fn read_fixed_string(data: &[u8], pos: usize, len: usize) -> Result<RawStr<'_>> {
    span(data, pos, len, "string").map(RawStr)
}

/// Reverse the byte order of a 32-bit value.
#[inline]
pub const fn swap_endian32(x: u32) -> u32 {
    x.swap_bytes()
}

/// Text read straight from the file.
///
/// Bytes are not validated against any encoding; each one is shown as the
/// character with the same code point (Latin-1), so nothing is lost or
/// replaced when it is printed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawStr<'a>(pub &'a [u8]);

impl RawStr<'_> {
    pub fn as_bytes(&self) -> &[u8] {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RawStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write as _;
        for &b in self.0 {
            f.write_char(char::from(b))?;
        }
        Ok(())
    }
}

impl fmt::Debug for RawStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}

impl PartialEq<str> for RawStr<'_> {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for RawStr<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

/// A read position over a borrowed buffer.
///
/// The position only moves forward. Every read names the field it is
/// reading so an [`Error::OutOfBounds`] points at the exact spot.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Start reading at `pos` (which may be past the end; reads then fail).
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Look at the next `len` bytes without consuming them.
    pub fn peek(&self, len: usize) -> Option<&'a [u8]> {
        self.pos.checked_add(len).and_then(|end| self.data.get(self.pos..end))
    }

    pub fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<&'a [u8]> {
        let bytes = span(self.data, self.pos, len, field)?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize, field: &'static str) -> Result<()> {
        self.read_bytes(len, field).map(drop)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.read_bytes(1, field)?[0])
    }

    pub fn read_u16_le(&mut self, field: &'static str) -> Result<u16> {
        self.read_bytes(2, field).map(LittleEndian::read_u16)
    }

    pub fn read_u32_le(&mut self, field: &'static str) -> Result<u32> {
        self.read_bytes(4, field).map(LittleEndian::read_u32)
    }

    /// Read a big-endian `u32` (PNG chunk lengths and CRCs).
    pub fn read_u32_be(&mut self, field: &'static str) -> Result<u32> {
        self.read_u32_le(field).map(swap_endian32)
    }

    pub fn read_fourcc(&mut self, field: &'static str) -> Result<FourCC> {
        let bytes = self.read_bytes(4, field)?;
        Ok(FourCC::from([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[test]
fn read_le_integers() {
    let data = [0x78, 0x56, 0x34, 0x12, 0xff];
    assert_eq!(read_u32_le(&data, 0).unwrap(), 0x1234_5678);
    assert_eq!(read_u16_le(&data, 3).unwrap(), 0xff12);
    assert_eq!(read_u32_le(&data, 1).unwrap(), 0xff12_3456);
}

#[test]
fn read_past_end_reports_offset() {
    let data = [1, 2, 3];
    match read_u32_le(&data, 0) {
        Err(Error::OutOfBounds { offset: 0, len: 4, field: "u32" }) => {},
        other => panic!("unexpected {other:?}"),
    }
    assert!(read_u16_le(&data, 2).is_err());
    assert!(read_u16_le(&data, usize::MAX).is_err());
    assert!(read_fixed_string(&data, 1, 3).is_err());
}

#[test]
fn fixed_string_passes_bytes_through() {
    let data = b"xxHi\xe9\x01";
    let s = read_fixed_string(data, 2, 4).unwrap();
    assert_eq!(s.len(), 4);
    assert_eq!(s.to_string(), "Hi\u{e9}\u{1}");
    assert_eq!(read_fixed_string(data, 2, 2).unwrap(), "Hi");
    assert!(read_fixed_string(data, 6, 0).unwrap().is_empty());
}

#[test]
fn swap_endian_is_an_involution() {
    for x in [0, 1, 0x0000_000d, 0x1234_5678, 0xdead_beef, u32::MAX] {
        assert_eq!(swap_endian32(swap_endian32(x)), x);
    }
    assert_eq!(swap_endian32(0x0d00_0000), 13);
}

#[test]
fn cursor_advances_and_names_fields() {
    let data = [b'a', b'n', b'i', b'h', 36, 0, 0, 0, 0, 0, 0, 13];
    let mut c = ByteCursor::new(&data);
    assert_eq!(c.read_fourcc("tag").unwrap(), b"anih");
    assert_eq!(c.read_u32_le("length").unwrap(), 36);
    assert_eq!(c.position(), 8);
    assert_eq!(c.read_u32_be("crc").unwrap(), 13);
    assert!(c.is_at_end());
    match c.read_u8("trailer") {
        Err(Error::OutOfBounds { offset: 12, len: 1, field: "trailer" }) => {},
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(c.position(), 12);
}
