//! Icon and cursor containers (`.ico` / `.cur`).
//!
//! All values are little-endian:
//!
//! | Offset | Size | Field                                  |
//! |--------|------|----------------------------------------|
//! | 0      | 2    | reserved (should be 0)                 |
//! | 2      | 2    | image type: 1 = icon, 2 = cursor       |
//! | 4      | 2    | image count                            |
//! | 6      | 16×n | directory entries                      |
//!
//! Each directory entry is `width, height, colorCount, reserved` (one byte
//! each), `planes, bitCount` (two bytes each, the hotspot in cursor files),
//! then `dataSize` and `dataOffset` (four bytes each). The image data is
//! either a PNG stream or a headerless DIB; both are left opaque.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::{debug, warn};
use std::io::Read;
use std::ops::Range;

use crate::cursor::ByteCursor;
use crate::png::PNG_SIGNATURE;
use crate::{Error, Result, ToUsize, TryVec};

/// The type of resource stored in an ICO file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Plain images
    Icon,
    /// Images with cursor hotspots
    Cursor,
}

impl ResourceType {
    pub fn from_number(number: u16) -> Option<ResourceType> {
        match number {
            1 => Some(ResourceType::Icon),
            2 => Some(ResourceType::Cursor),
            _ => None,
        }
    }

    pub fn number(self) -> u16 {
        match self {
            ResourceType::Icon => 1,
            ResourceType::Cursor => 2,
        }
    }
}

/// How an entry's image data is encoded, judged from its first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    /// Anything without a PNG signature; normally a BITMAPINFOHEADER DIB.
    Dib,
}

impl ImageFormat {
    pub fn sniff(image: &[u8]) -> ImageFormat {
        if image.starts_with(&PNG_SIGNATURE) {
            ImageFormat::Png
        } else {
            ImageFormat::Dib
        }
    }
}

/// One 16-byte record of the icon directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectoryEntry {
    pub width: u8,
    pub height: u8,
    pub color_count: u8,
    pub reserved: u8,
    pub planes: u16,
    pub bit_count: u16,
    pub data_size: u32,
    pub data_offset: u32,
}

impl DirectoryEntry {
    pub const SIZE: usize = 16;

    fn read(src: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            width: src.read_u8("width")?,
            height: src.read_u8("height")?,
            color_count: src.read_u8("colorCount")?,
            reserved: src.read_u8("reserved")?,
            planes: src.read_u16_le("planes")?,
            bit_count: src.read_u16_le("bitCount")?,
            data_size: src.read_u32_le("bytesInRes")?,
            data_offset: src.read_u32_le("imageOffset")?,
        })
    }

    /// Width in pixels; a stored 0 means 256.
    pub fn pixel_width(&self) -> u32 {
        match self.width {
            0 => 256,
            w => u32::from(w),
        }
    }

    /// Height in pixels; a stored 0 means 256.
    pub fn pixel_height(&self) -> u32 {
        match self.height {
            0 => 256,
            h => u32::from(h),
        }
    }

    /// Cursor files keep the hotspot where icons keep planes and bit count.
    pub fn hotspot(&self) -> (u16, u16) {
        (self.planes, self.bit_count)
    }

    /// `dataOffset..dataOffset + dataSize`, or `None` if that overflows.
    pub fn data_range(&self) -> Option<Range<usize>> {
        let start = self.data_offset.to_usize();
        let end = start.checked_add(self.data_size.to_usize())?;
        Some(start..end)
    }
}

/// Header and directory of an ICO or CUR file.
///
/// The image data stays in the caller's buffer; [`IcoFile::image_data`]
/// resolves an entry against it and only then checks the bounds.
#[derive(Debug)]
pub struct IcoFile {
    pub reserved: u16,
    /// Recorded as found. Values other than 1 and 2 are kept, not rejected.
    pub image_type: u16,
    pub directory: TryVec<DirectoryEntry>,
}

impl IcoFile {
    pub const HEADER_SIZE: usize = 6;

    /// Decode the header and directory of an ICO/CUR buffer.
    ///
    /// Fails with [`Error::OutOfBounds`] when the buffer cannot hold the
    /// header plus `imageCount` directory entries.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut src = ByteCursor::new(data);
        let reserved = src.read_u16_le("reserved")?;
        let image_type = src.read_u16_le("imageType")?;
        let image_count = src.read_u16_le("imageCount")?.to_usize();
        debug!("ico: reserved={reserved} type={image_type} count={image_count}");

        let directory_len = image_count * DirectoryEntry::SIZE;
        if src.remaining() < directory_len {
            return Err(Error::OutOfBounds {
                offset: Self::HEADER_SIZE,
                len: directory_len,
                field: "directory",
            });
        }
        if ResourceType::from_number(image_type).is_none() {
            warn!("ico: image type {image_type} is neither icon (1) nor cursor (2)");
        }

        let mut directory = TryVec::with_capacity(image_count)?;
        for index in 0..image_count {
            let entry = DirectoryEntry::read(&mut src)?;
            debug!(
                "ico: entry #{index} {}x{} bpp={} size={} offset={}",
                entry.pixel_width(),
                entry.pixel_height(),
                entry.bit_count,
                entry.data_size,
                entry.data_offset
            );
            directory.push(entry)?;
        }

        Ok(Self { reserved, image_type, directory })
    }

    /// Read all of `reader`, then decode from memory.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = std::vec::Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::from_bytes(&buf)
    }

    pub fn image_count(&self) -> usize {
        self.directory.len()
    }

    pub fn resource_type(&self) -> Option<ResourceType> {
        ResourceType::from_number(self.image_type)
    }

    /// Image bytes of entry `index`, borrowed from `data`.
    ///
    /// `data` must be the buffer this directory was decoded from.
    pub fn image_data<'a>(&self, data: &'a [u8], index: usize) -> Result<&'a [u8]> {
        let entry = self.directory.get(index).ok_or(Error::OutOfBounds {
            offset: Self::HEADER_SIZE.saturating_add(index.saturating_mul(DirectoryEntry::SIZE)),
            len: DirectoryEntry::SIZE,
            field: "directory entry",
        })?;
        entry
            .data_range()
            .and_then(|range| data.get(range))
            .ok_or(Error::OutOfBounds {
                offset: entry.data_offset.to_usize(),
                len: entry.data_size.to_usize(),
                field: "image data",
            })
    }

    pub fn image_format(&self, data: &[u8], index: usize) -> Result<ImageFormat> {
        self.image_data(data, index).map(ImageFormat::sniff)
    }
}

#[cfg(test)]
fn ico_fixture(image_type: u16, entries: &[(u8, u32, u32)], tail: &[u8]) -> std::vec::Vec<u8> {
    let mut data = std::vec::Vec::new();
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&image_type.to_le_bytes());
    data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for &(size, data_size, data_offset) in entries {
        data.extend_from_slice(&[size, size, 0, 0, 1, 0, 32, 0]);
        data.extend_from_slice(&data_size.to_le_bytes());
        data.extend_from_slice(&data_offset.to_le_bytes());
    }
    data.extend_from_slice(tail);
    data
}

#[test]
fn directory_matches_image_count() {
    let data = ico_fixture(1, &[(32, 4, 38), (0, 0, 42)], b"DIB!");
    let ico = IcoFile::from_bytes(&data).unwrap();
    assert_eq!(ico.image_count(), 2);
    assert_eq!(ico.resource_type(), Some(ResourceType::Icon));
    assert_eq!(ico.directory[0].pixel_width(), 32);
    assert_eq!(ico.directory[1].pixel_height(), 256);
    assert_eq!(ico.image_data(&data, 0).unwrap(), b"DIB!");
    assert_eq!(ico.image_format(&data, 0).unwrap(), ImageFormat::Dib);
    assert!(ico.image_data(&data, 1).unwrap().is_empty());
}

#[test]
fn short_directory_is_out_of_bounds() {
    let mut data = ico_fixture(1, &[(16, 0, 0), (16, 0, 0)], b"");
    data.truncate(IcoFile::HEADER_SIZE + DirectoryEntry::SIZE + 3);
    match IcoFile::from_bytes(&data) {
        Err(Error::OutOfBounds { offset: 6, len: 32, field: "directory" }) => {},
        other => panic!("unexpected {other:?}"),
    }
    match IcoFile::from_bytes(&[0, 0, 1]) {
        Err(Error::OutOfBounds { offset: 2, field: "imageType", .. }) => {},
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn image_range_is_checked_lazily() {
    let data = ico_fixture(2, &[(48, 100, 22)], &[0; 10]);
    let ico = IcoFile::from_bytes(&data).unwrap();
    assert_eq!(ico.resource_type(), Some(ResourceType::Cursor));
    assert_eq!(ico.directory[0].hotspot(), (1, 32));
    match ico.image_data(&data, 0) {
        Err(Error::OutOfBounds { offset: 22, len: 100, field: "image data" }) => {},
        other => panic!("unexpected {other:?}"),
    }
    assert!(ico.image_data(&data, 1).is_err());
}

#[test]
fn odd_image_type_is_surfaced() {
    let data = ico_fixture(7, &[], b"");
    let ico = IcoFile::from_bytes(&data).unwrap();
    assert_eq!(ico.image_type, 7);
    assert_eq!(ico.resource_type(), None);
    assert_eq!(ico.image_count(), 0);
}

#[test]
fn overflowing_range_is_rejected() {
    let entry = DirectoryEntry { data_size: u32::MAX, data_offset: u32::MAX, ..Default::default() };
    if std::mem::size_of::<usize>() == 4 {
        assert!(entry.data_range().is_none());
    } else {
        assert!(entry.data_range().is_some());
    }
}
