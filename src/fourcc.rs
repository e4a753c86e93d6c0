//! Four-character codes and the RIFF chunk tags an animated cursor uses.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use crate::cursor::RawStr;

macro_rules! chunk_database {
    ($($(#[$attr:meta])* $tag:ident $fourcc:literal),*,) => {
        /// A chunk tag in an ANI file, decoded once from its four bytes.
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ChunkTag {
            $($(#[$attr])* $tag),*,
            Unknown(FourCC),
        }

        impl From<[u8; 4]> for ChunkTag {
            fn from(t: [u8; 4]) -> ChunkTag {
                match &t {
                    $($fourcc => ChunkTag::$tag),*,
                    _ => ChunkTag::Unknown(FourCC::from(t)),
                }
            }
        }

        impl From<ChunkTag> for FourCC {
            fn from(t: ChunkTag) -> FourCC {
                match t {
                    $(ChunkTag::$tag => FourCC::from(*$fourcc)),*,
                    ChunkTag::Unknown(fourcc) => fourcc,
                }
            }
        }

        impl fmt::Debug for ChunkTag {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let fourcc: FourCC = From::from(*self);
                fmt::Debug::fmt(&fourcc, f)
            }
        }
    }
}

#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC {
    pub value: [u8; 4],
}

impl FourCC {
    pub const fn new(value: [u8; 4]) -> Self {
        Self { value }
    }

    /// True when all four bytes are printable ASCII (space included).
    pub fn is_printable(&self) -> bool {
        self.value.iter().all(|b| (b' '..=b'~').contains(b))
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(value: [u8; 4]) -> FourCC {
        FourCC { value }
    }
}

impl From<FourCC> for ChunkTag {
    fn from(fourcc: FourCC) -> ChunkTag {
        ChunkTag::from(fourcc.value)
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.value) {
            Ok(s) => f.write_str(s),
            Err(_) => fmt::Debug::fmt(&self.value, f),
        }
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&RawStr(&self.value), f)
    }
}

impl PartialEq<&[u8; 4]> for FourCC {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        self.value.eq(*other)
    }
}

chunk_database!(
    /// Outer container, `RIFF <size> ACON`.
    Riff                b"RIFF",
    /// Container form type for animated cursors.
    Acon                b"ACON",
    /// Grouping marker; its sub-chunks follow inline.
    List                b"LIST",
    /// List type of the metadata list (lenient mode only).
    Info                b"INFO",
    Name                b"INAM",
    Artist              b"IART",
    /// List type of the frame list; a bare marker with no length.
    Frame               b"fram",
    Icon                b"icon",
    Header              b"anih",
    Rate                b"rate",
    Sequence            b"seq ",
);

impl ChunkTag {
    /// Chunks laid out as tag, little-endian length, payload.
    pub fn is_sized(self) -> bool {
        matches!(
            self,
            ChunkTag::Name | ChunkTag::Artist | ChunkTag::Icon | ChunkTag::Header | ChunkTag::Rate | ChunkTag::Sequence
        )
    }
}

#[test]
fn tags_round_trip_through_fourcc() {
    assert_eq!(ChunkTag::from(*b"icon"), ChunkTag::Icon);
    assert_eq!(ChunkTag::from(*b"seq "), ChunkTag::Sequence);
    assert_eq!(FourCC::from(ChunkTag::Header), b"anih");
    assert_eq!(ChunkTag::from(*b"ICON"), ChunkTag::Unknown(FourCC::from(*b"ICON")));
    assert_eq!(format!("{:?}", ChunkTag::List), "LIST");
}

#[test]
fn fourcc_display_keeps_raw_bytes() {
    let tag = FourCC::from([b'i', 0xe9, b'o', b'n']);
    assert_eq!(tag.to_string(), "i\u{e9}on");
    assert!(!tag.is_printable());
    assert!(FourCC::from(*b"seq ").is_printable());
}
