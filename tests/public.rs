// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use ani2png::{
    AniFile, ChunkTag, DecodeConfig, Error, IcoFile, ImageFormat, ResourceType, Signature, Table, describe_ani,
    describe_ico, describe_png, walk_png,
};
use test_assembler::{Label, LabelMaker, Section};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).filter_level(log::LevelFilter::max()).try_init();
}

/// `RIFF <len> ACON` followed by whatever `body` appends.
fn make_ani<F>(body: F) -> Vec<u8>
where
    F: Fn(Section) -> Section,
{
    let riff_length = Label::new();
    let mut section = Section::new();
    section = section.append_bytes(b"RIFF").L32(&riff_length).append_bytes(b"ACON");
    section = body(section);
    riff_length.set_const(section.size() - 8);
    section.get_contents().expect("unresolved label")
}

/// `tag <u32 LE length> payload`.
fn chunk(section: Section, tag: &[u8; 4], payload: &[u8]) -> Section {
    section.append_bytes(tag).L32(payload.len() as u32).append_bytes(payload)
}

fn anih(section: Section, frames: u32, jiffies: u32, flags: u32) -> Section {
    section
        .append_bytes(b"anih")
        .L32(36)
        .L32(36)
        .L32(frames)
        .L32(frames)
        .L32(0)
        .L32(0)
        .L32(0)
        .L32(0)
        .L32(jiffies)
        .L32(flags)
}

/// A cursor file with one 32x32 entry whose data is `image`, hotspot (3, 5).
fn make_cur(image: &[u8]) -> Vec<u8> {
    Section::new()
        .L16(0)
        .L16(2)
        .L16(1)
        .append_bytes(&[32, 32, 0, 0])
        .L16(3)
        .L16(5)
        .L32(image.len() as u32)
        .L32(22)
        .append_bytes(image)
        .get_contents()
        .expect("unresolved label")
}

/// Signature, an `IHDR`, and `IEND`; CRCs are placeholders.
fn make_png() -> Vec<u8> {
    Section::new()
        .append_bytes(&ani2png::PNG_SIGNATURE)
        .B32(13)
        .append_bytes(b"IHDR")
        .B32(32)
        .B32(32)
        .append_bytes(&[8, 6, 0, 0, 0])
        .B32(0xdead_beef)
        .B32(0)
        .append_bytes(b"IEND")
        .B32(0xae42_6082)
        .get_contents()
        .expect("unresolved label")
}

#[test]
fn anih_only_file() {
    init_logger();
    let data = Section::new()
        .append_bytes(b"RIFF")
        .L32(20)
        .append_bytes(b"ACON")
        .append_bytes(b"anih")
        .L32(36)
        .append_repeated(0, 36)
        .get_contents()
        .unwrap();

    let ani = AniFile::from_bytes(&data).expect("decode failed");
    assert_eq!(ani.riff_declared_length, 20);
    let header = ani.header.expect("no anih");
    assert_eq!(header, ani2png::AniHeader::default());
    assert!(ani.icons.is_empty());
    assert!(ani.title.is_none());
    assert!(ani.artist.is_none());

    let labelled = make_ani(|s| s.append_bytes(b"anih").L32(36).append_repeated(0, 36));
    assert_eq!(AniFile::from_bytes(&labelled).unwrap().riff_declared_length, 48);
}

#[test]
fn wrong_container_tag() {
    init_logger();
    let data = Section::new().append_bytes(b"RIFF").L32(8).append_bytes(b"ACOX").L32(0).get_contents().unwrap();
    match AniFile::from_bytes(&data) {
        Err(Error::InvalidMagic { offset: 8, .. }) => {},
        other => panic!("expected InvalidMagic, got {other:?}"),
    }
    assert!(describe_ani(&data).is_err());
}

#[test]
fn ico_entry_past_end_fails_only_when_resolved() {
    init_logger();
    let data = Section::new()
        .L16(0)
        .L16(1)
        .L16(1)
        .append_bytes(&[16, 16, 0, 0])
        .L16(1)
        .L16(32)
        .L32(1024)
        .L32(22)
        .append_repeated(0xff, 100)
        .get_contents()
        .unwrap();
    let ico = IcoFile::from_bytes(&data).expect("directory should decode");
    assert_eq!(ico.image_count(), 1);
    match ico.image_data(&data, 0) {
        Err(Error::OutOfBounds { offset: 22, len: 1024, .. }) => {},
        other => panic!("expected OutOfBounds, got {other:?}"),
    }
}

#[test]
fn png_signature_alone() {
    init_logger();
    let walk = walk_png(&ani2png::PNG_SIGNATURE, 0).expect("walk failed");
    assert_eq!(walk.signature, Signature::Valid);
    assert!(walk.chunks.is_empty());
    assert!(walk.warnings.is_empty());
}

fn animation() -> Vec<u8> {
    let frame = make_cur(&make_png());
    make_ani(|s| {
        let s = s.append_bytes(b"LIST").L32(10).append_bytes(b"INFO");
        let s = chunk(s, b"INAM", b"Spinner");
        let s = chunk(s, b"IART", b"Someone");
        let s = anih(s, 2, 6, ani2png::ani::AF_ICON);
        let s = chunk(s, b"rate", &[6, 0, 0, 0, 12, 0, 0, 0]);
        let s = s.append_bytes(b"LIST").L32(frame.len() as u32 * 2 + 20).append_bytes(b"fram");
        let s = chunk(s, b"icon", &frame);
        chunk(s, b"icon", &frame)
    })
}

#[test]
fn info_list_needs_lenient_mode() {
    init_logger();
    let data = animation();
    assert!(matches!(AniFile::from_bytes(&data), Err(Error::UnexpectedTag { offset: 20, byte: b'I' })));
    let ani = AniFile::from_bytes_with_config(&data, &DecodeConfig::default().lenient(true)).expect("lenient decode");
    assert_eq!(ani.title_str().unwrap(), "Spinner");
    assert_eq!(ani.artist_str().unwrap(), "Someone");
}

#[test]
fn icon_count_matches_icon_chunks() {
    init_logger();
    let frame = make_cur(b"BMP");
    for count in 0..5 {
        let data = make_ani(|mut s| {
            s = anih(s, count, 0, 0);
            s = s.append_bytes(b"LIST").L32(0).append_bytes(b"fram");
            for _ in 0..count {
                s = chunk(s, b"icon", &frame);
            }
            s
        });
        let ani = AniFile::from_bytes(&data).expect("decode failed");
        assert_eq!(ani.icons.len(), count as usize);
        assert_eq!(ani.header.unwrap().frame_count, count);
    }
}

#[test]
fn truncated_files_fail() {
    init_logger();
    let frame = make_cur(&make_png());
    let data = make_ani(|s| chunk(anih(s, 1, 0, 0), b"icon", &frame));
    assert!(AniFile::from_bytes(&data).is_ok());

    for cut in 1..frame.len() {
        let truncated = &data[..data.len() - cut];
        match AniFile::from_bytes(truncated) {
            Err(Error::TruncatedChunk { tag, declared, .. }) => {
                assert_eq!(ChunkTag::from(tag), ChunkTag::Icon);
                assert_eq!(declared as usize, frame.len());
            },
            Err(Error::OutOfBounds { .. }) => {},
            other => panic!("cut {cut}: expected a truncation error, got {other:?}"),
        }
    }
    // cutting into the icon chunk header
    for cut in frame.len()..frame.len() + 8 {
        assert!(AniFile::from_bytes(&data[..data.len() - cut]).is_err(), "cut {cut} decoded");
    }
}

#[test]
fn sequence_chunks_are_read_and_dropped() {
    init_logger();
    let frame = make_cur(b"BMP");
    let steps = [0u8, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0];
    let data = make_ani(|s| {
        let s = anih(s, 2, 0, ani2png::ani::AF_ICON | ani2png::ani::AF_SEQUENCE);
        let s = chunk(s, b"icon", &frame);
        let s = chunk(s, b"seq ", &steps);
        chunk(s, b"icon", &frame)
    });
    let ani = AniFile::from_bytes(&data).expect("decode failed");
    assert!(ani.header.unwrap().has_sequence());
    assert_eq!(ani.icons.len(), 2);
    for icon in ani.icons.iter() {
        assert_eq!(&icon[..], &frame[..]);
    }

    let truncated = make_ani(|s| {
        let s = chunk(s, b"icon", &frame);
        s.append_bytes(b"seq ").L32(steps.len() as u32).append_bytes(&steps[..5])
    });
    match AniFile::from_bytes(&truncated) {
        Err(Error::TruncatedChunk { tag, declared: 12, available: 5, .. }) => {
            assert_eq!(ChunkTag::from(tag), ChunkTag::Sequence);
            assert_eq!(tag, b"seq ");
        },
        other => panic!("expected a truncated 'seq ' chunk, got {other:?}"),
    }
}

#[test]
fn extracted_frames_decode_like_standalone_files() {
    init_logger();
    let png = make_png();
    let frame = make_cur(&png);
    let data = make_ani(|s| {
        let s = anih(s, 2, 0, ani2png::ani::AF_ICON);
        let s = chunk(s, b"icon", &frame);
        chunk(s, b"icon", &frame)
    });
    let ani = AniFile::from_bytes(&data).expect("decode failed");
    assert!(ani.header.unwrap().is_icon_data());

    let standalone = IcoFile::from_bytes(&frame).expect("standalone decode");
    for (i, icon) in ani.icons.iter().enumerate() {
        let nested = ani.icon_directory(i).expect("frame exists").expect("frame decodes");
        assert_eq!(nested.image_count(), standalone.image_count());
        assert_eq!(nested.directory[0], standalone.directory[0]);
        assert_eq!(nested.resource_type(), Some(ResourceType::Cursor));
        assert_eq!(nested.directory[0].hotspot(), (3, 5));
        assert_eq!(nested.image_format(icon, 0).unwrap(), ImageFormat::Png);
        assert_eq!(nested.image_data(icon, 0).unwrap(), &png[..]);
    }
    assert!(ani.icon_directory(2).is_none());
}

#[test]
fn png_inside_a_cursor_entry() {
    init_logger();
    let frame = make_cur(&make_png());
    let ico = IcoFile::from_bytes(&frame).unwrap();
    let start = ico.directory[0].data_offset as usize;
    let walk = walk_png(&frame, start).unwrap();
    assert!(walk.is_complete());
    assert!(walk.warnings.is_empty());
    let ihdr = walk.chunk(b"IHDR").expect("IHDR");
    assert_eq!(ihdr.offset, start + 8);
    assert_eq!(ihdr.crc, Some(0xdead_beef));
}

#[test]
fn from_reader_matches_from_bytes() {
    init_logger();
    let data = animation();
    let config = DecodeConfig::unlimited().lenient(true);
    let from_reader = AniFile::from_reader_with_config(&mut std::io::Cursor::new(&data), &config).unwrap();
    let from_bytes = AniFile::from_bytes_with_config(&data, &config).unwrap();
    assert_eq!(from_reader.icons.len(), from_bytes.icons.len());
    assert_eq!(from_reader.header, from_bytes.header);

    let frame = make_cur(b"x");
    let ico = IcoFile::from_reader(&mut std::io::Cursor::new(&frame)).unwrap();
    assert_eq!(ico.image_count(), 1);

    let err: std::io::Error = AniFile::from_reader(&mut &b"RIFF"[..]).unwrap_err().into();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    let err: std::io::Error = AniFile::from_reader(&mut &b"RIFF\0\0\0\0ACONicon\x01"[..]).unwrap_err().into();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[test]
fn ani_table() {
    init_logger();
    let data = make_ani(|s| chunk(anih(s, 1, 10, 0), b"INAM", b"ab"));
    let table = describe_ani(&data).unwrap().collect::<Result<Table<'_>, _>>().unwrap();
    // preamble, anih id + size + nine fields, INAM id + size + data
    assert_eq!(table.len(), 3 + 11 + 3);
    let text = table.to_string();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2 + table.len());
    assert!(lines[0].starts_with("| Position | Size | Purpose "));
    assert!(lines[2].contains("'82 73 70 70' -> 'R I F F' (char)"));
    assert!(lines.iter().any(|l| l.contains("JifRate") && l.contains("-> '10' (32Bit unsigned int)")));
    assert!(lines.last().unwrap().contains("'97 98' -> 'a b' (char)"));
}

#[test]
fn ico_and_png_tables() {
    init_logger();
    let png = make_png();
    let frame = make_cur(&png);

    let table: Table<'_> = describe_ico(&frame).unwrap().collect();
    assert_eq!(table.len(), 3 + 8 + 1);
    let last = table.records().last().unwrap();
    assert_eq!((last.offset, last.len), (22, png.len()));

    let narration = describe_png(&frame, 22).unwrap();
    assert_eq!(narration.signature(), Signature::Valid);
    let table: Table<'_> = narration.collect();
    // signature, IHDR size/type/data/crc, IEND size/type/crc
    assert_eq!(table.len(), 8);
    assert_eq!(table.records()[0].offset, 22);

    let narration = describe_png(&frame, 0).unwrap();
    assert_eq!(narration.signature(), Signature::Mismatch);
    assert_eq!(narration.count(), 0);
}
