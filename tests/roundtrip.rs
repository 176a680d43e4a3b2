//! Whole-tag integration tests, exercised entirely through the public API
//! (this file is its own crate, same as any other Cargo `tests/` module).

use id3v2::id3v2::{ExtendedHeader, Frame, Registry, SaveVersion, Tag, Version};

fn title_text(frame: &Frame) -> String {
    let mut reader = frame.reader();
    let _encoding = reader.byte();
    String::from_utf8(reader.raw()).unwrap()
}

// S1: a fixed v2.4 header + single TIT2 frame parses, and its title reads
// back as "so".
#[test]
fn s1_parses_a_fixed_v24_title_frame() {
    let mut buf = vec![b'I', b'D', b'3', 4, 0, 0, 0, 0, 0, 17];
    buf.extend(b"TIT2");
    buf.extend(&[0, 0, 0, 7]);
    buf.extend(&[0, 0]);
    buf.extend(&[0x01, 0xFF, 0xFE, 0x73, 0x00, 0x6F, 0x00]);

    let tag = Tag::parse(&buf, None).expect("tag should parse");
    assert_eq!(tag.frames().len(), 1);

    let frame = tag.frame("TIT2").expect("TIT2 frame present");
    assert_eq!(title_text(frame), "so");
}

// S2: build a fresh v2.3 tag, write title/artist/year, serialize, reparse;
// the three text frames read back identical.
#[test]
fn s2_fresh_v23_tag_round_trips_text_frames() {
    let mut tag = Tag::new(SaveVersion::V23);

    for (id, text) in [
        ("TIT2", "Happier Than Ever"),
        ("TPE1", "Billie Eilish"),
        ("TYER", "2021"),
    ] {
        let mut frame = Frame::new(id, Version::V23, None);
        let mut writer = frame.writer();
        writer.write_entry(vec![0]).unwrap(); // Latin-1 encoding
        writer.write_entry(text.as_bytes().to_vec()).unwrap();
        drop(writer);
        tag.attach_frame(frame);
    }

    let serialized = tag.serialize().unwrap();
    let reparsed = Tag::parse(&serialized, None).expect("reparse should succeed");

    for (id, expected) in [
        ("TIT2", "Happier Than Ever"),
        ("TPE1", "Billie Eilish"),
        ("TYER", "2021"),
    ] {
        let frame = reparsed.frame(id).unwrap();
        assert_eq!(title_text(frame), expected);
    }
}

// S3: a v2.2 COM frame (language "eng", empty descriptor, text "testing")
// reads back its comment body.
#[test]
fn s3_parses_a_v22_comment_frame() {
    let mut buf = vec![b'I', b'D', b'3', 2, 0, 0, 0, 0, 0, 12];
    buf.extend(b"COM");
    buf.extend(&[0, 0, 12]);
    buf.push(0x00); // Latin-1 encoding
    buf.extend(b"eng"); // language
    buf.push(0x00); // empty descriptor, terminated
    buf.extend(b"testing");

    let tag = Tag::parse(&buf, None).expect("tag should parse");
    let frame = tag.frame("COM").expect("COM frame present");

    let mut reader = frame.reader();
    let _encoding = reader.byte();
    let _language = reader.raw();
    let _desc = reader.raw();
    let text = String::from_utf8(reader.raw()).unwrap();
    assert_eq!(text, "testing");
}

// S4: a v2.2 EQU payload resolves to the equalization schema and its
// adjustment/increment/frequency/volume fields read back as expected.
#[test]
fn s4_parses_an_equalization_frame() {
    let mut buf = vec![b'I', b'D', b'3', 2, 0, 0, 0, 0, 0, 12];
    buf.extend(b"EQU");
    buf.extend(&[0, 0, 9]);
    buf.extend(&[0x02, 0x03, 0xE9, 0x40, 0x00, 0x00, 0x28, 0xFC, 0x00]);

    let tag = Tag::parse(&buf, None).expect("tag should parse");
    let frame = tag.frame("EQU").expect("EQU frame present");

    let mut reader = frame.reader();
    let adjustment_width = reader.byte();
    assert_eq!(adjustment_width, 2);

    let _increment = reader.byte();
    let _frequency = reader.raw();
    let volume = reader.raw();
    assert_eq!(volume, vec![0x40, 0x00]);
}

// S5: write a picture into a fresh v2.3 tag, serialize, reparse; the raw
// bytes come back exactly.
#[test]
fn s5_picture_round_trips_exactly() {
    let png_bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    let mut tag = Tag::new(SaveVersion::V23);
    let mut frame = Frame::new("APIC", Version::V23, None);
    let mut writer = frame.writer();
    writer.write_entry(vec![0]).unwrap(); // encoding
    writer.write_entry(b"image/png".to_vec()).unwrap(); // format
    writer.write_entry(vec![3]).unwrap(); // picture_type
    writer.write_entry(vec![]).unwrap(); // desc
    writer.write_entry(png_bytes.clone()).unwrap(); // data
    drop(writer);
    tag.attach_frame(frame);

    let serialized = tag.serialize().unwrap();
    let reparsed = Tag::parse(&serialized, None).unwrap();

    let frame = reparsed.frame("APIC").unwrap();
    let mut reader = frame.reader();
    let _encoding = reader.byte();
    let _format = reader.raw();
    let picture_type = reader.byte();
    let _desc = reader.raw();
    let data = reader.raw();

    assert_eq!(picture_type, 3);
    assert_eq!(data, png_bytes);
}

// S6: setting the v2.4 extended-header update flag and serializing into a
// file already carrying a tag leaves both tags in the file, new one first.
#[test]
fn s6_update_flag_prepends_rather_than_replaces() {
    let mut path = std::env::temp_dir();
    path.push("id3v2_roundtrip_update_flag.mp3");

    let mut original = Tag::new(SaveVersion::V24);
    let mut frame = Frame::new("TIT2", Version::V24, None);
    let mut writer = frame.writer();
    writer.write_entry(vec![0]).unwrap();
    writer.write_entry(b"original".to_vec()).unwrap();
    drop(writer);
    original.attach_frame(frame);

    let original_bytes = original.serialize().unwrap();
    let mut file_contents = original_bytes.clone();
    file_contents.extend(b"audio-bytes-here");
    std::fs::write(&path, &file_contents).unwrap();

    let mut updated = Tag::new(SaveVersion::V24);
    updated.header_mut().flags_mut().extended = true;
    let mut ext_header = ExtendedHeader::default();
    ext_header.is_update = true;
    *updated.extended_header_mut() = Some(ext_header);

    let mut frame = Frame::new("TIT2", Version::V24, None);
    let mut writer = frame.writer();
    writer.write_entry(vec![0]).unwrap();
    writer.write_entry(b"updated".to_vec()).unwrap();
    drop(writer);
    updated.attach_frame(frame);

    id3v2::file::write_tag(&path, &updated, true).unwrap();

    let written = std::fs::read(&path).unwrap();
    let first = Tag::parse(&written, None).expect("first tag should parse");
    assert_eq!(title_text(first.frame("TIT2").unwrap()), "updated");

    let updated_serialized = updated.serialize().unwrap();
    let rest = &written[updated_serialized.len()..];
    let second = Tag::parse(rest, None).expect("second tag should parse");
    assert_eq!(title_text(second.frame("TIT2").unwrap()), "original");

    assert!(written.ends_with(b"audio-bytes-here"));

    std::fs::remove_file(&path).ok();
}

// P1: parse(serialize(T)) is deep-equal to T, quantified over a tag T that
// was itself parsed from a buffer (a freshly built `Tag` has no on-disk
// `frame_size` yet, so it isn't a member of P1's domain).
#[test]
fn p1_round_trip_is_deep_equal() {
    let content = b"\x03round trip";

    let mut buf = vec![b'I', b'D', b'3', 4, 0, 0, 0, 0, 0, 10 + content.len() as u8];
    buf.extend(b"TIT2");
    buf.extend(&[0, 0, 0, content.len() as u8]);
    buf.extend(&[0, 0]);
    buf.extend(content);

    let tag = Tag::parse(&buf, None).expect("tag should parse");

    let serialized = tag.serialize().unwrap();
    let reparsed = Tag::parse(&serialized, None).unwrap();

    assert_eq!(reparsed.frames(), tag.frames());
}

// P4: writing past a positional context's bound (here, an out-of-range
// picture-type) fails rather than silently clamping.
#[test]
fn p4_write_entry_rejects_out_of_range_picture_type() {
    let mut frame = Frame::new("APIC", Version::V24, None);
    let mut writer = frame.writer();
    writer.write_entry(vec![0]).unwrap(); // encoding
    writer.write_entry(b"image/png".to_vec()).unwrap(); // format

    let err = writer.write_entry(vec![0x7F]).unwrap_err();
    assert_eq!(err, id3v2::err::SerializeError::Bound);
}

// P5: an unregistered 'T'-prefixed identifier resolves to the generic text
// schema; same for 'W' and the URL schema.
#[test]
fn p5_unregistered_prefixed_identifiers_fall_back_to_wildcards() {
    let extra: Option<&Registry> = None;

    let text_schema = id3v2::id3v2::registry::resolve(Version::V24, "TXYZ", extra);
    let generic_text = id3v2::id3v2::registry::resolve(Version::V24, "T", extra);
    assert_eq!(text_schema, generic_text);

    let url_schema = id3v2::id3v2::registry::resolve(Version::V23, "WXYZ", extra);
    let generic_url = id3v2::id3v2::registry::resolve(Version::V23, "W", extra);
    assert_eq!(url_schema, generic_url);
}

// P7: two frames whose entry lists differ only by a trailing terminator
// byte still compare equal.
#[test]
fn p7_frame_equality_tolerates_a_trailing_terminator() {
    let mut a = Frame::new("TIT2", Version::V24, None);
    let mut a_writer = a.writer();
    a_writer.write_entry(vec![3]).unwrap();
    a_writer.write_entry(b"hello\0".to_vec()).unwrap();
    drop(a_writer);

    let mut b = Frame::new("TIT2", Version::V24, None);
    let mut b_writer = b.writer();
    b_writer.write_entry(vec![3]).unwrap();
    b_writer.write_entry(b"hello".to_vec()).unwrap();
    drop(b_writer);

    assert_eq!(a, b);
}
