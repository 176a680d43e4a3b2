//! [`Tag`](crate::id3v2::Tag) -> binary buffer.

use crate::core::io::BitSink;
use crate::err::{SerializeError, SerializeResult};
use crate::id3v2::context::{ContentContext, ContextType};
use crate::id3v2::entry::ContentEntry;
use crate::id3v2::frame::Frame;
use crate::id3v2::header::{SaveVersion, Version};
use crate::id3v2::syncdata;
use crate::id3v2::Tag;
use crate::string::{self, Encoding};

/// Serializes `tag` into its on-disk representation: rendered frames,
/// optional extended header, a backpatched tag-size field, and (if
/// requested) unsynchronisation and a v2.4 footer.
pub fn serialize(tag: &Tag) -> SerializeResult<Vec<u8>> {
    let version = tag.header().version();

    if version == Version::V22 {
        return Err(SerializeError::Version);
    }

    if tag.header().flags().footer && version != Version::V24 {
        return Err(SerializeError::Version);
    }

    let mut body = Vec::new();

    if let Some(ext_header) = tag.extended_header() {
        body.extend(ext_header.render(version));
    }

    for frame in tag.frames() {
        body.extend(serialize_frame(version, frame)?);
    }

    if tag.header().flags().unsync {
        body = syncdata::encode(&body);
    }

    let mut header = tag.header().clone();
    *header.size_mut() = body.len() as u32;

    let mut out = Vec::with_capacity(10 + body.len() + 10);
    out.extend(header.render());
    out.extend(body);

    if header.flags().footer {
        out.extend(header.render_footer());
    }

    Ok(out)
}

fn serialize_frame(version: Version, frame: &Frame) -> SerializeResult<Vec<u8>> {
    let body = render_entries(frame.schema(), frame.entries())?;

    let mut header = frame.header().clone();
    *header.size_mut() = body.len();

    let mut out = header.render(version);
    out.extend(body);

    Ok(out)
}

fn render_entries(schema: &[ContentContext], entries: &[ContentEntry]) -> SerializeResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut entry_keys = Vec::new();
    let mut sink = BitSink::new();
    let mut dangling_bits = false;

    let mut entry_idx = 0;
    let mut i = 0;

    while i < schema.len() {
        let context = &schema[i];

        match context.context_type {
            ContextType::Unknown => {
                return Err(SerializeError::Schema);
            }
            ContextType::Iter => {
                let span = context.min;
                if span == 0 || span > i {
                    return Err(SerializeError::Schema);
                }

                let loop_contexts = &schema[i - span..i];

                while entry_idx < entries.len() {
                    for loop_context in loop_contexts {
                        let is_last = entry_idx + 1 == entries.len();
                        render_one(
                            loop_context,
                            &entries[entry_idx],
                            is_last,
                            &mut out,
                            &entry_keys,
                            &mut sink,
                            &mut dangling_bits,
                        )?;
                        entry_keys.push((loop_context.key, entries[entry_idx].clone()));
                        entry_idx += 1;
                    }
                }

                i += 1;
            }
            _ => {
                let entry = entries.get(entry_idx).ok_or(SerializeError::Bound)?;
                let is_last = entry_idx + 1 == entries.len();
                render_one(context, entry, is_last, &mut out, &entry_keys, &mut sink, &mut dangling_bits)?;
                entry_keys.push((context.key, entry.clone()));
                entry_idx += 1;
                i += 1;
            }
        }
    }

    if dangling_bits {
        sink.flush(&mut out);
    }

    Ok(out)
}

fn render_one(
    context: &ContentContext,
    entry: &ContentEntry,
    is_last: bool,
    out: &mut Vec<u8>,
    entry_keys: &[(u64, ContentEntry)],
    sink: &mut BitSink,
    dangling_bits: &mut bool,
) -> SerializeResult<()> {
    if context.context_type != ContextType::Bit && *dangling_bits {
        sink.flush(out);
        *dangling_bits = false;
    }

    match context.context_type {
        ContextType::Numeric | ContextType::Precision | ContextType::NoEncoding | ContextType::Binary => {
            let mut data = entry.bytes().to_vec();

            if data.len() > context.max {
                data.truncate(context.max);
            }

            if data.len() < context.min {
                data.resize(context.min, 0);
            }

            out.extend(data);
        }
        ContextType::Bit => {
            sink.write_bits(out, entry.as_bits(), context.max as u8);
            *dangling_bits = true;
        }
        ContextType::Adjustment => {
            let len = sibling_value(entry_keys, crate::id3v2::context::djb2("adjustment")).unwrap_or(0);

            if len as usize != entry.len() {
                return Err(SerializeError::Schema);
            }

            out.extend(entry.bytes());
        }
        ContextType::Latin1 => {
            let text = String::from_utf8_lossy(entry.bytes()).into_owned();
            let encoded = string::encode_latin1_strict(&text).map_err(SerializeError::Encoding)?;
            out.extend(encoded);

            if !is_last {
                out.push(0);
            }
        }
        ContextType::EncodedString => {
            let encoding = sibling_value(entry_keys, crate::id3v2::context::djb2("encoding"))
                .and_then(|v| Encoding::from_discriminator(v as u8))
                .unwrap_or_default();

            let text = String::from_utf8_lossy(entry.bytes()).into_owned();
            out.extend(if is_last {
                string::render(encoding, &text)
            } else {
                string::render_terminated(encoding, &text)
            });
        }
        ContextType::Iter | ContextType::Unknown => unreachable!("handled by caller"),
    }

    Ok(())
}

fn sibling_value(entry_keys: &[(u64, ContentEntry)], target: u64) -> Option<u64> {
    entry_keys
        .iter()
        .rev()
        .find(|(key, _)| *key == target)
        .map(|(_, entry)| entry.as_u64())
}

/// Normalizes a tag for the target save version: clamps restrictions,
/// downgrades/upgrades the extended header, and clears version-illegal
/// flags (a footer can only ever be written on v2.4).
pub fn prepare_for(tag: &mut Tag, to: SaveVersion) {
    *tag.header_mut().version_mut() = to.into();

    if let Some(ext_header) = tag.extended_header().cloned() {
        let mut ext_header = ext_header;
        ext_header.update(to);
        *tag.extended_header_mut() = Some(ext_header);
    }

    if to == SaveVersion::V23 {
        tag.header_mut().flags_mut().footer = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3v2::frame::FrameHeader;
    use crate::id3v2::registry;

    #[test]
    fn round_trips_a_simple_text_frame() {
        let schema = registry::resolve(Version::V24, "TIT2", None);
        let entries = vec![
            ContentEntry::new(vec![Encoding::Utf8.discriminator()]),
            ContentEntry::new(b"hello".to_vec()),
        ];
        let frame = Frame::from_parts(FrameHeader::new("TIT2"), schema, entries);

        let rendered = serialize_frame(Version::V24, &frame).unwrap();

        let mut stream = crate::core::io::BufStream::new(&rendered);
        let parsed = crate::id3v2::frame::FrameHeader::parse(Version::V24, &mut stream).unwrap();
        assert_eq!(parsed.id(), "TIT2");
        assert_eq!(parsed.size(), rendered.len() - 10);
    }

    #[test]
    fn latin1_context_rejects_non_latin1_text() {
        let context = ContentContext::new(ContextType::Latin1, 0, 0, usize::MAX);
        let entry = ContentEntry::new("€".as_bytes().to_vec());

        let mut out = Vec::new();
        let mut sink = BitSink::new();
        let mut dangling = false;

        let err = render_one(&context, &entry, true, &mut out, &[], &mut sink, &mut dangling).unwrap_err();
        assert_eq!(err, SerializeError::Encoding('€'));
    }

    #[test]
    fn last_encoded_string_entry_has_no_trailing_terminator() {
        let schema = registry::resolve(Version::V24, "TIT2", None);
        let entries = vec![
            ContentEntry::new(vec![Encoding::Latin1.discriminator()]),
            ContentEntry::new(b"hello".to_vec()),
        ];

        let body = render_entries(&schema, &entries).unwrap();

        assert_eq!(body, b"\x00hello");
    }

    #[test]
    fn a_non_final_encoded_string_entry_keeps_its_terminator() {
        let schema = registry::resolve(Version::V23, "COMM", None);
        let entries = vec![
            ContentEntry::new(vec![Encoding::Latin1.discriminator()]),
            ContentEntry::new(b"eng".to_vec()),
            ContentEntry::new(b"desc".to_vec()),
            ContentEntry::new(b"text".to_vec()),
        ];

        let body = render_entries(&schema, &entries).unwrap();

        // encoding + language are fixed-width, then "desc\0text" with no
        // terminator after the final (text) entry.
        assert_eq!(body, b"\x00engdesc\x00text");
    }
}
