//! Binary buffer -> [`Tag`](crate::id3v2::Tag).

use crate::core::io::{BitCursor, BufStream};
use crate::err::ParseError;
use crate::id3v2::context::{ContentContext, ContextType};
use crate::id3v2::entry::ContentEntry;
use crate::id3v2::frame::{Frame, FrameHeader};
use crate::id3v2::header::{ExtendedHeader, TagHeader, Version};
use crate::id3v2::registry::{self, Registry};
use crate::id3v2::syncdata;
use crate::id3v2::Tag;
use crate::string::{self, Encoding};
use log::warn;
use std::convert::TryInto;

const ID: &[u8] = b"ID3";

/// Parses a tag out of `buf`, using `extra` as the second-pass caller
/// registry. Returns `None` if no "ID3" magic is found or the 10-byte
/// header itself is malformed; a bad individual frame only truncates the
/// frame list, it does not fail the whole parse.
pub fn parse(buf: &[u8], extra: Option<&Registry>) -> Option<Tag> {
    let start = buf.windows(ID.len()).position(|w| w == ID)?;

    if buf.len() - start < 10 {
        return None;
    }

    let header_bytes: [u8; 10] = buf[start..start + 10].try_into().ok()?;
    let header = TagHeader::parse(header_bytes).ok()?;

    let body_start = start + 10;
    let declared_size = header.size() as usize;
    let available = buf.len().saturating_sub(body_start).min(declared_size);
    let raw_body = &buf[body_start..body_start + available];

    let decoded_body;
    let body: &[u8] = if header.flags().unsync {
        decoded_body = syncdata::decode(&mut BufStream::new(raw_body));
        &decoded_body
    } else {
        raw_body
    };

    let mut stream = BufStream::new(body);

    let extended_header = if header.version() != Version::V22 && header.flags().extended {
        match ExtendedHeader::parse(&mut stream, header.version()) {
            Ok(ext) => Some(ext),
            Err(_) => return None,
        }
    } else {
        None
    };

    let mut frames = Vec::new();

    while stream.remaining() > 0 {
        // End-of-frames padding: a leading 0x00 where an identifier should
        // start. Some authoring tools pad the remainder of the tag with
        // zeroes instead of trimming the declared size.
        if stream.peek(0..1).map(|b| b[0] == 0).unwrap_or(true) {
            break;
        }

        match parse_one_frame(header.version(), &mut stream, extra) {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                warn!("dropping the remainder of this tag after a bad frame: {}", err);
                break;
            }
        }
    }

    Some(Tag::from_parts(header, extended_header, frames))
}

fn parse_one_frame(
    version: Version,
    stream: &mut BufStream,
    extra: Option<&Registry>,
) -> Result<Frame, ParseError> {
    let header = FrameHeader::parse(version, stream)?;
    let declared_size = header.size();
    let mut body = stream.slice_stream(declared_size)?;

    // Compressed/encrypted frames are passed through as one opaque blob;
    // the core never decompresses or decrypts.
    if header.is_compressed() || header.is_encrypted() {
        let schema = vec![ContentContext::new(ContextType::Binary, 0, 0, usize::MAX)];
        let entries = vec![ContentEntry::new(body.take_rest().to_vec())];
        return Ok(Frame::from_parts(header, schema, entries));
    }

    let schema = registry::resolve(version, header.id(), extra);
    let entries = parse_entries(&schema, &mut body)?;

    Ok(Frame::from_parts(header, schema, entries))
}

/// Walks `schema` against `body`, producing one entry per non-`Iter`
/// context (an `Iter` marker instead repeats the contexts it refers to
/// until `body` is exhausted).
fn parse_entries(
    schema: &[ContentContext],
    body: &mut BufStream,
) -> Result<Vec<ContentEntry>, ParseError> {
    let mut entries = Vec::new();
    let mut entry_keys = Vec::new();
    let mut bits = BitCursor::new();

    let mut i = 0;
    while i < schema.len() {
        let context = &schema[i];

        match context.context_type {
            ContextType::Unknown => {
                entries.push(ContentEntry::new(body.take_rest().to_vec()));
                entry_keys.push(context.key);
                return Ok(entries);
            }
            ContextType::Iter => {
                let span = context.min;
                if span == 0 || span > i {
                    return Err(ParseError::Schema);
                }

                let loop_contexts = &schema[i - span..i];

                while body.remaining() > 0 {
                    for loop_context in loop_contexts {
                        parse_context(loop_context, body, &mut entries, &mut entry_keys, &mut bits)?;
                    }
                }

                i += 1;
            }
            _ => {
                parse_context(context, body, &mut entries, &mut entry_keys, &mut bits)?;
                i += 1;
            }
        }
    }

    Ok(entries)
}

fn parse_context(
    context: &ContentContext,
    body: &mut BufStream,
    entries: &mut Vec<ContentEntry>,
    entry_keys: &mut Vec<u64>,
    bits: &mut BitCursor,
) -> Result<(), ParseError> {
    let key = crate::id3v2::context::djb2("encoding");
    let adjustment_key = crate::id3v2::context::djb2("adjustment");

    if context.context_type != ContextType::Bit && bits.is_dangling() {
        bits.realign();
    }

    let entry = match context.context_type {
        ContextType::Numeric | ContextType::Precision => {
            if body.remaining() < context.min {
                return Err(ParseError::NotEnoughData);
            }
            let n = context.max.min(body.remaining());
            ContentEntry::new(body.slice(n)?.to_vec())
        }
        ContextType::NoEncoding | ContextType::Binary => {
            let n = context.max.min(body.remaining());
            if n < context.min {
                return Err(ParseError::NotEnoughData);
            }
            ContentEntry::new(body.slice(n)?.to_vec())
        }
        ContextType::Bit => {
            let value = bits.read_bits(body, context.max as u8).map_err(|_| ParseError::NotEnoughData)?;
            let width = (context.max + 7) / 8;
            ContentEntry::new(value.to_be_bytes()[8 - width.max(1)..].to_vec())
        }
        ContextType::Adjustment => {
            let len = sibling_value(entries, entry_keys, adjustment_key).unwrap_or(0) as usize;
            let n = len.min(body.remaining());
            ContentEntry::new(body.slice(n)?.to_vec())
        }
        ContextType::Latin1 => {
            let text = string::read_terminated(Encoding::Latin1, body);
            ContentEntry::new(text.into_bytes())
        }
        ContextType::EncodedString => {
            let encoding = sibling_value(entries, entry_keys, key)
                .and_then(|v| Encoding::from_discriminator(v as u8))
                .unwrap_or(Encoding::Latin1);
            let text = string::read_terminated(encoding, body);
            ContentEntry::new(text.into_bytes())
        }
        ContextType::Iter | ContextType::Unknown => unreachable!("handled by caller"),
    };

    entries.push(entry);
    entry_keys.push(context.key);

    Ok(())
}

/// Looks up the most recently parsed entry whose schema context was keyed
/// `target`, scanning backward. Used by `EncodedString` (key `"encoding"`)
/// and `Adjustment` (key `"adjustment"`) contexts to find their sibling.
fn sibling_value(entries: &[ContentEntry], entry_keys: &[u64], target: u64) -> Option<u64> {
    entry_keys
        .iter()
        .rposition(|&k| k == target)
        .map(|idx| entries[idx].as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_magic_returns_none() {
        assert!(parse(b"not a tag", None).is_none());
    }

    #[test]
    fn parses_s1_scenario_title_frame() {
        // v2.4 header declaring a 17-byte body (10-byte frame header + 7-byte
        // content), followed by a single TIT2 frame whose content is
        // "encoding=1 (UTF-16 BOM) FF FE 's' 'o'".
        let mut buf = vec![b'I', b'D', b'3', 4, 0, 0, 0, 0, 0, 17];
        buf.extend(b"TIT2");
        buf.extend(&[0, 0, 0, 7]); // syncsafe frame size = 7
        buf.extend(&[0, 0]); // frame flags
        buf.extend(&[0x01, 0xFF, 0xFE, 0x73, 0x00, 0x6F, 0x00]);

        let tag = parse(&buf, None).expect("tag should parse");
        assert_eq!(tag.frames().len(), 1);

        let frame = &tag.frames()[0];
        assert_eq!(frame.id(), "TIT2");

        let mut reader = frame.reader();
        let _encoding = reader.byte();
        let text = reader.raw();
        assert_eq!(String::from_utf8(text).unwrap(), "so");
    }
}
