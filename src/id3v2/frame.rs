//! Frame headers and the frame aggregate: header + schema + parsed entries.

use crate::core::io::BufStream;
use crate::core::raw;
use crate::err::{ParseError, ParseResult, SerializeError, SerializeResult};
use crate::id3v2::context::{ContentContext, ContextType, Schema};
use crate::id3v2::entry::ContentEntry;
use crate::id3v2::header::Version;
use crate::id3v2::syncdata;

/// A frame identifier, header flags, and whatever extra per-flag fields
/// (group symbol, encryption symbol, decompressed size) the version defines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    frame_id: String,
    frame_size: usize,
    flags: FrameFlags,
    group_symbol: Option<u8>,
    encryption_symbol: Option<u8>,
    decompressed_size: Option<u32>,
}

impl FrameHeader {
    pub fn new(frame_id: &str) -> Self {
        Self::with_flags(frame_id, FrameFlags::default())
    }

    pub fn with_flags(frame_id: &str, flags: FrameFlags) -> Self {
        if !is_frame_id(frame_id.as_bytes()) {
            panic!("a frame ID must be 3 or 4 uppercase ASCII letters/digits");
        }

        FrameHeader {
            frame_id: frame_id.to_string(),
            frame_size: 0,
            flags,
            group_symbol: None,
            encryption_symbol: None,
            decompressed_size: None,
        }
    }

    /// Parses the version-specific frame prelude (identifier + size + flags)
    /// and then, per the just-parsed flags, the extra fields a v2.3/v2.4
    /// frame may carry ahead of its body: group symbol, encryption symbol,
    /// and (v2.4 only) a syncsafe data-length indicator.
    pub(crate) fn parse(version: Version, stream: &mut BufStream) -> ParseResult<Self> {
        let mut header = match version {
            Version::V22 => parse_header_v2(stream)?,
            Version::V23 => parse_header_v3(stream)?,
            Version::V24 => parse_header_v4(stream)?,
        };

        header.parse_extra_fields(version, stream)?;

        Ok(header)
    }

    fn parse_extra_fields(&mut self, version: Version, stream: &mut BufStream) -> ParseResult<()> {
        if version == Version::V22 {
            return Ok(());
        }

        if self.flags.grouped {
            self.group_symbol = Some(stream.read_u8()?);
            self.frame_size = self.frame_size.saturating_sub(1);
        }

        if self.flags.encrypted {
            self.encryption_symbol = Some(stream.read_u8()?);
            self.frame_size = self.frame_size.saturating_sub(1);
        }

        if version == Version::V24 && self.flags.has_data_len {
            self.decompressed_size = Some(syncdata::to_u28(stream.read_array()?));
            self.frame_size = self.frame_size.saturating_sub(4);
        }

        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.frame_id
    }

    pub fn size(&self) -> usize {
        self.frame_size
    }

    pub fn flags(&self) -> &FrameFlags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut FrameFlags {
        &mut self.flags
    }

    pub(crate) fn size_mut(&mut self) -> &mut usize {
        &mut self.frame_size
    }

    /// Non-zero (`Some`) iff the format flags mark this frame's body as
    /// compressed; the core never decompresses it.
    pub fn is_compressed(&self) -> bool {
        self.flags.compressed
    }

    /// Non-zero (`Some`) iff the format flags mark this frame's body as
    /// encrypted; the core never decrypts it.
    pub fn is_encrypted(&self) -> bool {
        self.flags.encrypted
    }

    pub fn group_symbol(&self) -> Option<u8> {
        self.group_symbol
    }

    pub fn encryption_symbol(&self) -> Option<u8> {
        self.encryption_symbol
    }

    pub fn decompressed_size(&self) -> Option<u32> {
        self.decompressed_size
    }

    /// Renders the frame header for `version`, including the version's
    /// frame-size width (3-byte big-endian for v2.2, 4-byte big-endian for
    /// v2.3, 4-byte syncsafe for v2.4) and any extra per-flag fields.
    pub(crate) fn render(&self, version: Version) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(self.frame_id.as_bytes());

        match version {
            Version::V22 => out.extend(&raw::from_size(self.frame_size, 3)),
            Version::V23 => out.extend((self.frame_size as u32).to_be_bytes()),
            Version::V24 => out.extend(syncdata::from_u28(self.frame_size as u32)),
        }

        if version != Version::V22 {
            out.push(self.flags.render_status(version));
            out.push(self.flags.render_format(version));

            if self.flags.grouped {
                out.push(self.group_symbol.unwrap_or(0));
            }

            if self.flags.encrypted {
                out.push(self.encryption_symbol.unwrap_or(0));
            }

            if version == Version::V24 && self.flags.has_data_len {
                out.extend(syncdata::from_u28(self.decompressed_size.unwrap_or(0)));
            }
        }

        out
    }
}

fn parse_header_v2(stream: &mut BufStream) -> ParseResult<FrameHeader> {
    let frame_id = new_frame_id(&stream.read_array::<3>()?)?;
    let frame_size = raw::to_size(&stream.read_array::<3>()?);

    Ok(FrameHeader {
        frame_id,
        frame_size,
        flags: FrameFlags::default(),
        group_symbol: None,
        encryption_symbol: None,
        decompressed_size: None,
    })
}

fn parse_header_v3(stream: &mut BufStream) -> ParseResult<FrameHeader> {
    let frame_id = new_frame_id(&stream.read_array::<4>()?)?;
    let frame_size = raw::to_size(&stream.read_array::<4>()?);

    let stat_flags = stream.read_u8()?;
    let format_flags = stream.read_u8()?;

    Ok(FrameHeader {
        frame_id,
        frame_size,
        flags: FrameFlags {
            tag_should_discard: raw::bit_at(7, stat_flags),
            file_should_discard: raw::bit_at(6, stat_flags),
            read_only: raw::bit_at(5, stat_flags),
            compressed: raw::bit_at(7, format_flags),
            encrypted: raw::bit_at(6, format_flags),
            grouped: raw::bit_at(5, format_flags),
            unsync: false,
            has_data_len: false,
        },
        group_symbol: None,
        encryption_symbol: None,
        decompressed_size: None,
    })
}

fn parse_header_v4(stream: &mut BufStream) -> ParseResult<FrameHeader> {
    let frame_id = new_frame_id(&stream.read_array::<4>()?)?;

    // ID3v2.4 sizes are syncsafe, but iTunes has historically written raw
    // ID3v2.3-style sizes instead. `syncdata::to_u28` already falls back to
    // a raw big-endian read when a byte has its high bit set, which is
    // enough to recover an iTunes-written size without a dedicated
    // lookahead heuristic.
    let frame_size = syncdata::to_u28(stream.read_array()?) as usize;

    let stat_flags = stream.read_u8()?;
    let format_flags = stream.read_u8()?;

    Ok(FrameHeader {
        frame_id,
        frame_size,
        flags: FrameFlags {
            tag_should_discard: raw::bit_at(6, stat_flags),
            file_should_discard: raw::bit_at(5, stat_flags),
            read_only: raw::bit_at(4, stat_flags),
            grouped: raw::bit_at(6, format_flags),
            compressed: raw::bit_at(3, format_flags),
            encrypted: raw::bit_at(2, format_flags),
            unsync: raw::bit_at(1, format_flags),
            has_data_len: raw::bit_at(0, format_flags),
        },
        group_symbol: None,
        encryption_symbol: None,
        decompressed_size: None,
    })
}

fn new_frame_id(frame_id: &[u8]) -> ParseResult<String> {
    if !is_frame_id(frame_id) {
        return Err(ParseError::MalformedData);
    }

    String::from_utf8(frame_id.to_vec()).map_err(|_| ParseError::MalformedData)
}

/// A printable frame identifier: uppercase ASCII letters or digits, 3 bytes
/// wide for v2.2, 4 bytes wide for v2.3/v2.4. A leading 0x00 marks
/// end-of-frames padding, not an identifier, and is rejected here.
pub(crate) fn is_frame_id(frame_id: &[u8]) -> bool {
    if frame_id.is_empty() || frame_id[0] == 0 {
        return false;
    }

    frame_id
        .iter()
        .all(|&ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
}

/// Per-frame status/format flags. `unsync` and `has_data_len` only exist on
/// ID3v2.4; they are simply never set when parsing/rendering earlier
/// versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameFlags {
    pub tag_should_discard: bool,
    pub file_should_discard: bool,
    pub read_only: bool,
    pub grouped: bool,
    pub compressed: bool,
    pub encrypted: bool,
    pub unsync: bool,
    pub has_data_len: bool,
}

impl Default for FrameFlags {
    fn default() -> Self {
        FrameFlags {
            tag_should_discard: false,
            file_should_discard: false,
            read_only: false,
            grouped: false,
            compressed: false,
            encrypted: false,
            unsync: false,
            has_data_len: false,
        }
    }
}

impl FrameFlags {
    fn render_status(&self, version: Version) -> u8 {
        let (discard_bit, file_bit, ro_bit) = match version {
            Version::V23 => (7, 6, 5),
            Version::V24 => (6, 5, 4),
            Version::V22 => unreachable!(),
        };

        let mut byte = 0;
        byte |= u8::from(self.tag_should_discard) << discard_bit;
        byte |= u8::from(self.file_should_discard) << file_bit;
        byte |= u8::from(self.read_only) << ro_bit;
        byte
    }

    fn render_format(&self, version: Version) -> u8 {
        match version {
            Version::V23 => {
                let mut byte = 0;
                byte |= u8::from(self.compressed) << 7;
                byte |= u8::from(self.encrypted) << 6;
                byte |= u8::from(self.grouped) << 5;
                byte
            }
            Version::V24 => {
                let mut byte = 0;
                byte |= u8::from(self.grouped) << 6;
                byte |= u8::from(self.compressed) << 3;
                byte |= u8::from(self.encrypted) << 2;
                byte |= u8::from(self.unsync) << 1;
                byte |= u8::from(self.has_data_len);
                byte
            }
            Version::V22 => unreachable!(),
        }
    }
}

/// A frame header, its (deep-copied) schema, and the entries parsed against
/// that schema, in schema order.
#[derive(Clone, Debug)]
pub struct Frame {
    header: FrameHeader,
    schema: Schema,
    entries: Vec<ContentEntry>,
}

/// Frame equality is header-plus-entries, matching the prefix-equality rule
/// [`ContentEntry`] uses: two parses of the same frame that disagree only on
/// a trailing terminator byte still compare equal. The schema itself is not
/// part of the comparison — it is a derived, version-dependent artifact of
/// the identifier, not frame identity.
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.entries == other.entries
    }
}

impl Eq for Frame {}

impl Frame {
    /// Builds a fresh frame for `id` against `version`'s schema (resolved
    /// through `extra`, same as the parser), with every entry pre-filled to
    /// its context's minimum size. `Iter`-governed fields start with zero
    /// repetitions; grow them by writing additional loop-body entries is not
    /// supported by [`EntryWriter`] today, so repeating frames (equalization,
    /// event timing, ...) are best built by round-tripping through
    /// [`crate::id3v2::Tag::parse`] rather than this constructor.
    pub fn new(id: &str, version: Version, extra: Option<&crate::id3v2::registry::Registry>) -> Self {
        let schema = crate::id3v2::registry::resolve(version, id, extra);
        let entries = default_entries(&schema);

        Frame {
            header: FrameHeader::new(id),
            schema,
            entries,
        }
    }

    pub(crate) fn from_parts(header: FrameHeader, schema: Schema, entries: Vec<ContentEntry>) -> Self {
        Frame {
            header,
            schema,
            entries,
        }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut FrameHeader {
        &mut self.header
    }

    pub fn id(&self) -> &str {
        self.header.id()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn entries(&self) -> &[ContentEntry] {
        &self.entries
    }

    pub fn reader(&self) -> EntryReader<'_> {
        EntryReader {
            schema: &self.schema,
            entries: &self.entries,
            pos: 0,
        }
    }

    pub fn writer(&mut self) -> EntryWriter<'_> {
        EntryWriter {
            schema: &self.schema,
            entries: &mut self.entries,
            pos: 0,
        }
    }
}

/// A stateful, read-only cursor over a frame's entries, advanced one entry
/// at a time by each typed accessor.
pub struct EntryReader<'a> {
    schema: &'a Schema,
    entries: &'a [ContentEntry],
    pos: usize,
}

impl<'a> EntryReader<'a> {
    fn current(&self) -> Option<&'a ContentEntry> {
        self.entries.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    /// The first byte of the next entry, or 0 if the entry is empty or the
    /// cursor has run off the end of the list.
    pub fn byte(&mut self) -> u8 {
        let value = self.current().and_then(|e| e.bytes().first()).copied().unwrap_or(0);
        self.advance();
        value
    }

    pub fn u16(&mut self) -> u16 {
        let value = self.current().map(|e| e.as_u64() as u16).unwrap_or(0);
        self.advance();
        value
    }

    pub fn u32(&mut self) -> u32 {
        let value = self.current().map(|e| e.as_u64() as u32).unwrap_or(0);
        self.advance();
        value
    }

    /// Copies the raw bytes of the next entry.
    pub fn raw(&mut self) -> Vec<u8> {
        let value = self.current().map(|e| e.bytes().to_vec()).unwrap_or_default();
        self.advance();
        value
    }

    /// Decodes the next entry as UTF-8 text, escaping `"` and `\` so the
    /// result is safe to drop straight into a JSON string body.
    ///
    /// Entries produced for `EncodedString`/`Latin1` contexts are already
    /// normalised to UTF-8 bytes by the parser, so this is a lossy
    /// `from_utf8` plus escaping rather than a BOM-sniffing transcode.
    pub fn char(&mut self) -> String {
        let value = self
            .current()
            .map(|e| escape_json(&String::from_utf8_lossy(e.bytes())))
            .unwrap_or_default();
        self.advance();
        value
    }

    /// Context at the cursor's current position, if any remains in the
    /// schema (used by callers that want to know the type before reading).
    pub fn context(&self) -> Option<&'a ContentContext> {
        self.schema.get(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.entries.len()
    }
}

/// A stateful cursor that replaces entries in place, bound-checked against
/// the schema's positional `[min, max]`.
pub struct EntryWriter<'a> {
    schema: &'a Schema,
    entries: &'a mut Vec<ContentEntry>,
    pos: usize,
}

/// Upper bound of the defined ID3v2.4 `APIC`/`PIC` picture-type table
/// (0x00 "Other" through 0x14 "Band/Artist logotype"). A value past this
/// has no defined meaning, so writing one is rejected outright rather than
/// silently clamped.
const MAX_PICTURE_TYPE: u64 = 0x14;

impl<'a> EntryWriter<'a> {
    /// Replaces the entry at the cursor with `data`, clamped to the
    /// positional context's bound, then advances. Fails with
    /// [`SerializeError::Bound`] if the cursor has run past either the
    /// schema or the entry list, or if `data` is a `picture_type` value
    /// outside the defined ID3v2.4 table.
    pub fn write_entry(&mut self, data: Vec<u8>) -> SerializeResult<()> {
        let context = self.schema.get(self.pos).ok_or(SerializeError::Bound)?;

        if self.pos >= self.entries.len() {
            return Err(SerializeError::Bound);
        }

        if context.key == crate::id3v2::context::djb2("picture_type") {
            let value = ContentEntry::new(data.clone()).as_u64();
            if value > MAX_PICTURE_TYPE {
                return Err(SerializeError::Bound);
            }
        }

        let mut data = data;

        if data.len() > context.max {
            data.truncate(context.max);
        }

        if data.len() < context.min {
            data.resize(context.min, 0);
        }

        self.entries[self.pos] = ContentEntry::new(data);
        self.pos += 1;

        Ok(())
    }
}

/// One zero-filled entry per non-marker context in `schema`, sized to each
/// context's minimum. `Iter` contexts contribute no entries (zero
/// repetitions); `Unknown` contexts contribute none either, matching the
/// parser's "nothing declared yet" state for an identifier this crate has no
/// rule for.
fn default_entries(schema: &Schema) -> Vec<ContentEntry> {
    schema
        .iter()
        .filter_map(|context| match context.context_type {
            ContextType::Iter | ContextType::Unknown => None,
            ContextType::Bit => {
                let width = ((context.max + 7) / 8).max(1);
                Some(ContentEntry::new(vec![0u8; width]))
            }
            _ => Some(ContentEntry::new(vec![0u8; context.min])),
        })
        .collect()
}

fn escape_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out
}
