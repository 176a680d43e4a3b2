//! Tag headers, versions, and the extended header.

use crate::core::io::BufStream;
use crate::err::{ParseError, ParseResult};
use crate::id3v2::syncdata;
use log::error;
use std::convert::TryInto;
use std::fmt::{self, Display, Formatter};

const ID: &[u8] = b"ID3";
const FOOTER_ID: &[u8] = b"3DI";

/// The version an ID3v2 tag was parsed as.
///
/// This cannot be used for writing tags; see [`SaveVersion`] for that.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Version {
    V22,
    V23,
    V24,
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::V22 => write!(f, "ID3v2.2"),
            Self::V23 => write!(f, "ID3v2.3"),
            Self::V24 => write!(f, "ID3v2.4"),
        }
    }
}

impl From<SaveVersion> for Version {
    fn from(other: SaveVersion) -> Self {
        match other {
            SaveVersion::V23 => Version::V23,
            SaveVersion::V24 => Version::V24,
        }
    }
}

/// The version a tag may be serialized as. ID3v2.2 cannot be written, only
/// read and upgraded.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum SaveVersion {
    V23,
    V24,
}

/// The 10-byte prelude of every ID3v2 tag.
#[derive(Clone, Debug)]
pub struct TagHeader {
    version: Version,
    tag_size: u32,
    flags: TagFlags,
}

impl TagHeader {
    pub(crate) fn parse(raw: [u8; 10]) -> ParseResult<Self> {
        if &raw[0..3] != ID {
            error!("no id3v2 identifier found");
            return Err(ParseError::NotFound);
        }

        let version = match raw[3] {
            2 => Version::V22,
            3 => Version::V23,
            4 => Version::V24,
            m => {
                error!("ID3v2.{} is not supported", m);
                return Err(ParseError::Version);
            }
        };

        let flags = raw[5];

        let unused_mask = match version {
            Version::V22 => 0x3F,
            Version::V23 => 0x1F,
            Version::V24 => 0x0F,
        };

        if flags & unused_mask != 0 {
            error!("unused flags are set on the tag header");
            return Err(ParseError::MalformedData);
        }

        // Compression has no defined frame layout in v2.2; reject rather
        // than silently produce an unreadable tag.
        if version == Version::V22 && flags & 0x40 != 0 {
            error!("ID3v2.2 compression is not supported");
            return Err(ParseError::Version);
        }

        let flags = TagFlags {
            unsync: flags & 0x80 != 0,
            extended: version != Version::V22 && flags & 0x40 != 0,
            experimental: version != Version::V22 && flags & 0x20 != 0,
            footer: version == Version::V24 && flags & 0x10 != 0,
        };

        let tag_size = syncdata::to_u28(raw[6..10].try_into().unwrap());

        if tag_size == 0 || tag_size > 256_000_000 {
            error!("tag size can only be 1b..256mb");
            return Err(ParseError::MalformedData);
        }

        Ok(Self {
            version,
            tag_size,
            flags,
        })
    }

    pub(crate) fn render(&self) -> [u8; 10] {
        assert_ne!(self.version, Version::V22, "ID3v2.2 tags cannot be written");

        let mut header = [b'I', b'D', b'3', 0, 0, 0, 0, 0, 0, 0];

        match self.version {
            Version::V24 => header[3] = 4,
            Version::V23 => header[3] = 3,
            Version::V22 => unreachable!(),
        }

        header[5] |= u8::from(self.flags.unsync) * 0x80;
        header[5] |= u8::from(self.flags.extended) * 0x40;
        header[5] |= u8::from(self.flags.experimental) * 0x20;
        header[5] |= u8::from(self.flags.footer) * 0x10;

        header[6..10].copy_from_slice(&syncdata::from_u28(self.tag_size));

        header
    }

    /// Renders a v2.4 footer, identical to the header but with magic "3DI".
    pub(crate) fn render_footer(&self) -> [u8; 10] {
        let mut footer = self.render();
        footer[0..3].copy_from_slice(FOOTER_ID);
        footer
    }

    pub(crate) fn with_version(version: Version) -> Self {
        Self {
            version,
            tag_size: 0,
            flags: TagFlags::default(),
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn size(&self) -> u32 {
        self.tag_size
    }

    pub fn flags(&self) -> TagFlags {
        self.flags
    }

    pub(crate) fn version_mut(&mut self) -> &mut Version {
        &mut self.version
    }

    pub(crate) fn size_mut(&mut self) -> &mut u32 {
        &mut self.tag_size
    }

    pub fn flags_mut(&mut self) -> &mut TagFlags {
        &mut self.flags
    }
}

/// The tag-level flags, version-gated at parse time: an extended-header or
/// footer flag can never be set on a `Version::V22` header.
#[derive(Default, Clone, Copy, Debug)]
pub struct TagFlags {
    pub unsync: bool,
    pub extended: bool,
    pub experimental: bool,
    pub footer: bool,
}

/// The extended header, present only on v2.3/v2.4 tags.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub padding_size: Option<u32>,
    pub crc32: Option<u32>,
    pub is_update: bool,
    pub restrictions: Option<Restrictions>,
}

impl ExtendedHeader {
    pub(crate) fn parse(stream: &mut BufStream, version: Version) -> ParseResult<Self> {
        match version {
            Version::V22 => Err(ParseError::Version),
            Version::V23 => parse_ext_v3(stream),
            Version::V24 => parse_ext_v4(stream),
        }
    }

    pub(crate) fn render(&self, version: Version) -> Vec<u8> {
        assert_ne!(version, Version::V22);

        match version {
            Version::V24 => render_ext_v4(self),
            Version::V23 => render_ext_v3(self),
            Version::V22 => unreachable!(),
        }
    }

    /// Clears the restriction bits and the restrictions-present state
    /// atomically, per the tag header's restriction-byte contract.
    pub fn clear_restrictions(&mut self) {
        self.restrictions = None;
    }

    pub(crate) fn update(&mut self, to: SaveVersion) {
        match to {
            SaveVersion::V23 => {
                self.padding_size = Some(self.padding_size.unwrap_or(0));
                self.is_update = false;
                self.restrictions = None;
            }
            SaveVersion::V24 => {
                self.padding_size = None;
            }
        }
    }
}

fn parse_ext_v3(stream: &mut BufStream) -> ParseResult<ExtendedHeader> {
    let size = stream.read_be_u32()?;

    if size != 6 && size != 10 {
        error!("ID3v2.3 extended headers are 6 or 10 bytes, found {}", size);
        return Err(ParseError::MalformedData);
    }

    let flags = stream.read_be_u16()?;

    let mut header = ExtendedHeader {
        padding_size: Some(stream.read_be_u32()?),
        crc32: None,
        is_update: false,
        restrictions: None,
    };

    if flags & 0x8000 != 0 {
        header.crc32 = Some(stream.read_be_u32()?);
    }

    Ok(header)
}

fn parse_ext_v4(stream: &mut BufStream) -> ParseResult<ExtendedHeader> {
    let size = syncdata::to_u28(stream.read_array()?);

    if !(6..=15).contains(&size) {
        error!("ID3v2.4 extended headers can only be 6 to 15 bytes long");
        return Err(ParseError::MalformedData);
    }

    if stream.read_u8()? != 1 {
        error!("ID3v2.4 extended headers must have a flag count of 1");
        return Err(ParseError::MalformedData);
    }

    let mut header = ExtendedHeader {
        padding_size: None,
        crc32: None,
        is_update: false,
        restrictions: None,
    };

    let flags = stream.read_u8()?;

    if flags & 0x40 != 0 {
        if stream.read_u8()? != 0 {
            error!("invalid is_update length");
            return Err(ParseError::MalformedData);
        }

        header.is_update = true;
    }

    if flags & 0x20 != 0 {
        if stream.read_u8()? != 5 {
            error!("invalid CRC-32 length");
            return Err(ParseError::MalformedData);
        }

        header.crc32 = Some(syncdata::to_u35(stream.read_array()?));
    }

    if flags & 0x10 != 0 {
        if stream.read_u8()? != 1 {
            error!("invalid restrictions length");
            return Err(ParseError::MalformedData);
        }

        header.restrictions = Some(Restrictions::from_byte(stream.read_u8()?));
    }

    Ok(header)
}

fn render_ext_v3(header: &ExtendedHeader) -> Vec<u8> {
    let mut data = vec![0, 0, 0, 6, 0, 0];

    data.extend(header.padding_size.unwrap_or_default().to_be_bytes());

    if let Some(crc) = header.crc32 {
        data[3] = 10;
        data[4] = 0x80;
        data.extend(crc.to_be_bytes());
    }

    data
}

fn render_ext_v4(header: &ExtendedHeader) -> Vec<u8> {
    let mut data = vec![0, 0, 0, 6, 1, 0];

    if header.is_update {
        data[3] += 1;
        data[5] |= 0x40;
        data.push(0);
    }

    if let Some(crc) = header.crc32 {
        data[3] += 6;
        data[5] |= 0x20;
        data.push(5);
        data.extend(syncdata::from_u35(crc));
    }

    if let Some(restrictions) = header.restrictions {
        data[3] += 2;
        data[5] |= 0x10;
        data.push(1);
        data.push(restrictions.to_byte());
    }

    data
}

/// The ID3v2.4 extended-header restriction byte, `%ppqrrstt`: tag-size class
/// (`pp`), text encoding (`q`), text field size class (`rr`), image encoding
/// (`s`), image size class (`tt`). These describe how the tag was
/// *encoded*; this crate preserves them but never enforces them on parse.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Restrictions {
    pub tag_size: TagSizeRestriction,
    pub text_encoding: TextEncodingRestriction,
    pub text_size: TextSizeRestriction,
    pub image_encoding: ImageEncodingRestriction,
    pub image_size: ImageSizeRestriction,
}

impl Restrictions {
    fn from_byte(restrictions: u8) -> Self {
        let tag_size = match restrictions >> 6 {
            0 => TagSizeRestriction::Max128Frames1Mb,
            1 => TagSizeRestriction::Max64Frames128Kb,
            2 => TagSizeRestriction::Max32Frames40Kb,
            3 => TagSizeRestriction::Max32Frames4Kb,
            _ => unreachable!(),
        };

        let text_encoding = match (restrictions & 0x20) >> 5 {
            0 => TextEncodingRestriction::None,
            _ => TextEncodingRestriction::Latin1OrUtf8,
        };

        let text_size = match (restrictions & 0x18) >> 3 {
            0 => TextSizeRestriction::None,
            1 => TextSizeRestriction::LessThan1024Chars,
            2 => TextSizeRestriction::LessThan128Chars,
            3 => TextSizeRestriction::LessThan30Chars,
            _ => unreachable!(),
        };

        let image_encoding = match (restrictions & 0x4) >> 2 {
            0 => ImageEncodingRestriction::None,
            _ => ImageEncodingRestriction::OnlyPngOrJpeg,
        };

        let image_size = match restrictions & 0x3 {
            0 => ImageSizeRestriction::None,
            1 => ImageSizeRestriction::LessThan256x256,
            2 => ImageSizeRestriction::LessThan64x64,
            3 => ImageSizeRestriction::Exactly64x64,
            _ => unreachable!(),
        };

        Restrictions {
            tag_size,
            text_encoding,
            text_size,
            image_encoding,
            image_size,
        }
    }

    fn to_byte(self) -> u8 {
        let mut bits = 0;
        bits |= (self.tag_size as u8) << 6;
        bits |= (self.text_encoding as u8) << 5;
        bits |= (self.text_size as u8) << 3;
        bits |= (self.image_encoding as u8) << 2;
        bits |= self.image_size as u8;
        bits
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TagSizeRestriction {
    Max128Frames1Mb = 0,
    Max64Frames128Kb = 1,
    Max32Frames40Kb = 2,
    Max32Frames4Kb = 3,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextEncodingRestriction {
    None = 0,
    Latin1OrUtf8 = 1,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextSizeRestriction {
    None = 0,
    LessThan1024Chars = 1,
    LessThan128Chars = 2,
    LessThan30Chars = 3,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageEncodingRestriction {
    None = 0,
    OnlyPngOrJpeg = 1,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageSizeRestriction {
    None = 0,
    LessThan256x256 = 1,
    LessThan64x64 = 2,
    Exactly64x64 = 3,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::BufStream;

    const EXT_DATA_V3: &[u8] = b"\x00\x00\x00\x0A\x80\x00\xAB\xCD\xEF\x16\x16\x16\x16\x16";
    const EXT_DATA_V4: &[u8] = b"\x00\x00\x00\x0F\x01\x70\x00\x05\x07\x5E\x37\x5E\x16\x01\xB4";

    #[test]
    fn parse_v3_tag_header() {
        let data = b"\x49\x44\x33\x03\x00\xA0\x00\x08\x49\x30";
        let header = TagHeader::parse(*data).unwrap();
        let flags = header.flags();

        assert_eq!(header.size(), 140464);
        assert_eq!(header.version(), Version::V23);

        assert!(flags.unsync);
        assert!(!flags.extended);
        assert!(flags.experimental);
    }

    #[test]
    fn parse_v4_tag_header() {
        let data = b"\x49\x44\x33\x04\x00\x50\x00\x08\x49\x30";
        let header = TagHeader::parse(*data).unwrap();
        let flags = header.flags();

        assert_eq!(header.size(), 140464);
        assert_eq!(header.version(), Version::V24);

        assert!(!flags.unsync);
        assert!(flags.extended);
        assert!(!flags.experimental);
        assert!(flags.footer);
    }

    #[test]
    fn reject_unknown_major_version() {
        let data = b"\x49\x44\x33\x05\x00\x00\x00\x08\x49\x30";
        assert_eq!(TagHeader::parse(*data).unwrap_err(), ParseError::Version);
    }

    #[test]
    fn parse_v3_ext_header() {
        let header =
            ExtendedHeader::parse(&mut BufStream::new(EXT_DATA_V3), Version::V23).unwrap();

        assert_eq!(header.padding_size, Some(0xABCD_EF16));
        assert_eq!(header.crc32, Some(0x1616_1616));
        assert!(!header.is_update);
        assert_eq!(header.restrictions, None);
    }

    #[test]
    fn parse_v4_ext_header() {
        let header =
            ExtendedHeader::parse(&mut BufStream::new(EXT_DATA_V4), Version::V24).unwrap();

        assert_eq!(header.padding_size, None);
        assert_eq!(header.crc32, Some(0x7BCD_EF16));
        assert!(header.is_update);

        let restrictions = header.restrictions.unwrap();

        assert_eq!(restrictions.tag_size, TagSizeRestriction::Max32Frames40Kb);
        assert_eq!(
            restrictions.text_encoding,
            TextEncodingRestriction::Latin1OrUtf8
        );
        assert_eq!(
            restrictions.text_size,
            TextSizeRestriction::LessThan128Chars
        );
        assert_eq!(
            restrictions.image_encoding,
            ImageEncodingRestriction::OnlyPngOrJpeg
        );
        assert_eq!(restrictions.image_size, ImageSizeRestriction::None);
    }

    #[test]
    fn render_v3_ext_header() {
        let header = ExtendedHeader {
            padding_size: Some(0xABCD_EF16),
            crc32: Some(0x1616_1616),
            ..Default::default()
        };

        assert_eq!(header.render(Version::V23), EXT_DATA_V3);
    }

    #[test]
    fn render_v4_ext_header() {
        let header = ExtendedHeader {
            crc32: Some(0x7BCD_EF16),
            is_update: true,
            restrictions: Some(Restrictions {
                tag_size: TagSizeRestriction::Max32Frames40Kb,
                text_encoding: TextEncodingRestriction::Latin1OrUtf8,
                text_size: TextSizeRestriction::LessThan128Chars,
                image_encoding: ImageEncodingRestriction::OnlyPngOrJpeg,
                image_size: ImageSizeRestriction::None,
            }),
            ..Default::default()
        };

        assert_eq!(header.render(Version::V24), EXT_DATA_V4);
    }

    #[test]
    fn footer_shares_fields_but_swaps_magic() {
        let header = TagHeader::with_version(Version::V24);
        let footer = header.render_footer();
        assert_eq!(&footer[0..3], FOOTER_ID);
    }
}
