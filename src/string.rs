/// Tag string handling.

use crate::core::io::BufStream;
use log::warn;

/// The internal representation of text encodings in musikr.
///
/// Not all tag formats will use encodings in the same way. For example, ID3v2 will give you multiple options
/// for encoding frames, but Xiph tags are only limited to UTF-8. If you want the least hassle, use the default
/// encoding of [`Encoding::Utf8`](Encoding::Utf8) if you have the choice.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Encoding {
    /// ISO-8859-1, also known as Latin1. This is used in the older tag formats like ID3v1 and ID3v2.
    /// Using this encoding is discouraged, as all Unicode text in a string will be flattened into "?"
    /// characters when written. Use [`Utf16`](Encoding::Utf16) or [`Utf8`](Encoding::Utf8) instead if possible.
    Latin1,
    /// UTF-16 with a BOM. In practice, this will be UTF-16LE with a `0xFFFE` BOM. This generally provides
    /// the best compromise between rust strings and the more antiquated tag formats, and is what other
    /// encodings map to when they are not supported.
    Utf16,
    /// UTF-16BE with no BOM. This is only used in the ID3v2.4 format. In all other cases its mapped
    /// to [`Utf16`](Encoding::Utf16).
    Utf16Be,
    /// UTF-8. This will allow the direct mapping of rust strings to tag data, but is not supported
    /// on all tag formats. If it is not supported, then it will be mapped to [`Utf16`](Encoding::Utf16).
    Utf8,
    /// UTF-16LE with no BOM. This is analogous to [`Utf16`](Encoding::Utf16) and will be written as such.
    Utf16Le,
}

impl Encoding {
    pub(crate) fn nul_size(&self) -> usize {
        match self {
            Self::Utf8 | Self::Latin1 => 1,
            _ => 2,
        }
    }

    /// Maps the one-byte wire discriminator ID3v2 stores ahead of an
    /// encoded-string context onto an [`Encoding`](Encoding). `None` for any
    /// value outside the four defined by the spec (0-3).
    pub(crate) fn from_discriminator(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Latin1),
            1 => Some(Self::Utf16),
            2 => Some(Self::Utf16Be),
            3 => Some(Self::Utf8),
            _ => None,
        }
    }

    /// The wire discriminator to write ahead of an encoded-string context.
    /// [`Utf16Le`](Encoding::Utf16Le) has no discriminator of its own; it is
    /// written identically to [`Utf16`](Encoding::Utf16) (BOM + LE data).
    pub(crate) fn discriminator(&self) -> u8 {
        match self {
            Self::Latin1 => 0,
            Self::Utf16 | Self::Utf16Le => 1,
            Self::Utf16Be => 2,
            Self::Utf8 => 3,
        }
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Self::Utf8
    }
}

/// Consumes the rest of this stream and decodes it into a string according
/// to the encoding,
pub(crate) fn read(encoding: Encoding, stream: &mut BufStream) -> String {
    decode(encoding, stream.take_rest())
}

/// Searches and consumes the stream up until a NUL terminator and decodes it into a
/// string according to the encoding. The string will not include the terminator.
pub(crate) fn read_terminated(encoding: Encoding, stream: &mut BufStream) -> String {
    // Search for the NUL terminator, which is 0x00 in Latin1/UTF-8 and 0x0000 in UTF-16,
    // The string data will not include the terminator, but the amount consumed in the
    // stream will.
    let string_data = match encoding.nul_size() {
        1 => stream.search(&[0]),
        2 => stream.search(&[0, 0]),
        _ => unreachable!(),
    };

    decode(encoding, string_data)
}

/// Returns the byte length of the terminated run starting at the stream's
/// current position, without consuming the stream. Mirrors
/// [`read_terminated`](read_terminated)'s search but leaves `stream` alone.
pub(crate) fn len_terminated(encoding: Encoding, stream: &BufStream) -> usize {
    let mut probe = stream.clone();
    let before = probe.pos();
    let _ = read_terminated(encoding, &mut probe);
    probe.pos() - before
}

/// Strictly encodes `string` as ISO-8859-1, failing if any character falls
/// outside the Latin-1 range. Used by contexts that are always Latin-1
/// regardless of the frame's encoding byte (URLs, MIME types, owner
/// identifiers) where silent mangling would corrupt a protocol field.
pub(crate) fn encode_latin1_strict(string: &str) -> Result<Vec<u8>, char> {
    string
        .chars()
        .map(|ch| {
            if u32::from(ch) > 0xFF {
                Err(ch)
            } else {
                Ok(ch as u8)
            }
        })
        .collect()
}

/// Renders a string according to the encoding
pub(crate) fn render(encoding: Encoding, string: &str) -> Vec<u8> {
    // Currently, our implementation just does the conversions and collects them into
    // a Vec. Should be efficient enough.
    match encoding {
        Encoding::Latin1 => encode_latin1(string),
        Encoding::Utf16 => encode_utf16(string),
        Encoding::Utf16Be => encode_utf16be(string),
        Encoding::Utf8 => string.as_bytes().to_vec(),
        Encoding::Utf16Le => encode_utf16le(string),
    }
}

/// Renders a string plus a NUL terminator according to the encoding
pub(crate) fn render_terminated(encoding: Encoding, string: &str) -> Vec<u8> {
    let mut result = render(encoding, string);

    // Append the NUL terminator to the end, one byte for Latin1/UTF-8 and two bytes for UTF-16
    result.resize(result.len() + encoding.nul_size(), 0);

    result
}

fn decode(encoding: Encoding, data: &[u8]) -> String {
    // Ensure that our data has no trailing NULs. This is done for two reasons:
    // 1. For terminated strings, BufStream::search will return the string data plus the terminator,
    // meaning that it has to be trimmed.
    // 2. Despite not having to, a TON of non-terminated string data will be nul-terminated, mostly to
    // make serializing into c-strings easy. But this is rust, and these NULs only pollute the string
    // and produce unexpected behavior, so we trim them.
    let data = match encoding.nul_size() {
        1 => data.strip_suffix(&[0]).unwrap_or(data),
        2 => data.strip_suffix(&[0, 0]).unwrap_or(data),
        _ => unreachable!(),
    };

    // All our decode operations will copy into owned string, as pretty much every piece of code
    // calling this function will need to own their data.
    match encoding {
        Encoding::Latin1 => decode_latin1(data),
        Encoding::Utf16 => decode_utf16(data),
        Encoding::Utf16Be => decode_utf16be(data),
        Encoding::Utf8 => String::from_utf8_lossy(data).to_string(),
        Encoding::Utf16Le => decode_utf16le(data),
    }
}

fn decode_latin1(data: &[u8]) -> String {
    // UTF-8 expresses high bits as two bytes instead of one, so we cannot convert directly.
    // Instead, we simply reinterpret the bytes as chars to make sure the code-points line up.
    data.iter().map(|&byte| char::from(byte)).collect()
}

fn decode_utf16(data: &[u8]) -> String {
    // There must be at least 2 bytes.
    if data.len() < 2 {
        return String::new();
    }

    // UTF16 requires us to figure out the endianness ourselves from the BOM
    match (data[0], data[1]) {
        (0xFF, 0xFE) => decode_utf16le(&data[2..]), // Little Endian
        (0xFE, 0xFF) => decode_utf16be(&data[2..]), // Big Endian
        _ => {
            // No BOM, assume UTF16-LE
            warn!("could not determine UTF-16 BOM, defaulting to UTF-16BE");
            decode_utf16be(data)
        }
    }
}

fn decode_utf16be(data: &[u8]) -> String {
    String::from_utf16_lossy(
        data.chunks_exact(2)
            .into_iter()
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<u16>>()
            .as_slice(),
    )
}

fn decode_utf16le(data: &[u8]) -> String {
    String::from_utf16_lossy(
        data.chunks_exact(2)
            .into_iter()
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect::<Vec<u16>>()
            .as_slice(),
    )
}

fn encode_latin1(string: &str) -> Vec<u8> {
    // All Latin1 chars line up with UTF-8 code-points, but everything else has
    // to be expressed as a ?
    string
        .chars()
        .map(|ch| if u32::from(ch) > 0xFF { b'?' } else { ch as u8 })
        .collect()
}

fn encode_utf16(string: &str) -> Vec<u8> {
    // UTF-16 requires a BOM at the beginning.
    let mut result: Vec<u8> = vec![0xFF, 0xFE];

    // For simplicity, we just write UTF16LE bytes every time.
    result.extend(encode_utf16le(string));

    result
}

fn encode_utf16be(string: &str) -> Vec<u8> {
    string
        .encode_utf16()
        .flat_map(|cp| cp.to_be_bytes())
        .collect()
}

fn encode_utf16le(string: &str) -> Vec<u8> {
    string
        .encode_utf16()
        .flat_map(|cp| cp.to_le_bytes())
        .collect()
}
