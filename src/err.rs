//! The error taxonomy shared across the crate.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Errors that can occur while parsing a tag from a byte buffer.
///
/// Errors at the *frame* level (everything but `Version` and `NotFound`) are
/// recovered locally by the parser: the offending frame is skipped and
/// parsing continues. Errors at the *tag* level are fatal to the whole
/// operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// No "ID3" identifier could be located.
    NotFound,
    /// A tag's major version is outside `{2, 3, 4}`, or a flag set is not
    /// legal for the tag's version (e.g an extended header on ID3v2.2).
    Version,
    /// A stream ran out of bytes before a fixed-size field could be read.
    NotEnoughData,
    /// A header or frame field failed a structural check (bad flag bits,
    /// malformed size, non-syncsafe integer where one was required, ...).
    MalformedData,
    /// No schema resolved for a frame identifier, even after the wildcard
    /// and generic-binary fallback. Unreachable as long as `"?"` is
    /// registered, but kept as a named case rather than `unreachable!()`.
    Schema,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let msg = match self {
            Self::NotFound => "no ID3v2 tag found",
            Self::Version => "unsupported or illegal tag version",
            Self::NotEnoughData => "not enough data to parse this field",
            Self::MalformedData => "malformed tag data",
            Self::Schema => "no schema resolved for this frame identifier",
        };

        write!(f, "{}", msg)
    }
}

impl Error for ParseError {}

/// Every `BufStream` read failure is an end-of-stream/underread condition,
/// so it always maps to `NotEnoughData`; the streaming readers used
/// throughout `id3v2` rely on this so `?` can cross from `io::Result` into
/// `ParseResult` without an explicit `.map_err`.
impl From<std::io::Error> for ParseError {
    fn from(_: std::io::Error) -> Self {
        ParseError::NotEnoughData
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Errors that can occur while serializing a tag back into a byte buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SerializeError {
    /// A schema referenced a context type or sibling key that cannot be
    /// resolved (e.g an adjustment context with no sibling keyed
    /// `"adjustment"`), or an `Unknown` context was reached.
    Schema,
    /// A version/feature combination that cannot be serialized (e.g a
    /// footer on ID3v2.3, or an extended header on ID3v2.2).
    Version,
    /// A string could not be losslessly transcoded into the encoding a
    /// context requires (e.g a non-Latin-1 character written into a
    /// `Latin1` context). Carries the offending character.
    Encoding(char),
    /// A write-cursor or entry index fell outside the bounds of the
    /// frame's schema or entry list.
    Bound,
}

impl Display for SerializeError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Schema => write!(f, "cannot serialize this frame's schema"),
            Self::Version => write!(f, "illegal version/feature combination"),
            Self::Encoding(ch) => {
                write!(f, "character '{}' cannot be losslessly transcoded", ch)
            }
            Self::Bound => write!(f, "write is out of bounds for this context"),
        }
    }
}

impl Error for SerializeError {}

pub type SerializeResult<T> = Result<T, SerializeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_is_stable() {
        assert_eq!(ParseError::NotFound.to_string(), "no ID3v2 tag found");
    }

    #[test]
    fn serialize_error_carries_offending_char() {
        let err = SerializeError::Encoding('€');
        assert_eq!(
            err.to_string(),
            "character '€' cannot be losslessly transcoded"
        );
    }
}
