//! The content-context schema that drives frame parsing and serialization.
//!
//! Every frame identifier resolves to a [`Schema`]: an ordered list of
//! [`ContentContext`] values describing the fields that make up the frame's
//! body, in on-disk order. The parser and serializer never special-case a
//! frame identifier directly; they walk whatever schema [`registry`] hands
//! them.

use std::hash::Hasher;

/// The kind of field a [`ContentContext`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextType {
    /// A fixed-width big-endian integer, `min == max` bytes wide.
    Numeric,
    /// A string prefixed or governed by a sibling `"encoding"` entry,
    /// terminated by that encoding's null unless clamped by `max`.
    EncodedString,
    /// A string that is always ISO-8859-1/ASCII, regardless of any sibling
    /// encoding entry (URLs, MIME types, identifiers).
    Latin1,
    /// Raw bytes with no text semantics (language codes, 3-letter picture
    /// format tags, ...), with no encoding-driven termination.
    NoEncoding,
    /// Opaque binary data, normally the remainder of the frame.
    Binary,
    /// A fixed-width field interpreted as IEEE-754 when rendered (only the
    /// "adjustment/volume" style frames use this).
    Precision,
    /// A sub-byte field, `max` bits wide, packed MSB-first with adjacent
    /// `Bit` contexts into as few bytes as the run requires.
    Bit,
    /// A marker that repeats the `min` contexts immediately preceding it
    /// until the frame's body is exhausted.
    Iter,
    /// A binary field whose length is given by the value of a sibling entry
    /// keyed `"adjustment"`.
    Adjustment,
    /// A context type this crate does not have a rule for. Serialization
    /// refuses it outright; parsing treats it as "consume the rest".
    Unknown,
}

/// A single field in a frame's [`Schema`].
///
/// `min`/`max` are an inclusive byte-count bound for every context type
/// except [`ContextType::Bit`], where they are a bit count, and
/// [`ContextType::Iter`], where `min` is instead "how many preceding
/// contexts this marker repeats".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentContext {
    pub context_type: ContextType,
    /// The djb2 hash of this field's name, used for sibling lookups (e.g an
    /// `EncodedString` context finding the `"encoding"` entry that precedes
    /// it, or an `Adjustment` context finding its `"adjustment"` sibling).
    pub key: u64,
    pub min: usize,
    pub max: usize,
}

impl ContentContext {
    pub const fn new(context_type: ContextType, key: u64, min: usize, max: usize) -> Self {
        ContentContext {
            context_type,
            key,
            min,
            max,
        }
    }
}

/// An ordered description of a frame body's layout.
pub type Schema = Vec<ContentContext>;

/// Hashes `name` with djb2, the same algorithm the reference C
/// implementation uses to key its content contexts.
///
/// djb2 is not cryptographic; it exists here purely so schema authors can
/// write `key("encoding")` instead of carrying string keys (and their
/// comparisons) through the hot parse/serialize path.
pub fn djb2(name: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in name.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(u64::from(byte));
    }
    hash
}

/// A `Hasher`-based alternative kept for parity with the reference
/// implementation's incremental hashing; [`djb2`] is the one the registry
/// actually uses.
#[derive(Default)]
pub(crate) struct Djb2 {
    hash: u64,
}

impl Djb2 {
    pub(crate) fn new() -> Self {
        Djb2 { hash: 5381 }
    }
}

impl Hasher for Djb2 {
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.hash = self.hash.wrapping_mul(33).wrapping_add(u64::from(byte));
        }
    }

    fn finish(&self) -> u64 {
        self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn djb2_matches_known_constant() {
        // djb2("") == 5381, the standard initial value.
        assert_eq!(djb2(""), 5381);
    }

    #[test]
    fn djb2_is_stable_across_calls() {
        assert_eq!(djb2("encoding"), djb2("encoding"));
        assert_ne!(djb2("encoding"), djb2("adjustment"));
    }

    #[test]
    fn hasher_impl_agrees_with_free_function() {
        let mut hasher = Djb2::new();
        hasher.write(b"text");
        assert_eq!(hasher.finish(), djb2("text"));
    }
}
