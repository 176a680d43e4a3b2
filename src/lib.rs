//! A context-driven, version-polymorphic codec for ID3v2 tags.
//!
//! Unlike a tag library built from one struct per frame type, this crate
//! describes each frame identifier's on-disk layout as a schema of
//! [`id3v2::context::ContentContext`] values and walks every frame with the
//! same parser and serializer. This is what lets it round-trip frames it has
//! never heard of: an unrecognized `T***`/`W***` identifier falls back to
//! the generic text/URL schema, and anything else falls back to a single
//! opaque binary context.
//!
//! ID3v1 tags, audio decoding, and the file-level read/write convenience
//! wrappers are intentionally out of scope; this crate exposes the
//! primitives those collaborators need ([`id3v2::Tag`], [`file::write_tag`]).

#![forbid(unsafe_code)]

#[macro_use]
mod core;

pub mod err;
pub mod file;
pub mod id3v2;
pub mod string;
