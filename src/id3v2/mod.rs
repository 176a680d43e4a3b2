//! The ID3v2 codec: a context-driven, version-polymorphic parser and
//! serializer for ID3v2.2/2.3/2.4 tags.

pub mod context;
pub mod entry;
pub mod frame;
pub mod header;
mod json;
mod parser;
pub mod registry;
mod serializer;
mod syncdata;

pub use context::{ContentContext, ContextType, Schema};
pub use entry::ContentEntry;
pub use frame::{EntryReader, EntryWriter, Frame, FrameFlags, FrameHeader};
pub use header::{ExtendedHeader, Restrictions, SaveVersion, TagFlags, TagHeader, Version};
pub use registry::Registry;

use crate::err::SerializeResult;

/// A fully parsed ID3v2 tag: its header, optional extended header, and the
/// frames it carries, in on-disk order.
#[derive(Clone, Debug)]
pub struct Tag {
    header: TagHeader,
    ext_header: Option<ExtendedHeader>,
    frames: Vec<Frame>,
}

impl Tag {
    /// Starts a new, empty tag targeting `version` for serialization.
    pub fn new(version: SaveVersion) -> Self {
        Tag {
            header: TagHeader::with_version(version.into()),
            ext_header: None,
            frames: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        header: TagHeader,
        ext_header: Option<ExtendedHeader>,
        frames: Vec<Frame>,
    ) -> Self {
        Tag {
            header,
            ext_header,
            frames,
        }
    }

    /// Parses a tag out of `buf`. Any frame identifier not covered by the
    /// built-in registry is resolved against `extra` before falling back to
    /// the generic binary schema; a `None` identifier match anywhere causes
    /// that frame (and everything after it) to be dropped rather than
    /// failing the whole parse.
    pub fn parse(buf: &[u8], extra: Option<&Registry>) -> Option<Tag> {
        parser::parse(buf, extra)
    }

    /// Serializes this tag back into its on-disk representation.
    pub fn serialize(&self) -> SerializeResult<Vec<u8>> {
        serializer::serialize(self)
    }

    /// Renders this tag as a JSON document.
    pub fn to_json(&self) -> String {
        json::render(self)
    }

    /// Re-targets this tag at `to`, downgrading/upgrading the extended
    /// header and clearing flags illegal for the new version (a footer can
    /// only ever be written on ID3v2.4).
    pub fn set_save_version(&mut self, to: SaveVersion) {
        serializer::prepare_for(self, to);
    }

    pub fn header(&self) -> &TagHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut TagHeader {
        &mut self.header
    }

    pub fn extended_header(&self) -> Option<&ExtendedHeader> {
        self.ext_header.as_ref()
    }

    pub fn extended_header_mut(&mut self) -> &mut Option<ExtendedHeader> {
        &mut self.ext_header
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// All frames carrying identifier `id`.
    pub fn frames_by_id<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Frame> + 'a {
        self.frames.iter().filter(move |frame| frame.id() == id)
    }

    /// The first frame carrying identifier `id`, if any.
    pub fn frame(&self, id: &str) -> Option<&Frame> {
        self.frames.iter().find(|frame| frame.id() == id)
    }

    /// Appends `frame` to the tag.
    pub fn attach_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Removes every frame carrying identifier `id`, returning how many
    /// were removed.
    pub fn detach_frame(&mut self, id: &str) -> usize {
        let before = self.frames.len();
        self.frames.retain(|frame| frame.id() != id);
        before - self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_detach_round_trip() {
        let mut tag = Tag::new(SaveVersion::V24);
        assert!(tag.frames().is_empty());

        tag.attach_frame(Frame::from_parts(
            FrameHeader::new("TIT2"),
            vec![],
            vec![],
        ));
        assert_eq!(tag.frames().len(), 1);
        assert!(tag.frame("TIT2").is_some());

        assert_eq!(tag.detach_frame("TIT2"), 1);
        assert!(tag.frames().is_empty());
    }
}
