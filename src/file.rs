//! Locating an ID3v2 tag in an MPEG file and writing one back.

use std::error;
use std::fmt::{self, Display, Formatter};
use std::fs::{self, Metadata};
use std::io::{self, Error, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::core::io::write_replaced;
use crate::id3v2::{self, TagHeader};

pub struct File {
    metadata: Metadata,
    _format: Format,
    handle: fs::File,
}

impl File {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<File> {
        let metadata = path.as_ref().metadata()?;

        // Directories aren't supported
        if metadata.is_dir() {
            return Err(Error::new(ErrorKind::InvalidInput, ExtFileError::IsDir));
        }

        let format = Format::new(path.as_ref())?;
        let handle = fs::File::open(path)?;

        Ok(File {
            metadata,
            _format: format,
            handle,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn handle(&mut self) -> &mut fs::File {
        &mut self.handle
    }

    /// Reads and parses the ID3v2 tag at the start of this file, if any.
    pub fn id3v2(&mut self) -> io::Result<Option<id3v2::Tag>> {
        let buf = self.read_up_to(self.metadata.len() as usize)?;
        Ok(id3v2::Tag::parse(&buf, None))
    }

    pub(crate) fn seek(&mut self, to: u64) -> io::Result<u64> {
        self.handle.seek(SeekFrom::Start(to))
    }

    pub(crate) fn read_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.handle.read_exact(buf)
    }

    pub(crate) fn read_up_to(&mut self, amount: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0; amount];
        let n = self.handle.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

/// The byte offset one past the end of the ID3v2 tag currently at the start
/// of `path`, or `None` if the file doesn't exist, is too short to hold a
/// tag header, or doesn't start with one.
fn existing_tag_end<P: AsRef<Path>>(path: P) -> Option<u64> {
    let mut file = File::open(path).ok()?;
    let mut header_buf = [0; 10];
    file.read_into(&mut header_buf).ok()?;
    let header = TagHeader::parse(header_buf).ok()?;
    Some(10 + u64::from(header.size()))
}

/// Writes `tag` to `path`.
///
/// - If `path` does not exist, or exists but carries no ID3v2 tag, `tag` is
///   written as a fresh prefix ahead of whatever bytes (if any) already
///   follow.
/// - If `path` already carries a tag and `update` is set, `tag` is still
///   prepended ahead of everything already there: the old tag is kept
///   in-place behind the new one rather than removed.
/// - Otherwise the existing tag is replaced in-place, preserving every byte
///   that followed it (the audio stream).
pub fn write_tag<P: AsRef<Path>>(path: P, tag: &id3v2::Tag, update: bool) -> io::Result<()> {
    let data = tag
        .serialize()
        .map_err(|err| Error::new(ErrorKind::InvalidData, err))?;

    let end = match existing_tag_end(&path) {
        Some(end) if !update => end,
        _ => 0,
    };

    write_replaced(path, &data, end)
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Format {
    Mpeg,
}

impl Format {
    fn new(path: &Path) -> io::Result<Format> {
        if let Some(ext) = path.extension() {
            if ext == "mp3" {
                return Ok(Format::Mpeg);
            }
        }

        // Any unknown or nonexistant extensions are treated as Unknown
        Err(Error::new(
            ErrorKind::InvalidInput,
            ExtFileError::UnknownExt,
        ))
    }
}

#[derive(Debug)]
enum ExtFileError {
    IsDir,
    UnknownExt,
}

impl Display for ExtFileError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let msg = match self {
            ExtFileError::IsDir => "Is a directory",
            ExtFileError::UnknownExt => "Could not recognize file extension",
        };

        write!(f, "{}", msg)
    }
}

impl error::Error for ExtFileError {}
