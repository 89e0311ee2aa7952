use crate::boxes::{FourCC, Mp4Box};
use crate::tag::Tag;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use std::io::{self, Read};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("short read: {what} needs {needed} bytes, got {got}")]
    ShortRead { what: &'static str, needed: u64, got: u64 },
    #[error("{box_type}: size 0 (box runs to end of stream) is not supported")]
    UnsupportedSize { box_type: FourCC },
    #[error("{box_type}: declared size {size} is smaller than its {header}-byte header")]
    InvalidSize { box_type: FourCC, size: u64, header: usize },
    #[error("{box_type}: {field} at offset {offset} has no NUL terminator")]
    UnterminatedString { box_type: FourCC, field: &'static str, offset: usize },
    #[error("{box_type}: {field} at offset {offset} is not valid UTF-8")]
    InvalidString { box_type: FourCC, field: &'static str, offset: usize },
    #[error("{box_type}: {field} at offset {offset} needs {needed} bytes, {available} left")]
    TruncatedPayload {
        box_type: FourCC,
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("emsg version {version} does not match its presentation time form")]
    EventTimeMismatch { version: u8 },
    #[error("insert index {index} out of range (have {len})")]
    BadInsertIndex { index: usize, len: usize },
    #[error("{box_type} is not a decoded container")]
    NotContainer { box_type: FourCC },
    #[error("no {0} box found")]
    NotFound(FourCC),
    #[error("{path} {box_type} (child {index}): {source}")]
    Child {
        path: String,
        box_type: FourCC,
        index: usize,
        source: Box<Error>,
    },
}

impl Error {
    /// Innermost error beneath any `Child` wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Child { source, .. } => source.root_cause(),
            e => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Read until `buf` is full or the source hits EOF. Returns bytes read.
fn read_full<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut got = 0;
    while got < buf.len() {
        match src.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(got)
}

fn short_read(e: io::Error, what: &'static str, needed: u64) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::ShortRead { what, needed, got: 0 }
    } else {
        Error::Io(e)
    }
}

/// Read one complete box (header and payload) from `src`.
///
/// Returns `Ok(None)` on a clean end of stream, i.e. when not a single byte of
/// a new header is available. The payload is buffered but not decoded.
pub fn read_box<R: Read>(src: &mut R, tag: &Tag) -> Result<Option<Mp4Box>> {
    let mut hdr = [0u8; 8];
    let got = read_full(src, &mut hdr)?;
    if got == 0 {
        return Ok(None);
    }
    if got < hdr.len() {
        return Err(Error::ShortRead { what: "box header", needed: 8, got: got as u64 });
    }
    let size = BigEndian::read_u32(&hdr[0..4]);
    let box_type = FourCC([hdr[4], hdr[5], hdr[6], hdr[7]]);

    let large_size = if size == 1 {
        src.read_u64::<BigEndian>().map_err(|e| short_read(e, "large size", 8))?
    } else {
        0
    };

    let user_type = if box_type == FourCC::UUID {
        let mut u = [0u8; 16];
        src.read_exact(&mut u).map_err(|e| short_read(e, "user type", 16))?;
        Some(u)
    } else {
        None
    };

    if size == 0 {
        return Err(Error::UnsupportedSize { box_type });
    }

    let header = 8 + if size == 1 { 8 } else { 0 } + if user_type.is_some() { 16 } else { 0 };
    let total = if size == 1 { large_size } else { size as u64 };
    if total < header as u64 {
        return Err(Error::InvalidSize { box_type, size: total, header });
    }

    let want = total - header as u64;
    let mut raw = Vec::new();
    src.take(want).read_to_end(&mut raw)?;
    if (raw.len() as u64) < want {
        return Err(Error::ShortRead { what: "payload", needed: want, got: raw.len() as u64 });
    }

    let mut b = Mp4Box::new(box_type, user_type, raw);
    b.tag = tag.clone();
    b.size = size;
    b.large_size = large_size;
    Ok(Some(b))
}

/// Pull iterator over sibling boxes.
///
/// Yields boxes until a clean end of stream. The first error is yielded once
/// and ends the iteration.
pub struct BoxReader<R> {
    src: R,
    tag: Tag,
    done: bool,
}

impl<R: Read> BoxReader<R> {
    /// Siblings whose first label is `tag`.
    pub fn new(src: R, tag: Tag) -> Self {
        Self { src, tag, done: false }
    }

    /// Top-level boxes of a file: `0`, `1`, ...
    pub fn top_level(src: R) -> Self {
        Self::new(src, Tag::root())
    }

    /// Children of the box labelled `parent`: `<parent>.0`, `<parent>.1`, ...
    pub fn children(src: R, parent: &Tag) -> Self {
        Self::new(src, parent.child())
    }
}

impl<R: Read> Iterator for BoxReader<R> {
    type Item = Result<Mp4Box>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_box(&mut self.src, &self.tag) {
            Ok(Some(b)) => {
                self.tag.next();
                Some(Ok(b))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterate the boxes packed in a container payload.
pub fn read_boxes<'a>(payload: &'a [u8], parent: &Tag) -> BoxReader<&'a [u8]> {
    BoxReader::children(payload, parent)
}
