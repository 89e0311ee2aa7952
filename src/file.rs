use crate::boxes::{BoxKind, FourCC, Mp4Box};
use crate::decoders::FtypBox;
use crate::diag::Diagnostics;
use crate::dispatch::{ParseOptions, decode_box};
use crate::fragment::{EmsgBox, SidxBox};
use crate::parser::{BoxReader, Error, Result};
use crate::writer::UNBOUNDED;
use std::io::{BufReader, Read, Write};

/// First-occurrence index of the well-known top-level boxes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TopLevelIndex {
    ftyp: Option<usize>,
    styp: Option<usize>,
    moov: Option<usize>,
    moof: Option<usize>,
    mdat: Option<usize>,
    sidx: Option<usize>,
    emsg: Option<usize>,
    meta: Option<usize>,
}

impl TopLevelIndex {
    fn build(boxes: &[Mp4Box]) -> Self {
        let mut idx = Self::default();
        for (i, b) in boxes.iter().enumerate() {
            let slot = match &b.box_type.0 {
                b"ftyp" => &mut idx.ftyp,
                b"styp" => &mut idx.styp,
                b"moov" => &mut idx.moov,
                b"moof" => &mut idx.moof,
                b"mdat" => &mut idx.mdat,
                b"sidx" => &mut idx.sidx,
                b"emsg" => &mut idx.emsg,
                b"meta" => &mut idx.meta,
                _ => continue,
            };
            slot.get_or_insert(i);
        }
        idx
    }
}

/// A parsed file or segment: the ordered top-level boxes.
#[derive(Debug, Clone, Default)]
pub struct Mp4File {
    boxes: Vec<Mp4Box>,
    index: TopLevelIndex,
}

impl Mp4File {
    pub fn parse<R: Read>(src: R, diag: &mut Diagnostics) -> Result<Self> {
        Self::parse_with(src, diag, &ParseOptions::default())
    }

    /// Read and decode every top-level box of `src`.
    ///
    /// Header-level errors abort the parse. Decode failures are recorded in
    /// `diag` and the affected boxes are kept as raw bytes, unless
    /// `opts.strict` is set.
    pub fn parse_with<R: Read>(src: R, diag: &mut Diagnostics, opts: &ParseOptions) -> Result<Self> {
        let mut boxes = Vec::new();
        for item in BoxReader::top_level(BufReader::new(src)) {
            let mut b = match item {
                Ok(b) => b,
                Err(e) => {
                    tracing::error!(error = %e, boxes = boxes.len(), "box scan aborted");
                    return Err(e);
                }
            };
            tracing::trace!(path = %b.tag, box_type = %b.box_type, size = b.effective_size(), "top-level box");
            if let Err(e) = decode_box(&mut b, diag, opts, 0) {
                if opts.strict {
                    tracing::error!(error = %e, "strict parse aborted");
                    return Err(e);
                }
            }
            boxes.push(b);
        }
        let index = TopLevelIndex::build(&boxes);
        Ok(Self { boxes, index })
    }

    pub fn from_bytes(bytes: &[u8], diag: &mut Diagnostics) -> Result<Self> {
        Self::parse(bytes, diag)
    }

    pub fn boxes(&self) -> &[Mp4Box] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Write every top-level box with `depth - 1`. Returns bytes written.
    pub fn output<W: Write + ?Sized>(&self, w: &mut W, depth: usize) -> Result<usize> {
        let child_depth = depth.saturating_sub(1);
        let mut n = 0;
        for b in &self.boxes {
            n += b.output(w, child_depth)?;
        }
        Ok(n)
    }

    pub fn encoded_len(&self) -> u64 {
        self.boxes.iter().map(|b| b.encoded_len(UNBOUNDED)).sum()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut v = Vec::with_capacity(self.encoded_len() as usize);
        self.output(&mut v, UNBOUNDED)?;
        Ok(v)
    }

    /// Insert a top-level box at `index` and refresh the cached indices.
    pub fn insert_box(&mut self, index: usize, b: Mp4Box) -> Result<()> {
        if index > self.boxes.len() {
            return Err(Error::BadInsertIndex { index, len: self.boxes.len() });
        }
        self.boxes.insert(index, b);
        self.index = TopLevelIndex::build(&self.boxes);
        Ok(())
    }

    /// Insert `b` as child `index` of the container reached by `path`
    /// (`path[0]` is the top-level index). Sizes along the path are updated.
    pub fn insert_nested(&mut self, path: &[usize], index: usize, b: Mp4Box) -> Result<()> {
        let Some((&top, rest)) = path.split_first() else {
            return self.insert_box(index, b);
        };
        let len = self.boxes.len();
        self.boxes
            .get_mut(top)
            .ok_or(Error::BadInsertIndex { index: top, len })?
            .insert_descendant(rest, index, b)
    }

    /// Insert an `emsg` right before the first `moof`. Returns its index.
    pub fn insert_emsg(&mut self, emsg: Mp4Box) -> Result<usize> {
        let Some(at) = self.index.moof else {
            tracing::warn!("no moof box found for emsg insertion");
            return Err(Error::NotFound(FourCC::MOOF));
        };
        self.insert_box(at, emsg)?;
        Ok(at)
    }

    fn at(&self, i: Option<usize>) -> Option<&Mp4Box> {
        i.and_then(|i| self.boxes.get(i))
    }

    pub fn ftyp(&self) -> Option<&FtypBox> {
        self.at(self.index.ftyp).and_then(Mp4Box::file_type)
    }

    pub fn styp(&self) -> Option<&FtypBox> {
        self.at(self.index.styp).and_then(Mp4Box::file_type)
    }

    pub fn moov(&self) -> Option<&Mp4Box> {
        self.at(self.index.moov)
    }

    pub fn moof(&self) -> Option<&Mp4Box> {
        self.at(self.index.moof)
    }

    pub fn mdat(&self) -> Option<&Mp4Box> {
        self.at(self.index.mdat)
    }

    pub fn meta(&self) -> Option<&Mp4Box> {
        self.at(self.index.meta)
    }

    pub fn sidx(&self) -> Option<&SidxBox> {
        match &self.at(self.index.sidx)?.kind {
            BoxKind::SegmentIndex(s) => Some(s),
            _ => None,
        }
    }

    pub fn emsg(&self) -> Option<&EmsgBox> {
        match &self.at(self.index.emsg)?.kind {
            BoxKind::EventMessage(e) => Some(e),
            _ => None,
        }
    }

    pub fn moof_index(&self) -> Option<usize> {
        self.index.moof
    }

    pub fn emsg_index(&self) -> Option<usize> {
        self.index.emsg
    }
}
