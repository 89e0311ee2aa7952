//! Type-directed decoding of a box tree.
//!
//! Containers re-scan their payload into child boxes and recurse; leaf types
//! go to their field decoder. Decode failures are recorded and the box keeps
//! its bytes, so re-encoding stays lossless whatever went wrong.

use crate::boxes::{BoxKind, Mp4Box};
use crate::decoders::{
    CprtBox, FtypBox, HdlrBox, HmhdBox, MdhdBox, MvhdBox, SmhdBox, TkhdBox, TrefTypeBox, VmhdBox,
    decode_nmhd,
};
use crate::diag::Diagnostics;
use crate::fragment::{EmsgBox, MfhdBox, SidxBox, TfdtBox, TfhdBox, TrunBox};
use crate::known_boxes::KnownBox;
use crate::parser::{Error, Result, read_boxes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Containers nested deeper than this are kept as raw bytes.
    pub max_depth: usize,
    /// Abort on the first decode failure instead of recording it.
    pub strict: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { max_depth: 32, strict: false }
    }
}

impl ParseOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Decode `b` in place, recursing into containers.
///
/// Every failure is recorded in `diag`. The returned error is the first
/// failure found in this subtree; in non-strict mode siblings are still
/// decoded after it.
pub fn decode_box(
    b: &mut Mp4Box,
    diag: &mut Diagnostics,
    opts: &ParseOptions,
    depth: usize,
) -> Result<()> {
    let known = KnownBox::from(b.box_type);
    if known.is_container() {
        return decode_container(b, known, diag, opts, depth);
    }
    if known.is_unknown() {
        diag.unknown_type(b);
        b.kind = BoxKind::Opaque;
        return Ok(());
    }
    if known.is_data() {
        b.kind = BoxKind::Data;
        return Ok(());
    }
    match decode_leaf(b, known) {
        Ok(kind) => {
            b.kind = kind;
            Ok(())
        }
        Err(e) => {
            diag.decode_failed(b, &e);
            b.kind = BoxKind::Opaque;
            Err(e)
        }
    }
}

fn decode_leaf(b: &mut Mp4Box, known: KnownBox) -> Result<BoxKind> {
    let kind = match known {
        KnownBox::Ftyp | KnownBox::Styp => BoxKind::FileType(FtypBox::decode(b)?),
        KnownBox::Mvhd => BoxKind::MovieHeader(MvhdBox::decode(b)?),
        KnownBox::Tkhd => BoxKind::TrackHeader(TkhdBox::decode(b)?),
        KnownBox::Mdhd => BoxKind::MediaHeader(MdhdBox::decode(b)?),
        KnownBox::Hdlr => BoxKind::Handler(HdlrBox::decode(b)?),
        KnownBox::Vmhd => BoxKind::VideoMediaHeader(VmhdBox::decode(b)?),
        KnownBox::Smhd => BoxKind::SoundMediaHeader(SmhdBox::decode(b)?),
        KnownBox::Hmhd => BoxKind::HintMediaHeader(HmhdBox::decode(b)?),
        KnownBox::Nmhd => {
            decode_nmhd(b)?;
            BoxKind::NullMediaHeader
        }
        KnownBox::Cprt => BoxKind::Copyright(CprtBox::decode(b)?),
        KnownBox::Sidx => BoxKind::SegmentIndex(SidxBox::decode(b)?),
        KnownBox::Mfhd => BoxKind::MovieFragmentHeader(MfhdBox::decode(b)?),
        KnownBox::Tfhd => BoxKind::TrackFragmentHeader(TfhdBox::decode(b)?),
        KnownBox::Trun => BoxKind::TrackRun(TrunBox::decode(b)?),
        KnownBox::Tfdt => BoxKind::TrackFragmentDecodeTime(TfdtBox::decode(b)?),
        KnownBox::Emsg => BoxKind::EventMessage(EmsgBox::decode(b)?),
        // containers, data and unknown types never get here
        _ => BoxKind::Opaque,
    };
    Ok(kind)
}

/// Every child of `tref` is a track-reference list, whatever its type code.
fn decode_tref_entry(b: &mut Mp4Box, diag: &mut Diagnostics) -> Result<()> {
    match TrefTypeBox::decode(b) {
        Ok(t) => {
            b.kind = BoxKind::TrackReferenceType(t);
            Ok(())
        }
        Err(e) => {
            diag.decode_failed(b, &e);
            b.kind = BoxKind::Opaque;
            Err(e)
        }
    }
}

fn decode_container(
    b: &mut Mp4Box,
    known: KnownBox,
    diag: &mut Diagnostics,
    opts: &ParseOptions,
    depth: usize,
) -> Result<()> {
    if depth >= opts.max_depth {
        diag.depth_limit(b, depth);
        b.kind = BoxKind::Opaque;
        return Ok(());
    }

    let mut children = Vec::new();
    let mut first_err: Option<Error> = None;
    for (index, item) in read_boxes(&b.raw, &b.tag).enumerate() {
        let mut child = match item {
            Ok(c) => c,
            Err(e) => {
                // payload doesn't split into boxes: keep the container whole
                diag.child_scan_aborted(b, &e);
                b.children.clear();
                b.kind = BoxKind::Opaque;
                return Err(Error::Child {
                    path: b.tag.to_string(),
                    box_type: b.box_type,
                    index,
                    source: Box::new(e),
                });
            }
        };
        let res = if known == KnownBox::Tref {
            decode_tref_entry(&mut child, diag)
        } else {
            decode_box(&mut child, diag, opts, depth + 1)
        };
        if let Err(e) = res {
            let wrapped = Error::Child {
                path: child.tag.to_string(),
                box_type: child.box_type,
                index,
                source: Box::new(e),
            };
            if opts.strict {
                return Err(wrapped);
            }
            first_err.get_or_insert(wrapped);
        }
        children.push(child);
    }

    b.children = children;
    b.kind = BoxKind::Container;
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
