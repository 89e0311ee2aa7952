use crate::decoders::{
    CprtBox, FtypBox, HdlrBox, HmhdBox, MdhdBox, MvhdBox, SmhdBox, TkhdBox, TrefTypeBox, VmhdBox,
};
use crate::fragment::{EmsgBox, MfhdBox, SidxBox, TfdtBox, TfhdBox, TrunBox};
use crate::parser::{Error, Result};
use crate::tag::Tag;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const UUID: FourCC = FourCC(*b"uuid");
    pub const MOOF: FourCC = FourCC(*b"moof");
    pub const EMSG: FourCC = FourCC(*b"emsg");

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}

impl FromStr for FourCC {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let b = s.as_bytes();
        <[u8; 4]>::try_from(b)
            .map(FourCC)
            .map_err(|_| format!("four-character code must be 4 bytes, got {:?}", s))
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// The version + flags prefix carried at the front of a FullBox payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct FullBoxExt {
    pub version: u8,
    pub flags: [u8; 3],
}

impl FullBoxExt {
    pub fn new(version: u8, flags: u32) -> Self {
        let f = flags.to_be_bytes();
        Self { version, flags: [f[1], f[2], f[3]] }
    }

    pub fn from_bytes(b: [u8; 4]) -> Self {
        Self { version: b[0], flags: [b[1], b[2], b[3]] }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.version, self.flags[0], self.flags[1], self.flags[2]]
    }

    /// The 24 flag bits as an integer.
    pub fn flags_u32(&self) -> u32 {
        u32::from_be_bytes([0, self.flags[0], self.flags[1], self.flags[2]])
    }
}

/// What the dispatcher made of a box.
#[derive(Debug, Clone, Default)]
pub enum BoxKind {
    /// Payload re-scanned into `children`.
    Container,
    /// `ftyp` or `styp`.
    FileType(FtypBox),
    MovieHeader(MvhdBox),
    TrackHeader(TkhdBox),
    MediaHeader(MdhdBox),
    Handler(HdlrBox),
    VideoMediaHeader(VmhdBox),
    SoundMediaHeader(SmhdBox),
    HintMediaHeader(HmhdBox),
    NullMediaHeader,
    Copyright(CprtBox),
    TrackReferenceType(TrefTypeBox),
    SegmentIndex(SidxBox),
    MovieFragmentHeader(MfhdBox),
    TrackFragmentHeader(TfhdBox),
    TrackRun(TrunBox),
    TrackFragmentDecodeTime(TfdtBox),
    EventMessage(EmsgBox),
    /// Recognized type with nothing to decode (`mdat`, `free`, ...).
    Data,
    /// Type not decoded; bytes kept verbatim.
    #[default]
    Opaque,
}

impl fmt::Display for BoxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxKind::FileType(b) => b.fmt(f),
            BoxKind::MovieHeader(b) => b.fmt(f),
            BoxKind::TrackHeader(b) => b.fmt(f),
            BoxKind::MediaHeader(b) => b.fmt(f),
            BoxKind::Handler(b) => b.fmt(f),
            BoxKind::VideoMediaHeader(b) => b.fmt(f),
            BoxKind::SoundMediaHeader(b) => b.fmt(f),
            BoxKind::HintMediaHeader(b) => b.fmt(f),
            BoxKind::Copyright(b) => b.fmt(f),
            BoxKind::TrackReferenceType(b) => b.fmt(f),
            BoxKind::SegmentIndex(b) => b.fmt(f),
            BoxKind::MovieFragmentHeader(b) => b.fmt(f),
            BoxKind::TrackFragmentHeader(b) => b.fmt(f),
            BoxKind::TrackRun(b) => b.fmt(f),
            BoxKind::TrackFragmentDecodeTime(b) => b.fmt(f),
            BoxKind::EventMessage(b) => b.fmt(f),
            BoxKind::Container | BoxKind::NullMediaHeader | BoxKind::Data | BoxKind::Opaque => {
                Ok(())
            }
        }
    }
}

/// One node of the box tree.
///
/// The header fields are the source of truth for re-encoding; `raw` holds the
/// payload exactly as read, FullBox version/flags included.
#[derive(Debug, Clone)]
pub struct Mp4Box {
    pub tag: Tag,
    pub box_type: FourCC,
    pub user_type: Option<[u8; 16]>,
    /// 32-bit size field: 1 means `large_size` is in effect, 0 is rejected.
    pub size: u32,
    pub large_size: u64,
    pub full_box: Option<FullBoxExt>,
    pub raw: Vec<u8>,
    pub children: Vec<Mp4Box>,
    pub kind: BoxKind,
}

impl Mp4Box {
    /// Build a fresh box around `payload`, choosing the compact size field
    /// whenever the total fits in 32 bits.
    pub fn new(box_type: FourCC, user_type: Option<[u8; 16]>, payload: Vec<u8>) -> Self {
        let mut b = Self {
            tag: Tag::root(),
            box_type,
            user_type,
            size: 0,
            large_size: 0,
            full_box: None,
            raw: payload,
            children: Vec::new(),
            kind: BoxKind::Opaque,
        };
        b.sync_size();
        b
    }

    /// Total encoded length (header + payload).
    pub fn effective_size(&self) -> u64 {
        if self.size == 1 { self.large_size } else { self.size as u64 }
    }

    /// Header bytes before the payload: 8, +8 for a large size, +16 for uuid.
    /// The FullBox prefix lives in `raw` and is not counted here.
    pub fn size_header(&self) -> usize {
        let mut n = 8;
        if self.size == 1 {
            n += 8;
        }
        if self.box_type == FourCC::UUID {
            n += 16;
        }
        n
    }

    /// Read version and flags from `raw[0..4]`.
    pub fn parse_full_box_ext(&mut self) -> Result<FullBoxExt> {
        let Some(prefix) = self.raw.first_chunk::<4>() else {
            return Err(Error::TruncatedPayload {
                box_type: self.box_type,
                field: "version/flags",
                offset: 0,
                needed: 4,
                available: self.raw.len(),
            });
        };
        let ext = FullBoxExt::from_bytes(*prefix);
        self.full_box = Some(ext);
        Ok(ext)
    }

    /// Write the current version/flags back into `raw[0..4]`.
    /// Returns the number of bytes written (0 or 4).
    pub fn encode_full_box_ext(&mut self) -> usize {
        match (self.full_box, self.raw.first_chunk_mut::<4>()) {
            (Some(ext), Some(prefix)) => {
                *prefix = ext.to_bytes();
                4
            }
            _ => 0,
        }
    }

    pub fn version(&self) -> Option<u8> {
        self.full_box.map(|e| e.version)
    }

    pub fn flags(&self) -> Option<u32> {
        self.full_box.map(|e| e.flags_u32())
    }

    /// Payload after the FullBox prefix (all of `raw` for plain boxes).
    pub fn payload(&self) -> &[u8] {
        match self.full_box {
            Some(_) => self.raw.get(4..).unwrap_or(&[]),
            None => &self.raw,
        }
    }

    /// Recompute `size`/`large_size` from `raw.len()`, keeping the 64-bit
    /// form if the box already uses it.
    pub(crate) fn sync_size(&mut self) {
        let uuid = if self.box_type == FourCC::UUID { 16 } else { 0 };
        let compact = 8 + uuid + self.raw.len() as u64;
        if self.size != 1 && compact <= u32::MAX as u64 {
            self.size = compact as u32;
            self.large_size = 0;
        } else {
            self.size = 1;
            self.large_size = compact + 8;
        }
    }

    /// True for boxes whose type the dispatcher does not decode.
    pub fn is_type_not_decoded(&self) -> bool {
        matches!(self.kind, BoxKind::Opaque)
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, BoxKind::Container)
    }

    /// First direct child of the given type.
    pub fn child(&self, box_type: FourCC) -> Option<&Mp4Box> {
        self.children.iter().find(|c| c.box_type == box_type)
    }

    pub fn children_of(&self, box_type: FourCC) -> impl Iterator<Item = &Mp4Box> {
        self.children.iter().filter(move |c| c.box_type == box_type)
    }

    /// Insert `child` at `index` and re-serialize this box's payload from its
    /// children so the size header and `raw` stay consistent.
    pub fn insert_child(&mut self, index: usize, child: Mp4Box) -> Result<()> {
        // an undecoded payload would be lost when rebuilding from children
        if !self.is_container() && !self.raw.is_empty() {
            return Err(Error::NotContainer { box_type: self.box_type });
        }
        if index > self.children.len() {
            return Err(Error::BadInsertIndex { index, len: self.children.len() });
        }
        self.children.insert(index, child);
        self.kind = BoxKind::Container;
        self.rebuild_payload()
    }

    /// Insert `child` into the descendant reached by following `path`
    /// (child indices from this box), then refresh every box on the way so
    /// all ancestor sizes stay consistent.
    pub fn insert_descendant(&mut self, path: &[usize], index: usize, child: Mp4Box) -> Result<()> {
        let Some((&i, rest)) = path.split_first() else {
            return self.insert_child(index, child);
        };
        let len = self.children.len();
        let target = self
            .children
            .get_mut(i)
            .ok_or(Error::BadInsertIndex { index: i, len })?;
        target.insert_descendant(rest, index, child)?;
        self.rebuild_payload()
    }

    /// Re-serialize `raw` from `children` and resync the size fields.
    pub fn rebuild_payload(&mut self) -> Result<()> {
        let mut payload = Vec::with_capacity(self.raw.len());
        for c in &self.children {
            c.output(&mut payload, crate::writer::UNBOUNDED)?;
        }
        self.raw = payload;
        self.sync_size();
        Ok(())
    }

    // ---------- typed views over the owned children ----------

    pub fn file_type(&self) -> Option<&FtypBox> {
        match &self.kind {
            BoxKind::FileType(b) => Some(b),
            _ => None,
        }
    }

    /// `mvhd` of a `moov`.
    pub fn movie_header(&self) -> Option<&MvhdBox> {
        self.children.iter().find_map(|c| match &c.kind {
            BoxKind::MovieHeader(h) => Some(h),
            _ => None,
        })
    }

    /// `trak` children of a `moov`.
    pub fn tracks(&self) -> impl Iterator<Item = &Mp4Box> {
        self.children_of(FourCC(*b"trak"))
    }

    /// `tkhd` of a `trak`.
    pub fn track_header(&self) -> Option<&TkhdBox> {
        self.children.iter().find_map(|c| match &c.kind {
            BoxKind::TrackHeader(h) => Some(h),
            _ => None,
        })
    }

    /// `mdia` of a `trak`.
    pub fn media(&self) -> Option<&Mp4Box> {
        self.child(FourCC(*b"mdia"))
    }

    /// `mdhd` of an `mdia`.
    pub fn media_header(&self) -> Option<&MdhdBox> {
        self.children.iter().find_map(|c| match &c.kind {
            BoxKind::MediaHeader(h) => Some(h),
            _ => None,
        })
    }

    /// `hdlr` of an `mdia`.
    pub fn handler(&self) -> Option<&HdlrBox> {
        self.children.iter().find_map(|c| match &c.kind {
            BoxKind::Handler(h) => Some(h),
            _ => None,
        })
    }

    /// `minf` of an `mdia`.
    pub fn media_information(&self) -> Option<&Mp4Box> {
        self.child(FourCC(*b"minf"))
    }

    /// `mfhd` of a `moof`.
    pub fn fragment_header(&self) -> Option<&MfhdBox> {
        self.children.iter().find_map(|c| match &c.kind {
            BoxKind::MovieFragmentHeader(h) => Some(h),
            _ => None,
        })
    }

    /// `traf` children of a `moof`.
    pub fn track_fragments(&self) -> impl Iterator<Item = &Mp4Box> {
        self.children_of(FourCC(*b"traf"))
    }

    /// `tfhd` of a `traf`.
    pub fn track_fragment_header(&self) -> Option<&TfhdBox> {
        self.children.iter().find_map(|c| match &c.kind {
            BoxKind::TrackFragmentHeader(h) => Some(h),
            _ => None,
        })
    }

    /// `trun` children of a `traf`.
    pub fn track_runs(&self) -> impl Iterator<Item = &TrunBox> {
        self.children.iter().filter_map(|c| match &c.kind {
            BoxKind::TrackRun(r) => Some(r),
            _ => None,
        })
    }

    /// `tfdt` of a `traf`.
    pub fn decode_time(&self) -> Option<&TfdtBox> {
        self.children.iter().find_map(|c| match &c.kind {
            BoxKind::TrackFragmentDecodeTime(t) => Some(t),
            _ => None,
        })
    }
}
