//! Field decoders for the movie-side boxes (`ftyp`, `mvhd`, `tkhd`, ...).
//!
//! Each decoder reads from the box's buffered payload and never touches the
//! byte source. Version-dependent fields are widened to `u64`.

use crate::boxes::{FourCC, Mp4Box};
use crate::fixed::{Fixed8_8, Fixed16_16, UFixed16_16};
use crate::parser::{Error, Result};
use crate::util::FieldReader;
use serde::Serialize;
use std::fmt;

fn read_matrix(r: &mut FieldReader<'_>) -> Result<[i32; 9]> {
    let mut m = [0i32; 9];
    for v in m.iter_mut() {
        *v = r.i32("matrix")?;
    }
    Ok(m)
}

/// Packed ISO-639-2/T code: three 5-bit letters, each offset by 0x60.
pub fn language_code(packed: u16) -> String {
    [10u16, 5, 0]
        .iter()
        .map(|&shift| (((packed >> shift) & 0x1f) as u8 + 0x60) as char)
        .collect()
}

/// Best-effort text field: up to the first NUL, or the whole tail when the
/// terminator is missing.
fn trailing_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// UTF-16 when the text starts with a byte order mark, UTF-8 otherwise.
fn bom_string(bytes: &[u8]) -> String {
    let (big_endian, body) = match bytes {
        [0xfe, 0xff, rest @ ..] => (true, rest),
        [0xff, 0xfe, rest @ ..] => (false, rest),
        _ => return trailing_string(bytes),
    };
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|c| if big_endian { u16::from_be_bytes([c[0], c[1]]) } else { u16::from_le_bytes([c[0], c[1]]) })
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

// ---------- ftyp / styp ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FtypBox {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

impl FtypBox {
    pub fn decode(b: &Mp4Box) -> Result<Self> {
        let mut r = FieldReader::new(b.box_type, &b.raw);
        let major_brand = r.fourcc("major_brand")?;
        let minor_version = r.u32("minor_version")?;
        let mut compatible_brands = Vec::with_capacity(r.remaining() / 4);
        while r.remaining() > 0 {
            compatible_brands.push(r.fourcc("compatible_brands")?);
        }
        Ok(Self { major_brand, minor_version, compatible_brands })
    }
}

impl fmt::Display for FtypBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "major={} minor={} compatible=[", self.major_brand, self.minor_version)?;
        for (i, c) in self.compatible_brands.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{c}")?;
        }
        f.write_str("]")
    }
}

// ---------- mvhd ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MvhdBox {
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub rate: Fixed16_16,
    pub volume: Fixed8_8,
    pub matrix: [i32; 9],
    pub next_track_id: u32,
}

impl MvhdBox {
    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        let ext = b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        let creation_time = r.versioned_u64(ext.version, "creation_time")?;
        let modification_time = r.versioned_u64(ext.version, "modification_time")?;
        let timescale = r.u32("timescale")?;
        let duration = r.versioned_u64(ext.version, "duration")?;
        let rate = Fixed16_16::from_be_bytes(r.array("rate")?);
        let volume = Fixed8_8::from_be_bytes(r.array("volume")?);
        r.skip(10, "reserved")?;
        let matrix = read_matrix(&mut r)?;
        r.skip(24, "pre_defined")?;
        let next_track_id = r.u32("next_track_id")?;
        Ok(Self {
            creation_time,
            modification_time,
            timescale,
            duration,
            rate,
            volume,
            matrix,
            next_track_id,
        })
    }
}

impl fmt::Display for MvhdBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timescale={} duration={} rate={} volume={} next_track_id={}",
            self.timescale, self.duration, self.rate, self.volume, self.next_track_id
        )
    }
}

// ---------- tkhd ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TkhdBox {
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: Fixed8_8,
    pub matrix: [i32; 9],
    pub width: UFixed16_16,
    pub height: UFixed16_16,
}

impl TkhdBox {
    pub const ENABLED: u32 = 0x01;
    pub const IN_MOVIE: u32 = 0x02;
    pub const IN_PREVIEW: u32 = 0x04;

    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        let ext = b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        let creation_time = r.versioned_u64(ext.version, "creation_time")?;
        let modification_time = r.versioned_u64(ext.version, "modification_time")?;
        let track_id = r.u32("track_id")?;
        r.skip(4, "reserved")?;
        let duration = r.versioned_u64(ext.version, "duration")?;
        r.skip(8, "reserved")?;
        let layer = r.i16("layer")?;
        let alternate_group = r.i16("alternate_group")?;
        let volume = Fixed8_8::from_be_bytes(r.array("volume")?);
        r.skip(2, "reserved")?;
        let matrix = read_matrix(&mut r)?;
        let width = UFixed16_16::from_be_bytes(r.array("width")?);
        let height = UFixed16_16::from_be_bytes(r.array("height")?);
        Ok(Self {
            flags: ext.flags_u32(),
            creation_time,
            modification_time,
            track_id,
            duration,
            layer,
            alternate_group,
            volume,
            matrix,
            width,
            height,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.flags & Self::ENABLED != 0
    }

    pub fn is_in_movie(&self) -> bool {
        self.flags & Self::IN_MOVIE != 0
    }

    pub fn is_in_preview(&self) -> bool {
        self.flags & Self::IN_PREVIEW != 0
    }
}

impl fmt::Display for TkhdBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "track_id={} duration={} volume={} width={} height={}",
            self.track_id, self.duration, self.volume, self.width, self.height
        )
    }
}

// ---------- mdhd ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MdhdBox {
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub language: String,
}

impl MdhdBox {
    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        let ext = b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        let creation_time = r.versioned_u64(ext.version, "creation_time")?;
        let modification_time = r.versioned_u64(ext.version, "modification_time")?;
        let timescale = r.u32("timescale")?;
        let duration = r.versioned_u64(ext.version, "duration")?;
        let language = language_code(r.u16("language")?);
        Ok(Self { creation_time, modification_time, timescale, duration, language })
    }
}

impl fmt::Display for MdhdBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timescale={} duration={} language={}",
            self.timescale, self.duration, self.language
        )
    }
}

// ---------- hdlr ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HdlrBox {
    pub handler_type: FourCC,
    pub name: String,
}

impl HdlrBox {
    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        r.skip(4, "pre_defined")?;
        let handler_type = r.fourcc("handler_type")?;
        // some writers stop right after the handler type
        let name = if r.remaining() >= 12 {
            r.skip(12, "reserved")?;
            trailing_string(r.rest())
        } else {
            String::new()
        };
        Ok(Self { handler_type, name })
    }
}

impl fmt::Display for HdlrBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler={} name={:?}", self.handler_type, self.name)
    }
}

// ---------- vmhd / smhd / hmhd ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmhdBox {
    pub graphics_mode: u16,
    pub opcolor: [u16; 3],
}

impl VmhdBox {
    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        let graphics_mode = r.u16("graphics_mode")?;
        let opcolor = [r.u16("opcolor")?, r.u16("opcolor")?, r.u16("opcolor")?];
        Ok(Self { graphics_mode, opcolor })
    }
}

impl fmt::Display for VmhdBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graphics_mode={} opcolor={:?}", self.graphics_mode, self.opcolor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmhdBox {
    pub balance: Fixed8_8,
}

impl SmhdBox {
    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        let balance = Fixed8_8::from_be_bytes(r.array("balance")?);
        Ok(Self { balance })
    }
}

impl fmt::Display for SmhdBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "balance={}", self.balance)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HmhdBox {
    pub max_pdu_size: u16,
    pub avg_pdu_size: u16,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
}

impl HmhdBox {
    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        Ok(Self {
            max_pdu_size: r.u16("max_pdu_size")?,
            avg_pdu_size: r.u16("avg_pdu_size")?,
            max_bitrate: r.u32("max_bitrate")?,
            avg_bitrate: r.u32("avg_bitrate")?,
        })
    }
}

impl fmt::Display for HmhdBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max_pdu={} avg_pdu={} max_bitrate={} avg_bitrate={}",
            self.max_pdu_size, self.avg_pdu_size, self.max_bitrate, self.avg_bitrate
        )
    }
}

/// `nmhd` carries nothing beyond version and flags.
pub fn decode_nmhd(b: &mut Mp4Box) -> Result<()> {
    b.parse_full_box_ext().map(|_| ())
}

// ---------- cprt ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CprtBox {
    pub language: String,
    pub notice: String,
}

impl CprtBox {
    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        let language = language_code(r.u16("language")?);
        let notice = bom_string(r.rest());
        Ok(Self { language, notice })
    }
}

impl fmt::Display for CprtBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "language={} notice={:?}", self.language, self.notice)
    }
}

// ---------- tref entries ----------

/// One reference type inside `tref` (`hint`, `cdsc`, `chap`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrefTypeBox {
    pub track_ids: Vec<u32>,
}

impl TrefTypeBox {
    pub fn decode(b: &Mp4Box) -> Result<Self> {
        if b.raw.len() % 4 != 0 {
            return Err(Error::TruncatedPayload {
                box_type: b.box_type,
                field: "track_ids",
                offset: b.raw.len() / 4 * 4,
                needed: 4,
                available: b.raw.len() % 4,
            });
        }
        let mut r = FieldReader::new(b.box_type, &b.raw);
        let mut track_ids = Vec::with_capacity(b.raw.len() / 4);
        while r.remaining() > 0 {
            track_ids.push(r.u32("track_ids")?);
        }
        Ok(Self { track_ids })
    }
}

impl fmt::Display for TrefTypeBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track_ids={:?}", self.track_ids)
    }
}
