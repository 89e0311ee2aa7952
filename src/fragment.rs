//! Segment and fragment boxes: `sidx`, `mfhd`, `tfhd`, `trun`, `tfdt`, `emsg`.

use crate::boxes::{BoxKind, FourCC, FullBoxExt, Mp4Box};
use crate::parser::{Error, Result};
use crate::util::FieldReader;
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use serde::{Serialize, Serializer};
use std::fmt;
use std::io::Write;

fn as_hex<S: Serializer>(v: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(v))
}

// ---------- sidx ----------

/// One 12-byte `sidx` reference, kept as read. Fields decode on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidxReference(pub [u8; 12]);

impl SidxReference {
    fn word(&self, i: usize) -> u32 {
        BigEndian::read_u32(&self.0[i * 4..i * 4 + 4])
    }

    /// `true` when the reference points at another `sidx`.
    pub fn reference_type(&self) -> bool {
        self.word(0) & 0x8000_0000 != 0
    }

    pub fn referenced_size(&self) -> u32 {
        self.word(0) & 0x7fff_ffff
    }

    pub fn subsegment_duration(&self) -> u32 {
        self.word(1)
    }

    pub fn starts_with_sap(&self) -> bool {
        self.word(2) & 0x8000_0000 != 0
    }

    pub fn sap_type(&self) -> u8 {
        ((self.word(2) >> 28) & 0x07) as u8
    }

    pub fn sap_delta_time(&self) -> u32 {
        self.word(2) & 0x0fff_ffff
    }
}

impl Serialize for SidxReference {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        as_hex(&self.0, s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidxBox {
    pub reference_id: u32,
    pub timescale: u32,
    pub earliest_presentation_time: u64,
    pub first_offset: u64,
    pub reserved: u16,
    pub references: Vec<SidxReference>,
}

impl SidxBox {
    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        let ext = b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        let reference_id = r.u32("reference_id")?;
        let timescale = r.u32("timescale")?;
        let earliest_presentation_time = r.versioned_u64(ext.version, "earliest_presentation_time")?;
        let first_offset = r.versioned_u64(ext.version, "first_offset")?;
        let reserved = r.u16("reserved")?;
        let count = r.u16("reference_count")? as usize;
        let mut references = Vec::with_capacity(count.min(r.remaining() / 12));
        for _ in 0..count {
            references.push(SidxReference(r.array("reference")?));
        }
        Ok(Self {
            reference_id,
            timescale,
            earliest_presentation_time,
            first_offset,
            reserved,
            references,
        })
    }
}

impl fmt::Display for SidxBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reference_id={} timescale={} ept={} first_offset={} references={}",
            self.reference_id,
            self.timescale,
            self.earliest_presentation_time,
            self.first_offset,
            self.references.len()
        )
    }
}

// ---------- mfhd ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MfhdBox {
    pub sequence_number: u32,
}

impl MfhdBox {
    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        Ok(Self { sequence_number: r.u32("sequence_number")? })
    }
}

impl fmt::Display for MfhdBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sequence_number={}", self.sequence_number)
    }
}

// ---------- tfhd ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TfhdBox {
    pub flags: u32,
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
}

impl TfhdBox {
    pub const BASE_DATA_OFFSET: u32 = 0x00_0001;
    pub const SAMPLE_DESCRIPTION_INDEX: u32 = 0x00_0002;
    pub const DEFAULT_SAMPLE_DURATION: u32 = 0x00_0008;
    pub const DEFAULT_SAMPLE_SIZE: u32 = 0x00_0010;
    pub const DEFAULT_SAMPLE_FLAGS: u32 = 0x00_0020;
    pub const DURATION_IS_EMPTY: u32 = 0x01_0000;
    pub const DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;

    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        let flags = b.parse_full_box_ext()?.flags_u32();
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        let track_id = r.u32("track_id")?;
        let base_data_offset = if flags & Self::BASE_DATA_OFFSET != 0 {
            Some(r.u64("base_data_offset")?)
        } else {
            None
        };
        // optional fields follow in flag bit order
        let mut opt_u32 = |mask: u32, field: &'static str| -> Result<Option<u32>> {
            if flags & mask != 0 { r.u32(field).map(Some) } else { Ok(None) }
        };
        let sample_description_index = opt_u32(Self::SAMPLE_DESCRIPTION_INDEX, "sample_description_index")?;
        let default_sample_duration = opt_u32(Self::DEFAULT_SAMPLE_DURATION, "default_sample_duration")?;
        let default_sample_size = opt_u32(Self::DEFAULT_SAMPLE_SIZE, "default_sample_size")?;
        let default_sample_flags = opt_u32(Self::DEFAULT_SAMPLE_FLAGS, "default_sample_flags")?;
        Ok(Self {
            flags,
            track_id,
            base_data_offset,
            sample_description_index,
            default_sample_duration,
            default_sample_size,
            default_sample_flags,
        })
    }

    pub fn duration_is_empty(&self) -> bool {
        self.flags & Self::DURATION_IS_EMPTY != 0
    }

    pub fn default_base_is_moof(&self) -> bool {
        self.flags & Self::DEFAULT_BASE_IS_MOOF != 0
    }
}

impl fmt::Display for TfhdBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track_id={} flags={:#08x}", self.track_id, self.flags)?;
        if let Some(v) = self.base_data_offset {
            write!(f, " base_data_offset={v}")?;
        }
        if let Some(v) = self.default_sample_duration {
            write!(f, " default_duration={v}")?;
        }
        if let Some(v) = self.default_sample_size {
            write!(f, " default_size={v}")?;
        }
        Ok(())
    }
}

// ---------- trun ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrunSample {
    pub duration: u32,
    pub size: u32,
    pub flags: u32,
    pub composition_time_offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrunBox {
    pub version: u8,
    pub flags: u32,
    pub sample_count: u32,
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<u32>,
    /// Per-sample table as stored; empty when the run has no per-sample fields.
    pub samples: Vec<TrunSample>,
}

impl TrunBox {
    pub const DATA_OFFSET: u32 = 0x00_0001;
    pub const FIRST_SAMPLE_FLAGS: u32 = 0x00_0004;
    pub const SAMPLE_DURATION: u32 = 0x00_0100;
    pub const SAMPLE_SIZE: u32 = 0x00_0200;
    pub const SAMPLE_FLAGS: u32 = 0x00_0400;
    pub const SAMPLE_CTO: u32 = 0x00_0800;

    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        let ext = b.parse_full_box_ext()?;
        let flags = ext.flags_u32();
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        let sample_count = r.u32("sample_count")?;
        let data_offset = if flags & Self::DATA_OFFSET != 0 {
            Some(r.i32("data_offset")?)
        } else {
            None
        };
        let first_sample_flags = if flags & Self::FIRST_SAMPLE_FLAGS != 0 {
            Some(r.u32("first_sample_flags")?)
        } else {
            None
        };

        let has_duration = flags & Self::SAMPLE_DURATION != 0;
        let has_size = flags & Self::SAMPLE_SIZE != 0;
        // first_sample_flags replaces the per-sample flags column
        let has_flags = flags & Self::SAMPLE_FLAGS != 0 && first_sample_flags.is_none();
        let has_cto = flags & Self::SAMPLE_CTO != 0;
        let stride = 4 * (has_duration as usize + has_size as usize + has_flags as usize + has_cto as usize);

        // with no per-sample columns every sample is the default one and
        // nothing is stored; see `sample` and `iter_samples`
        let mut samples = Vec::new();
        if stride > 0 {
            let count = sample_count as usize;
            samples.reserve(count.min(r.remaining() / stride));
            for i in 0..count {
                let mut s = TrunSample::default();
                if has_duration {
                    s.duration = r.u32("sample_duration")?;
                }
                if has_size {
                    s.size = r.u32("sample_size")?;
                }
                if has_flags {
                    s.flags = r.u32("sample_flags")?;
                } else if i == 0 {
                    s.flags = first_sample_flags.unwrap_or(0);
                }
                if has_cto {
                    s.composition_time_offset = if ext.version == 0 {
                        r.u32("sample_composition_time_offset")? as i64
                    } else {
                        r.i32("sample_composition_time_offset")? as i64
                    };
                }
                samples.push(s);
            }
        }

        Ok(Self {
            version: ext.version,
            flags,
            sample_count,
            data_offset,
            first_sample_flags,
            samples,
        })
    }

    /// Sample `i` of the run, defaulted when the run stores no per-sample table.
    pub fn sample(&self, i: u32) -> Option<TrunSample> {
        if i >= self.sample_count {
            return None;
        }
        if !self.samples.is_empty() {
            return self.samples.get(i as usize).copied();
        }
        let flags = if i == 0 { self.first_sample_flags.unwrap_or(0) } else { 0 };
        Some(TrunSample { flags, ..TrunSample::default() })
    }

    /// All `sample_count` samples, produced on demand.
    pub fn iter_samples(&self) -> impl Iterator<Item = TrunSample> + '_ {
        (0..self.sample_count).map_while(|i| self.sample(i))
    }

    /// Sum of the per-sample durations present in the run.
    pub fn total_duration(&self) -> u64 {
        self.samples.iter().map(|s| s.duration as u64).sum()
    }
}

impl fmt::Display for TrunBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sample_count={}", self.sample_count)?;
        if let Some(v) = self.data_offset {
            write!(f, " data_offset={v}")?;
        }
        if let Some(v) = self.first_sample_flags {
            write!(f, " first_sample_flags={v:#010x}")?;
        }
        Ok(())
    }
}

// ---------- tfdt ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TfdtBox {
    pub base_media_decode_time: u64,
}

impl TfdtBox {
    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        let ext = b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        Ok(Self {
            base_media_decode_time: r.versioned_u64(ext.version, "base_media_decode_time")?,
        })
    }
}

impl fmt::Display for TfdtBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "base_media_decode_time={}", self.base_media_decode_time)
    }
}

// ---------- emsg ----------

/// Event timing: relative to the segment (version 0) or absolute on the
/// track timeline (version 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTime {
    Delta(u32),
    Absolute(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmsgBox {
    /// 0 selects the relative layout, any other value the absolute one.
    pub version: u8,
    pub flags: u32,
    pub scheme_id_uri: String,
    pub value: String,
    pub timescale: u32,
    pub presentation: EventTime,
    pub event_duration: u32,
    pub id: u32,
    #[serde(serialize_with = "as_hex")]
    pub message_data: Vec<u8>,
}

impl EmsgBox {
    pub fn decode(b: &mut Mp4Box) -> Result<Self> {
        let ext = b.parse_full_box_ext()?;
        let mut r = FieldReader::after_full_box_ext(b.box_type, &b.raw);
        let e = if ext.version == 0 {
            let scheme_id_uri = r.cstring("scheme_id_uri")?;
            let value = r.cstring("value")?;
            let timescale = r.u32("timescale")?;
            let delta = r.u32("presentation_time_delta")?;
            let event_duration = r.u32("event_duration")?;
            let id = r.u32("id")?;
            Self {
                version: 0,
                flags: ext.flags_u32(),
                scheme_id_uri,
                value,
                timescale,
                presentation: EventTime::Delta(delta),
                event_duration,
                id,
                message_data: r.rest().to_vec(),
            }
        } else {
            let timescale = r.u32("timescale")?;
            let time = r.u64("presentation_time")?;
            let event_duration = r.u32("event_duration")?;
            let id = r.u32("id")?;
            let scheme_id_uri = r.cstring("scheme_id_uri")?;
            let value = r.cstring("value")?;
            Self {
                version: ext.version,
                flags: ext.flags_u32(),
                scheme_id_uri,
                value,
                timescale,
                presentation: EventTime::Absolute(time),
                event_duration,
                id,
                message_data: r.rest().to_vec(),
            }
        };
        Ok(e)
    }

    /// Full payload bytes, version/flags prefix included.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let mut w = Vec::with_capacity(
            4 + 24 + self.scheme_id_uri.len() + self.value.len() + 2 + self.message_data.len(),
        );
        w.write_all(&FullBoxExt::new(self.version, self.flags).to_bytes())?;
        match (self.version, self.presentation) {
            (0, EventTime::Delta(delta)) => {
                write_cstring(&mut w, &self.scheme_id_uri)?;
                write_cstring(&mut w, &self.value)?;
                w.write_u32::<BigEndian>(self.timescale)?;
                w.write_u32::<BigEndian>(delta)?;
                w.write_u32::<BigEndian>(self.event_duration)?;
                w.write_u32::<BigEndian>(self.id)?;
            }
            (1.., EventTime::Absolute(time)) => {
                w.write_u32::<BigEndian>(self.timescale)?;
                w.write_u64::<BigEndian>(time)?;
                w.write_u32::<BigEndian>(self.event_duration)?;
                w.write_u32::<BigEndian>(self.id)?;
                write_cstring(&mut w, &self.scheme_id_uri)?;
                write_cstring(&mut w, &self.value)?;
            }
            _ => {
                return Err(Error::EventTimeMismatch { version: self.version });
            }
        }
        w.write_all(&self.message_data)?;
        Ok(w)
    }

    /// Rewrite `b`'s payload and size from these fields.
    pub fn encode(&self, b: &mut Mp4Box) -> Result<()> {
        b.raw = self.to_payload()?;
        b.full_box = Some(FullBoxExt::new(self.version, self.flags));
        b.sync_size();
        Ok(())
    }

    /// A brand new `emsg` box carrying this event, ready for insertion.
    pub fn into_box(self) -> Result<Mp4Box> {
        let mut b = Mp4Box::new(FourCC::EMSG, None, Vec::new());
        self.encode(&mut b)?;
        b.kind = BoxKind::EventMessage(self);
        Ok(b)
    }
}

fn write_cstring<W: Write>(w: &mut W, s: &str) -> Result<()> {
    w.write_all(s.as_bytes())?;
    w.write_u8(0)?;
    Ok(())
}

impl fmt::Display for EmsgBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scheme={:?} value={:?} timescale={}", self.scheme_id_uri, self.value, self.timescale)?;
        match self.presentation {
            EventTime::Delta(d) => write!(f, " delta={d}")?,
            EventTime::Absolute(t) => write!(f, " time={t}")?,
        }
        write!(f, " duration={} id={} data={}B", self.event_duration, self.id, self.message_data.len())
    }
}
