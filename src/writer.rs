use crate::boxes::{BoxKind, FourCC, Mp4Box};
use crate::parser::{Error, Result};
use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

/// Depth that never stops descending.
pub const UNBOUNDED: usize = usize::MAX;

impl Mp4Box {
    /// Write the header from the current size/type fields. Returns bytes written.
    pub fn write_header<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize> {
        if self.size == 0 {
            return Err(Error::UnsupportedSize { box_type: self.box_type });
        }
        w.write_u32::<BigEndian>(self.size)?;
        w.write_all(&self.box_type.0)?;
        let mut n = 8;
        if self.size == 1 {
            w.write_u64::<BigEndian>(self.large_size)?;
            n += 8;
        }
        if self.box_type == FourCC::UUID {
            w.write_all(&self.user_type.unwrap_or_default())?;
            n += 16;
        }
        Ok(n)
    }

    /// Serialize this box to `w`.
    ///
    /// While `depth > 0` decoded children are written recursively with
    /// `depth - 1`; otherwise the payload is written from `raw`, with the
    /// FullBox prefix rebuilt from `full_box`. Returns bytes written.
    pub fn output<W: Write + ?Sized>(&self, w: &mut W, depth: usize) -> Result<usize> {
        let mut n = self.write_header(w)?;
        if depth > 0 && !self.children.is_empty() {
            for child in &self.children {
                n += child.output(w, depth - 1)?;
            }
            return Ok(n);
        }
        match self.full_box {
            Some(ext) if self.raw.len() >= 4 => {
                w.write_all(&ext.to_bytes())?;
                w.write_all(&self.raw[4..])?;
            }
            _ => w.write_all(&self.raw)?,
        }
        Ok(n + self.raw.len())
    }

    /// Bytes `output(_, depth)` would write.
    pub fn encoded_len(&self, depth: usize) -> u64 {
        let header = self.size_header() as u64;
        if depth > 0 && !self.children.is_empty() {
            header + self.children.iter().map(|c| c.encoded_len(depth - 1)).sum::<u64>()
        } else {
            header + self.raw.len() as u64
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut v = Vec::with_capacity(self.encoded_len(UNBOUNDED) as usize);
        self.output(&mut v, UNBOUNDED)?;
        Ok(v)
    }

    /// Rebuild `raw` from decoded fields for the types that have an encoder
    /// (`emsg`); otherwise only the FullBox prefix is refreshed.
    pub fn encode(&mut self) -> Result<()> {
        if let BoxKind::EventMessage(e) = &self.kind {
            let e = e.clone();
            return e.encode(self);
        }
        self.encode_full_box_ext();
        Ok(())
    }
}
