use crate::boxes::FourCC;
use crate::parser::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Bounds-checked big-endian cursor over a box payload.
///
/// Every read names the field it is after so a short payload turns into a
/// `TruncatedPayload` error carrying the box type, offset and byte counts.
pub(crate) struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
    box_type: FourCC,
}

impl<'a> FieldReader<'a> {
    pub fn new(box_type: FourCC, buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, box_type }
    }

    /// Start reading after the 4-byte version/flags prefix of a FullBox.
    pub fn after_full_box_ext(box_type: FourCC, buf: &'a [u8]) -> Self {
        Self { buf, pos: 4.min(buf.len()), box_type }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::TruncatedPayload {
                box_type: self.box_type,
                field,
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn skip(&mut self, n: usize, field: &'static str) -> Result<()> {
        self.take(n, field).map(|_| ())
    }

    pub fn u16(&mut self, field: &'static str) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2, field)?))
    }

    pub fn i16(&mut self, field: &'static str) -> Result<i16> {
        Ok(BigEndian::read_i16(self.take(2, field)?))
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4, field)?))
    }

    pub fn i32(&mut self, field: &'static str) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4, field)?))
    }

    pub fn u64(&mut self, field: &'static str) -> Result<u64> {
        Ok(BigEndian::read_u64(self.take(8, field)?))
    }

    /// 32-bit in version 0, 64-bit otherwise.
    pub fn versioned_u64(&mut self, version: u8, field: &'static str) -> Result<u64> {
        if version == 0 {
            self.u32(field).map(u64::from)
        } else {
            self.u64(field)
        }
    }

    pub fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    pub fn fourcc(&mut self, field: &'static str) -> Result<FourCC> {
        self.array::<4>(field).map(FourCC)
    }

    /// NUL-terminated UTF-8 string; the terminator must lie inside the payload.
    pub fn cstring(&mut self, field: &'static str) -> Result<String> {
        let rest = &self.buf[self.pos..];
        let Some(end) = rest.iter().position(|&b| b == 0) else {
            return Err(Error::UnterminatedString {
                box_type: self.box_type,
                field,
                offset: self.pos,
            });
        };
        let s = std::str::from_utf8(&rest[..end]).map_err(|_| Error::InvalidString {
            box_type: self.box_type,
            field,
            offset: self.pos,
        })?;
        self.pos += end + 1;
        Ok(s.to_owned())
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let s = &self.buf[self.pos..];
        self.pos = self.buf.len();
        s
    }
}

/// Classic 16-bytes-per-line hex dump with an ASCII column.
pub fn hex_dump(bytes: &[u8], start_offset: u64) -> String {
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let offs = start_offset + (i as u64) * 16;
        let hexs = chunk
            .iter()
            .map(|b| hex::encode([*b]))
            .collect::<Vec<_>>()
            .join(" ");
        let ascii: String = chunk
            .iter()
            .map(|&c| if c.is_ascii_graphic() || c == b' ' { c as char } else { '.' })
            .collect();
        out.push_str(&format!("{offs:08x}  {hexs:<47}  |{ascii}|\n"));
    }
    out
}
