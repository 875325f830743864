// This file is part of Meridian.
//
// Meridian is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Meridian is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Meridian.  If not, see <http://www.gnu.org/licenses/>.
use anyhow::{bail, ensure, Result};

/// A seekable cursor over an in-memory byte stream. All multi-byte reads
/// are LEB128 varints: 7 data bits per byte, MSB is the continuation bit.
pub struct StreamReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> StreamReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.buf.len()
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        ensure!(pos <= self.buf.len(), "seek past end of stream");
        self.pos = pos;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        match self.buf.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => bail!("truncated stream at offset {}", self.pos),
        }
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        ensure!(
            self.remaining() >= count,
            "truncated stream: wanted {} bytes at offset {}, have {}",
            count,
            self.pos,
            self.remaining()
        );
        let out = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(out)
    }

    pub fn read_varint_u64(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            ensure!(shift < 64, "varint overflow at offset {}", self.pos);
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub fn read_varint_u32(&mut self) -> Result<u32> {
        let value = self.read_varint_u64()?;
        ensure!(value <= u32::MAX as u64, "varint out of u32 range");
        Ok(value as u32)
    }

    /// Zigzag-coded signed varint, as used for point deltas.
    pub fn read_zigzag_i64(&mut self) -> Result<i64> {
        let raw = self.read_varint_u64()?;
        Ok((raw >> 1) as i64 ^ -((raw & 1) as i64))
    }

    pub fn read_string(&mut self) -> Result<&'a str> {
        let len = self.read_varint_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(std::str::from_utf8(bytes)?)
    }
}

// Writers live next to the readers so the two halves of the format stay
// in one place; the feature encoder and the pack generators build on
// these.

pub fn write_varint_u64(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn write_zigzag_i64(out: &mut Vec<u8>, value: i64) {
    write_varint_u64(out, ((value << 1) ^ (value >> 63)) as u64);
}

pub fn write_string(out: &mut Vec<u8>, s: &str) {
    write_varint_u64(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_round_trip() {
        let mut buf = Vec::new();
        let samples = [0u64, 1, 127, 128, 300, 1 << 21, u64::MAX];
        for &v in &samples {
            write_varint_u64(&mut buf, v);
        }
        let mut reader = StreamReader::new(&buf);
        for &v in &samples {
            assert_eq!(reader.read_varint_u64().unwrap(), v);
        }
        assert!(reader.at_end());
    }

    #[test]
    fn test_zigzag_round_trip() {
        let mut buf = Vec::new();
        let samples = [0i64, -1, 1, -64, 63, i64::MIN, i64::MAX];
        for &v in &samples {
            write_zigzag_i64(&mut buf, v);
        }
        let mut reader = StreamReader::new(&buf);
        for &v in &samples {
            assert_eq!(reader.read_zigzag_i64().unwrap(), v);
        }
    }

    #[test]
    fn test_truncated_varint_is_an_error() {
        let mut reader = StreamReader::new(&[0x80, 0x80]);
        assert!(reader.read_varint_u64().is_err());
    }

    #[test]
    fn test_varint_overflow_is_an_error() {
        let mut reader = StreamReader::new(&[0xff; 11]);
        assert!(reader.read_varint_u64().is_err());
    }

    #[test]
    fn test_seek_and_position() {
        let mut reader = StreamReader::new(&[1, 2, 3]);
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.position(), 1);
        reader.seek(2).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 3);
        assert!(reader.seek(4).is_err());
    }
}
