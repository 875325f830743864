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
use crate::reader::StreamReader;
use anyhow::{ensure, Result};

/// Reads bit fields packed from the LSB of successive bytes. Bytes are
/// pulled from the underlying stream as needed, so dropping the reader
/// leaves the stream aligned to the byte after the last consumed bit;
/// the varint reader can take over directly.
pub struct BitReader<'a, 'r> {
    stream: &'r mut StreamReader<'a>,
    current: u8,
    bits_left: u8,
}

impl<'a, 'r> BitReader<'a, 'r> {
    pub fn new(stream: &'r mut StreamReader<'a>) -> Self {
        Self {
            stream,
            current: 0,
            bits_left: 0,
        }
    }

    /// Read `count` (<= 8) bits, LSB-first.
    pub fn read(&mut self, count: u8) -> Result<u8> {
        ensure!(count <= 8, "bit reads are limited to 8 bits");
        let mut value = 0u8;
        let mut produced = 0u8;
        while produced < count {
            if self.bits_left == 0 {
                self.current = self.stream.read_u8()?;
                self.bits_left = 8;
            }
            let take = (count - produced).min(self.bits_left);
            let mask = ((1u16 << take) - 1) as u8;
            value |= (self.current & mask) << produced;
            self.current >>= take;
            self.bits_left -= take;
            produced += take;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsb_first_within_a_byte() {
        // 0b1101_0110: reading 4 then 4 yields low nibble first.
        let buf = [0b1101_0110u8];
        let mut stream = StreamReader::new(&buf);
        let mut bits = BitReader::new(&mut stream);
        assert_eq!(bits.read(4).unwrap(), 0b0110);
        assert_eq!(bits.read(4).unwrap(), 0b1101);
    }

    #[test]
    fn test_read_across_byte_boundary() {
        let buf = [0b1111_0000u8, 0b0000_1010];
        let mut stream = StreamReader::new(&buf);
        let mut bits = BitReader::new(&mut stream);
        assert_eq!(bits.read(6).unwrap(), 0b11_0000);
        // Remaining two high bits of byte 0, then four low bits of byte 1.
        assert_eq!(bits.read(6).unwrap(), 0b1010_11);
    }

    #[test]
    fn test_handoff_realigns_to_byte() {
        let buf = [0b0000_0011u8, 42];
        let mut stream = StreamReader::new(&buf);
        {
            let mut bits = BitReader::new(&mut stream);
            assert_eq!(bits.read(2).unwrap(), 0b11);
        }
        // The partial byte is consumed; the stream continues at byte 1.
        assert_eq!(stream.read_u8().unwrap(), 42);
    }

    #[test]
    fn test_truncated_bits_error() {
        let buf = [0u8];
        let mut stream = StreamReader::new(&buf);
        let mut bits = BitReader::new(&mut stream);
        bits.read(8).unwrap();
        assert!(bits.read(1).is_err());
    }
}
