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

// The feature record header byte, shared by the decoder and the encoder.
//
//   bits 0-1  geometry kind (00 point, 01 line, 10 area, 11 reserved)
//   bits 2-4  typesCount - 1
//   bit  5    has-name
//   bit  6    has-layer
//   bit  7    has-addendum
//
// The addendum block opens with its own flags byte.

pub(crate) const GEOM_MASK: u8 = 0b0000_0011;
pub(crate) const GEOM_POINT: u8 = 0b00;
pub(crate) const GEOM_LINE: u8 = 0b01;
pub(crate) const GEOM_AREA: u8 = 0b10;

pub(crate) const TYPES_SHIFT: u8 = 2;
pub(crate) const TYPES_MASK: u8 = 0b0000_0111;
pub(crate) const MAX_TYPES: usize = 8;

pub(crate) const HAS_NAME: u8 = 1 << 5;
pub(crate) const HAS_LAYER: u8 = 1 << 6;
pub(crate) const HAS_ADDENDUM: u8 = 1 << 7;

pub(crate) const ADDENDUM_HAS_HOUSE: u8 = 1 << 0;
pub(crate) const ADDENDUM_HAS_REF: u8 = 1 << 1;
pub(crate) const ADDENDUM_HAS_RANK: u8 = 1 << 2;

// Simplification markers are 2 bits per intermediate point, four to a
// mask byte, low bits first.
pub(crate) const MARKER_BITS: u8 = 2;
pub(crate) const MARKERS_PER_BYTE: usize = 4;
pub(crate) const MAX_MARKER: u8 = 0b11;
