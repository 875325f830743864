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
use bitflags::bitflags;

bitflags! {
    /// Which stages of a feature record have been parsed. Monotonic for
    /// a given feature, except that `reset_geometry` clears the
    /// geometry stages so another scale can be decoded.
    pub struct FeatureState: u8 {
        const TYPES     = 0b0000_0001;
        const COMMON    = 0b0000_0010;
        const HEADER2   = 0b0000_0100;
        const POINTS    = 0b0000_1000;
        const TRIANGLES = 0b0001_0000;
        const METADATA  = 0b0010_0000;
        const META_IDS  = 0b0100_0000;

        const GEOMETRY = Self::HEADER2.bits | Self::POINTS.bits | Self::TRIANGLES.bits;
    }
}
