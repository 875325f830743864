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
mod bits;
mod coding;
mod container;
mod memory;
mod reader;

pub use crate::{
    bits::BitReader,
    coding::{grid_to_point, point_to_grid, GeometryCodingParams, PointU, COORD_BITS},
    container::{
        Classificator, FeatureId, FeatureSource, FeatureType, MapContainer, MAX_GEOMETRY_SCALES,
    },
    memory::{MemoryContainer, MemoryFeatureSource, TableClassificator},
    reader::{write_string, write_varint_u64, write_zigzag_i64, StreamReader},
};
