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
use crate::reader::{write_zigzag_i64, StreamReader};
use anyhow::{ensure, Result};
use mercator::{WORLD_MIN, WORLD_SPAN};

/// Grid precision per axis. The mercator square is quantised onto a
/// `2^COORD_BITS` x `2^COORD_BITS` integer grid for storage.
pub const COORD_BITS: u32 = 30;

const GRID_MAX: u32 = (1 << COORD_BITS) - 1;

/// A point on the storage grid.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PointU {
    pub x: u32,
    pub y: u32,
}

impl PointU {
    pub fn new(x: u32, y: u32) -> Self {
        assert!(x <= GRID_MAX && y <= GRID_MAX);
        Self { x, y }
    }
}

pub fn point_to_grid(p: [f64; 2]) -> PointU {
    let quantise = |v: f64| {
        let t = ((v - WORLD_MIN) / WORLD_SPAN).clamp(0., 1.);
        (t * GRID_MAX as f64).round() as u32
    };
    PointU::new(quantise(p[0]), quantise(p[1]))
}

pub fn grid_to_point(p: PointU) -> [f64; 2] {
    let expand = |v: u32| WORLD_MIN + v as f64 / GRID_MAX as f64 * WORLD_SPAN;
    [expand(p.x), expand(p.y)]
}

/// Parameters for delta-coded point runs: every run is seeded from the
/// base point, and each stored point is a zigzag-varint delta from its
/// predecessor. Outer line streams re-bind the base to the feature's
/// stored first point before decoding.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeometryCodingParams {
    base: PointU,
}

impl GeometryCodingParams {
    pub fn new(base: PointU) -> Self {
        Self { base }
    }

    /// The container default: the grid center.
    pub fn centered() -> Self {
        Self::new(PointU::new(GRID_MAX / 2, GRID_MAX / 2))
    }

    pub fn base(&self) -> PointU {
        self.base
    }

    pub fn rebased(&self, base: PointU) -> Self {
        Self { base }
    }

    /// Decode one point and advance the running predecessor.
    pub fn read_point(&self, stream: &mut StreamReader, prev: &mut PointU) -> Result<PointU> {
        let dx = stream.read_zigzag_i64()?;
        let dy = stream.read_zigzag_i64()?;
        let x = prev.x as i64 + dx;
        let y = prev.y as i64 + dy;
        ensure!(
            (0..=GRID_MAX as i64).contains(&x) && (0..=GRID_MAX as i64).contains(&y),
            "point delta walks off the coordinate grid"
        );
        let p = PointU::new(x as u32, y as u32);
        *prev = p;
        Ok(p)
    }

    pub fn write_point(&self, out: &mut Vec<u8>, p: PointU, prev: &mut PointU) {
        write_zigzag_i64(out, p.x as i64 - prev.x as i64);
        write_zigzag_i64(out, p.y as i64 - prev.y as i64);
        *prev = p;
    }
}
