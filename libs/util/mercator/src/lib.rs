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
mod rect;
mod tile_grid;
mod viewport;

pub use crate::{
    rect::Rect2,
    tile_grid::{cell_size, enumerate_tiles, must_reset, tile_scale, TileKey, MAX_TILE_SCALE},
    viewport::Viewport,
};

// The mercator projection plane is a square centered on the origin. Both
// axes cover the same range, so a single pair of constants serves x and y.
pub const WORLD_MIN: f64 = -180.0;
pub const WORLD_MAX: f64 = 180.0;
pub const WORLD_SPAN: f64 = WORLD_MAX - WORLD_MIN;
