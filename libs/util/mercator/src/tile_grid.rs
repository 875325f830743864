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
use crate::{rect::Rect2, viewport::Viewport, WORLD_SPAN};
use std::{cmp::Ordering, collections::BTreeSet, fmt};

pub const MAX_TILE_SCALE: i8 = 17;

// How many cells the larger viewport span is allowed to cover at the
// chosen scale. Smaller values pick coarser tiles for the same camera.
const TILES_ACROSS_VIEWPORT: f64 = 4.0;

/// One cell of the quadtree grid: integer cell indices plus the scale
/// level. Cell (x, y) at scale z covers `[x*r, (x+1)*r] x [y*r, (y+1)*r]`
/// on the plane, with `r = WORLD_SPAN / 2^z`; indices are signed because
/// the grid is anchored on the plane origin.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TileKey {
    x: i32,
    y: i32,
    z: i8,
}

impl TileKey {
    pub fn new(x: i32, y: i32, z: i8) -> Self {
        Self { x, y, z }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn z(&self) -> i8 {
        self.z
    }

    /// The mercator rectangle this tile covers.
    pub fn rect(&self) -> Rect2 {
        let r = cell_size(self.z);
        Rect2::new(
            [self.x as f64 * r, self.y as f64 * r],
            [(self.x + 1) as f64 * r, (self.y + 1) as f64 * r],
        )
    }
}

// Scale-major ordering so one scale's tiles group together in the live
// set and set-difference walks stay merge-like.
impl Ord for TileKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.z, self.x, self.y).cmp(&(other.z, other.x, other.y))
    }
}

impl PartialOrd for TileKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})@{}", self.x, self.y, self.z)
    }
}

pub fn cell_size(z: i8) -> f64 {
    WORLD_SPAN / (1u64 << z) as f64
}

/// Pick the tile scale for a viewport: the finest z at which the larger
/// clip-rect span still fits in TILES_ACROSS_VIEWPORT cells, clamped to
/// the usable scale range.
pub fn tile_scale(viewport: &Viewport) -> i8 {
    let clip = viewport.clip_rect();
    let span = clip.span(0).max(clip.span(1)).max(f64::MIN_POSITIVE);
    let z = (TILES_ACROSS_VIEWPORT * WORLD_SPAN / span).log2().floor() as i64;
    z.clamp(1, MAX_TILE_SCALE as i64) as i8
}

/// All tiles at the viewport's scale whose cell intersects the rotated
/// viewport polygon. Cells are clamped to the world grid, so a camera
/// hanging off the edge of the plane enumerates only real tiles.
pub fn enumerate_tiles(viewport: &Viewport) -> BTreeSet<TileKey> {
    let z = tile_scale(viewport);
    let r = cell_size(z);
    let half = 1i64 << (z - 1);
    let clip = viewport.clip_rect();

    let x0 = ((clip.low(0) / r).floor() as i64).max(-half);
    let x1 = ((clip.high(0) / r).ceil() as i64).min(half);
    let y0 = ((clip.low(1) / r).floor() as i64).max(-half);
    let y1 = ((clip.high(1) / r).ceil() as i64).min(half);

    let mut tiles = BTreeSet::new();
    for x in x0..x1 {
        for y in y0..y1 {
            let cell = Rect2::new(
                [x as f64 * r, y as f64 * r],
                [(x + 1) as f64 * r, (y + 1) as f64 * r],
            );
            if viewport.intersects_rect(&cell) {
                tiles.insert(TileKey::new(x as i32, y as i32, z));
            }
        }
    }
    tiles
}

/// When the scale changes or the old and new footprints are disjoint,
/// diffing the live set is pointless; the manager discards everything.
pub fn must_reset(old: &Viewport, new: &Viewport) -> bool {
    tile_scale(old) != tile_scale(new) || !old.intersects(new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    fn viewport_for_scale(z: i8) -> Viewport {
        // A square viewport exactly TILES_ACROSS_VIEWPORT cells wide.
        let half = cell_size(z) * TILES_ACROSS_VIEWPORT / 2.;
        Viewport::new([0., 0.], [half, half], 0.)
    }

    #[test]
    fn test_key_ordering_is_scale_major() {
        let mut keys = vec![
            TileKey::new(5, 0, 11),
            TileKey::new(0, 9, 10),
            TileKey::new(0, 2, 10),
            TileKey::new(-3, 0, 11),
        ];
        keys.sort();
        assert_eq!(keys[0], TileKey::new(0, 2, 10));
        assert_eq!(keys[1], TileKey::new(0, 9, 10));
        assert_eq!(keys[2], TileKey::new(-3, 0, 11));
    }

    #[test]
    fn test_tile_rect_tiles_the_plane() {
        let a = TileKey::new(0, 0, 10).rect();
        let b = TileKey::new(1, 0, 10).rect();
        assert_eq!(a.high(0), b.low(0));
        assert_eq!(a.span(0), cell_size(10));
    }

    #[test]
    fn test_tile_scale_halves_with_span() {
        let z = tile_scale(&viewport_for_scale(10));
        assert_eq!(z, 10);
        let half = cell_size(10) * TILES_ACROSS_VIEWPORT / 4.;
        let closer = Viewport::new([0., 0.], [half, half], 0.);
        assert_eq!(tile_scale(&closer), 11);
    }

    #[test]
    fn test_tile_scale_clamps() {
        let whole_world = Viewport::axis_aligned(&Rect2::world());
        assert_eq!(tile_scale(&whole_world), 2);
        let tiny = Viewport::new([0., 0.], [1e-12, 1e-12], 0.);
        assert_eq!(tile_scale(&tiny), MAX_TILE_SCALE);
    }

    #[test]
    fn test_enumerate_axis_aligned() {
        let tiles = enumerate_tiles(&viewport_for_scale(10));
        // Four cells across in each axis, centered on the origin.
        assert_eq!(tiles.len(), 16);
        assert!(tiles.contains(&TileKey::new(-2, -2, 10)));
        assert!(tiles.contains(&TileKey::new(1, 1, 10)));
        assert!(!tiles.contains(&TileKey::new(2, 2, 10)));
    }

    #[test]
    fn test_enumerate_rotated_skips_corner_cells() {
        let z = 10;
        let half = cell_size(z) * TILES_ACROSS_VIEWPORT / 2.;
        let straight = Viewport::new([0., 0.], [half, half], 0.);
        let diamond = Viewport::new([0., 0.], [half, half], FRAC_PI_4);
        let straight_tiles = enumerate_tiles(&straight);
        let diamond_tiles = enumerate_tiles(&diamond);
        // The rotated footprint spills into more columns but misses the
        // clip rect's extreme corner cells.
        assert!(!diamond_tiles.contains(&TileKey::new(-3, -3, z)));
        assert!(diamond_tiles.contains(&TileKey::new(0, 0, z)));
        assert!(straight_tiles.contains(&TileKey::new(-2, -2, z)));
    }

    #[test]
    fn test_enumerate_clamps_to_world() {
        let z = 4;
        let half = cell_size(z) * TILES_ACROSS_VIEWPORT / 2.;
        let off_edge = Viewport::new([crate::WORLD_MAX, 0.], [half, half], 0.);
        for key in enumerate_tiles(&off_edge) {
            assert!(key.x() < 1 << (z - 1));
        }
    }

    #[test]
    fn test_must_reset() {
        let a = viewport_for_scale(10);
        let shifted = {
            let half = cell_size(10) * TILES_ACROSS_VIEWPORT / 2.;
            Viewport::new([half / 2., 0.], [half, half], 0.)
        };
        assert!(!must_reset(&a, &shifted));
        assert!(must_reset(&a, &viewport_for_scale(11)));
        let far = {
            let half = cell_size(10) * TILES_ACROSS_VIEWPORT / 2.;
            Viewport::new([100., 100.], [half, half], 0.)
        };
        assert!(must_reset(&a, &far));
    }
}
