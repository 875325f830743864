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
use crate::rect::Rect2;

/// The camera's footprint on the mercator plane: a rectangle rotated about
/// its center. Corners are kept in winding order; equality is exact on the
/// corners, which is what the read manager's no-op short-circuit needs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    corners: [[f64; 2]; 4],
}

impl Viewport {
    /// A viewport from center, half extents, and a CCW rotation in radians.
    pub fn new(center: [f64; 2], half: [f64; 2], rotation: f64) -> Self {
        let (sin, cos) = rotation.sin_cos();
        let rot = |dx: f64, dy: f64| {
            [
                center[0] + dx * cos - dy * sin,
                center[1] + dx * sin + dy * cos,
            ]
        };
        Self {
            corners: [
                rot(-half[0], -half[1]),
                rot(half[0], -half[1]),
                rot(half[0], half[1]),
                rot(-half[0], half[1]),
            ],
        }
    }

    pub fn axis_aligned(rect: &Rect2) -> Self {
        Self {
            corners: rect.corners(),
        }
    }

    pub fn corners(&self) -> &[[f64; 2]; 4] {
        &self.corners
    }

    /// The axis-aligned clipping rectangle of the rotated polygon.
    pub fn clip_rect(&self) -> Rect2 {
        let mut clip = Rect2::empty();
        for c in &self.corners {
            clip.extend(*c);
        }
        clip
    }

    pub fn intersects_rect(&self, rect: &Rect2) -> bool {
        convex_overlap(&self.corners, &rect.corners())
    }

    pub fn intersects(&self, other: &Viewport) -> bool {
        convex_overlap(&self.corners, &other.corners)
    }
}

// Separating-axis test for two convex quads. The candidate axes are the
// edge normals of both quads; disjoint projections on any axis means the
// quads do not overlap.
fn convex_overlap(a: &[[f64; 2]; 4], b: &[[f64; 2]; 4]) -> bool {
    for poly in [a, b] {
        for i in 0..4 {
            let p0 = poly[i];
            let p1 = poly[(i + 1) % 4];
            let axis = [p0[1] - p1[1], p1[0] - p0[0]];
            let (a_lo, a_hi) = project(a, axis);
            let (b_lo, b_hi) = project(b, axis);
            if a_hi < b_lo || b_hi < a_lo {
                return false;
            }
        }
    }
    true
}

fn project(poly: &[[f64; 2]; 4], axis: [f64; 2]) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for p in poly {
        let d = p[0] * axis[0] + p[1] * axis[1];
        lo = lo.min(d);
        hi = hi.max(d);
    }
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn test_clip_rect_of_rotated() {
        let v = Viewport::new([0., 0.], [1., 1.], FRAC_PI_4);
        let clip = v.clip_rect();
        let d = 2f64.sqrt();
        assert_abs_diff_eq!(clip.low(0), -d, epsilon = 1e-12);
        assert_abs_diff_eq!(clip.high(1), d, epsilon = 1e-12);
    }

    #[test]
    fn test_rotated_misses_clip_corner() {
        // A diamond's clip rect covers its corner cells, but the diamond
        // itself does not reach into them.
        let v = Viewport::new([0., 0.], [10., 10.], FRAC_PI_4);
        let corner_cell = Rect2::new([12., 12.], [14., 14.]);
        assert!(v.clip_rect().overlaps(&corner_cell));
        assert!(!v.intersects_rect(&corner_cell));
        assert!(v.intersects_rect(&Rect2::new([-1., -1.], [1., 1.])));
    }

    #[test]
    fn test_viewport_intersection() {
        let a = Viewport::new([0., 0.], [2., 1.], 0.);
        let b = Viewport::new([1., 0.], [2., 1.], 0.3);
        let c = Viewport::new([40., 40.], [2., 1.], 0.);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&a));
    }

    #[test]
    fn test_equality_is_exact() {
        let a = Viewport::new([0., 0.], [2., 1.], 0.);
        let b = Viewport::new([0., 0.], [2., 1.], 0.);
        let c = Viewport::new([0., 1e-9], [2., 1.], 0.);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
