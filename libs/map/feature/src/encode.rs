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

//! Feature record encoding. The generator tooling and the decoder tests
//! build records through this; it is the other half of the wire format
//! implemented by [`crate::ParsedFeature`].

use crate::wire::{
    ADDENDUM_HAS_HOUSE, ADDENDUM_HAS_RANK, ADDENDUM_HAS_REF, GEOM_AREA, GEOM_LINE, GEOM_POINT,
    HAS_ADDENDUM, HAS_LAYER, HAS_NAME, MARKERS_PER_BYTE, MARKER_BITS, MAX_MARKER, MAX_TYPES,
    TYPES_SHIFT,
};
use anyhow::{ensure, Result};
use mapfile::{
    point_to_grid, write_string, write_varint_u64, GeometryCodingParams, MapContainer,
    MemoryContainer, PointU, MAX_GEOMETRY_SCALES,
};
use mercator::Rect2;

enum Geometry {
    Point {
        center: [f64; 2],
    },
    InnerLine {
        points: Vec<[f64; 2]>,
        markers: Vec<u8>,
    },
    OuterLine {
        line: Vec<[f64; 2]>,
        per_scale: Vec<Option<Vec<[f64; 2]>>>,
    },
    InnerArea {
        strip: Vec<[f64; 2]>,
    },
    OuterArea {
        per_scale: Vec<Option<Vec<[f64; 2]>>>,
    },
}

pub struct FeatureBuilder {
    geometry: Geometry,
    types: Vec<u32>,
    names: Vec<(u8, String)>,
    layer: Option<i8>,
    house: Option<String>,
    reference: Option<String>,
    rank: Option<u8>,
}

impl FeatureBuilder {
    fn with_geometry(geometry: Geometry) -> Self {
        Self {
            geometry,
            types: Vec::new(),
            names: Vec::new(),
            layer: None,
            house: None,
            reference: None,
            rank: None,
        }
    }

    pub fn point(center: [f64; 2]) -> Self {
        Self::with_geometry(Geometry::Point { center })
    }

    /// An inline line run; `markers` carries one 2-bit simplification
    /// marker per intermediate point.
    pub fn inner_line(points: &[[f64; 2]], markers: &[u8]) -> Self {
        Self::with_geometry(Geometry::InnerLine {
            points: points.to_vec(),
            markers: markers.to_vec(),
        })
    }

    /// A line stored in the per-scale outer streams. `line` is the full
    /// resolution polyline; every populated per-scale entry must start
    /// at the same first point.
    pub fn outer_line(
        line: &[[f64; 2]],
        per_scale: &[Option<&[[f64; 2]]>; MAX_GEOMETRY_SCALES],
    ) -> Self {
        Self::with_geometry(Geometry::OuterLine {
            line: line.to_vec(),
            per_scale: per_scale
                .iter()
                .map(|s| s.map(|s| s.to_vec()))
                .collect(),
        })
    }

    pub fn inner_area(strip: &[[f64; 2]]) -> Self {
        Self::with_geometry(Geometry::InnerArea {
            strip: strip.to_vec(),
        })
    }

    pub fn outer_area(per_scale: &[Option<&[[f64; 2]]>; MAX_GEOMETRY_SCALES]) -> Self {
        Self::with_geometry(Geometry::OuterArea {
            per_scale: per_scale
                .iter()
                .map(|s| s.map(|s| s.to_vec()))
                .collect(),
        })
    }

    pub fn with_type(mut self, index: u32) -> Self {
        self.types.push(index);
        self
    }

    pub fn with_name(mut self, lang: u8, value: &str) -> Self {
        self.names.push((lang, value.to_owned()));
        self
    }

    pub fn with_layer(mut self, layer: i8) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_house(mut self, house: &str) -> Self {
        self.house = Some(house.to_owned());
        self
    }

    pub fn with_ref(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_owned());
        self
    }

    pub fn with_rank(mut self, rank: u8) -> Self {
        self.rank = Some(rank);
        self
    }

    /// The axis-aligned bound of everything the feature can draw, for
    /// seeding a spatial index.
    pub fn limit_rect(&self) -> Rect2 {
        let mut rect = Rect2::empty();
        let mut extend_all = |points: &[[f64; 2]]| {
            for &p in points {
                rect.extend(p);
            }
        };
        match &self.geometry {
            Geometry::Point { center } => extend_all(&[*center]),
            Geometry::InnerLine { points, .. } => extend_all(points),
            Geometry::OuterLine { line, .. } => extend_all(line),
            Geometry::InnerArea { strip } => extend_all(strip),
            Geometry::OuterArea { per_scale } => {
                for s in per_scale.iter().flatten() {
                    extend_all(s);
                }
            }
        }
        rect
    }

    /// Serialise the record, appending outer geometry to the container's
    /// per-scale streams as needed.
    pub fn build(&self, container: &mut MemoryContainer) -> Result<Vec<u8>> {
        ensure!(
            !self.types.is_empty() && self.types.len() <= MAX_TYPES,
            "a feature carries between one and {} types",
            MAX_TYPES
        );

        let params = container.coding_params();
        let mut out = Vec::new();

        let geom_bits = match self.geometry {
            Geometry::Point { .. } => GEOM_POINT,
            Geometry::InnerLine { .. } | Geometry::OuterLine { .. } => GEOM_LINE,
            Geometry::InnerArea { .. } | Geometry::OuterArea { .. } => GEOM_AREA,
        };
        let has_addendum = self.house.is_some() || self.reference.is_some() || self.rank.is_some();
        let mut header = geom_bits | (((self.types.len() - 1) as u8) << TYPES_SHIFT);
        if !self.names.is_empty() {
            header |= HAS_NAME;
        }
        if self.layer.is_some() {
            header |= HAS_LAYER;
        }
        if has_addendum {
            header |= HAS_ADDENDUM;
        }
        out.push(header);

        for &t in &self.types {
            write_varint_u64(&mut out, u64::from(t));
        }

        if !self.names.is_empty() {
            let mut body = Vec::new();
            for (lang, value) in &self.names {
                body.push(*lang);
                write_string(&mut body, value);
            }
            write_varint_u64(&mut out, body.len() as u64);
            out.extend_from_slice(&body);
        }
        if let Some(layer) = self.layer {
            out.push(layer as u8);
        }
        if has_addendum {
            let mut flags = 0u8;
            if self.house.is_some() {
                flags |= ADDENDUM_HAS_HOUSE;
            }
            if self.reference.is_some() {
                flags |= ADDENDUM_HAS_REF;
            }
            if self.rank.is_some() {
                flags |= ADDENDUM_HAS_RANK;
            }
            out.push(flags);
            if let Some(house) = &self.house {
                write_string(&mut out, house);
            }
            if let Some(reference) = &self.reference {
                write_string(&mut out, reference);
            }
            if let Some(rank) = self.rank {
                out.push(rank);
            }
        }

        match &self.geometry {
            Geometry::Point { center } => {
                let mut prev = params.base();
                params.write_point(&mut out, point_to_grid(*center), &mut prev);
            }
            Geometry::InnerLine { points, markers } => {
                ensure!(
                    (2..=15).contains(&points.len()),
                    "inner line holds 2 to 15 points"
                );
                ensure!(
                    markers.len() == points.len() - 2,
                    "one marker per intermediate point"
                );
                ensure!(markers.iter().all(|&m| m <= MAX_MARKER), "marker out of range");
                out.push(points.len() as u8);
                write_markers(&mut out, markers);
                let mut prev = params.base();
                for &p in points {
                    params.write_point(&mut out, point_to_grid(p), &mut prev);
                }
            }
            Geometry::OuterLine { line, per_scale } => {
                ensure!(line.len() >= 2, "a line has at least two points");
                let first = point_to_grid(line[0]);
                let mut offsets = [None; MAX_GEOMETRY_SCALES];
                for (i, entry) in per_scale.iter().enumerate() {
                    if let Some(polyline) = entry {
                        ensure!(i < container.scale_count(), "scale index out of range");
                        ensure!(
                            point_to_grid(polyline[0]) == first,
                            "per-scale polylines share the feature's first point"
                        );
                        let bytes = encode_run(&params.rebased(first), &polyline[1..]);
                        offsets[i] = Some(container.append_geometry(i, &bytes));
                    }
                }
                write_outer_header(&mut out, &offsets, Some((params, first)));
            }
            Geometry::InnerArea { strip } => {
                ensure!(
                    (3..=17).contains(&strip.len()),
                    "inner strip holds 3 to 17 points"
                );
                out.push((strip.len() - 2) as u8);
                let mut prev = params.base();
                for &p in strip {
                    params.write_point(&mut out, point_to_grid(p), &mut prev);
                }
            }
            Geometry::OuterArea { per_scale } => {
                let mut offsets = [None; MAX_GEOMETRY_SCALES];
                for (i, entry) in per_scale.iter().enumerate() {
                    if let Some(strip) = entry {
                        ensure!(i < container.scale_count(), "scale index out of range");
                        ensure!(strip.len() >= 3, "a strip has at least three points");
                        let bytes = encode_run(&params, strip);
                        offsets[i] = Some(container.append_triangles(i, &bytes));
                    }
                }
                write_outer_header(&mut out, &offsets, None);
            }
        }

        Ok(out)
    }
}

fn write_markers(out: &mut Vec<u8>, markers: &[u8]) {
    for chunk in markers.chunks(MARKERS_PER_BYTE) {
        let mut byte = 0u8;
        for (i, &m) in chunk.iter().enumerate() {
            byte |= m << (i as u8 * MARKER_BITS);
        }
        out.push(byte);
    }
}

// A per-scale stream run: point count, then the delta-coded points.
fn encode_run(params: &GeometryCodingParams, points: &[[f64; 2]]) -> Vec<u8> {
    let mut bytes = Vec::new();
    write_varint_u64(&mut bytes, points.len() as u64);
    let mut prev = params.base();
    for &p in points {
        params.write_point(&mut bytes, point_to_grid(p), &mut prev);
    }
    bytes
}

// The outer header2 byte packs the zero count nibble low and the
// presence mask high, followed for lines by the stored first point,
// then the populated offsets in mask order.
fn write_outer_header(
    out: &mut Vec<u8>,
    offsets: &[Option<u32>; MAX_GEOMETRY_SCALES],
    line_first: Option<(GeometryCodingParams, PointU)>,
) {
    let mut mask = 0u8;
    for (i, offset) in offsets.iter().enumerate() {
        if offset.is_some() {
            mask |= 1 << i;
        }
    }
    out.push(mask << 4);
    if let Some((params, first)) = line_first {
        let mut prev = params.base();
        params.write_point(out, first, &mut prev);
    }
    for offset in offsets.iter().flatten() {
        write_varint_u64(out, u64::from(*offset));
    }
}
