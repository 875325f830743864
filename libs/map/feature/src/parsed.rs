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
use crate::{
    state::FeatureState,
    wire::{
        ADDENDUM_HAS_HOUSE, ADDENDUM_HAS_RANK, ADDENDUM_HAS_REF, GEOM_AREA, GEOM_LINE, GEOM_MASK,
        GEOM_POINT, HAS_ADDENDUM, HAS_LAYER, HAS_NAME, MARKERS_PER_BYTE, MARKER_BITS, MAX_MARKER,
        TYPES_MASK, TYPES_SHIFT,
    },
    BEST_GEOMETRY, WORST_GEOMETRY,
};
use anyhow::{ensure, Result};
use log::warn;
use mapfile::{
    grid_to_point, BitReader, Classificator, FeatureId, FeatureType, MapContainer, PointU,
    StreamReader, MAX_GEOMETRY_SCALES,
};
use mercator::Rect2;
use smallvec::SmallVec;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GeomType {
    Point,
    Line,
    Area,
}

/// Everything a feature needs from its container to finish parsing.
/// Handed to the decoder by the tile reader; a feature that reaches a
/// geometry or metadata stage without one is a caller-side contract
/// breach.
#[derive(Copy, Clone)]
pub struct LoadContext<'a> {
    pub container: &'a dyn MapContainer,
    pub classificator: &'a dyn Classificator,
    pub feature_id: FeatureId,
}

/// The working memory of one feature record.
///
/// Parsing is staged: `types -> common -> header2 -> points|triangles`,
/// with `metadata` and `meta_ids` as independent side branches. Each
/// stage is guarded by its state flag and re-entry is a no-op; calling a
/// late stage drives the whole chain. `reset_geometry` rolls back only
/// the geometry stages so another scale can be decoded without redoing
/// types and common.
pub struct ParsedFeature<'a> {
    ctx: LoadContext<'a>,
    stream: StreamReader<'a>,
    state: FeatureState,
    header: u8,

    // Stage boundaries, recorded as each stage completes.
    common_offset: usize,
    header2_offset: usize,

    types: SmallVec<[FeatureType; 8]>,
    names: SmallVec<[(u8, &'a str); 2]>,
    layer: i8,
    house: Option<&'a str>,
    reference: Option<&'a str>,
    rank: Option<u8>,

    center: Option<[f64; 2]>,
    // Full-resolution inner run (line) or strip (area), before LOD
    // filtering.
    inner_points: Vec<PointU>,
    markers: Vec<u8>,
    outer_offsets: [Option<u32>; MAX_GEOMETRY_SCALES],
    first_point: Option<PointU>,

    points: Vec<[f64; 2]>,
    triangles: Vec<[f64; 2]>,
    geometry_scale: Option<i32>,
    limit_rect: Rect2,

    meta: SmallVec<[(u8, String); 8]>,
    meta_ids: SmallVec<[(u8, u32); 8]>,
}

impl<'a> ParsedFeature<'a> {
    pub fn new(record: &'a [u8], ctx: LoadContext<'a>) -> Result<Self> {
        let mut stream = StreamReader::new(record);
        let header = stream.read_u8()?;
        ensure!(
            header & GEOM_MASK != GEOM_MASK,
            "reserved geometry kind in feature header"
        );
        Ok(Self {
            ctx,
            stream,
            state: FeatureState::empty(),
            header,
            common_offset: 0,
            header2_offset: 0,
            types: SmallVec::new(),
            names: SmallVec::new(),
            layer: 0,
            house: None,
            reference: None,
            rank: None,
            center: None,
            inner_points: Vec::new(),
            markers: Vec::new(),
            outer_offsets: [None; MAX_GEOMETRY_SCALES],
            first_point: None,
            points: Vec::new(),
            triangles: Vec::new(),
            geometry_scale: None,
            limit_rect: Rect2::empty(),
            meta: SmallVec::new(),
            meta_ids: SmallVec::new(),
        })
    }

    pub fn geom_type(&self) -> GeomType {
        match self.header & GEOM_MASK {
            GEOM_POINT => GeomType::Point,
            GEOM_LINE => GeomType::Line,
            GEOM_AREA => GeomType::Area,
            _ => unreachable!("validated in new"),
        }
    }

    pub fn state(&self) -> FeatureState {
        self.state
    }

    // ---- stage: types -------------------------------------------------

    pub fn parse_types(&mut self) -> Result<()> {
        if self.state.contains(FeatureState::TYPES) {
            return Ok(());
        }
        self.stream.seek(1)?;
        let count = usize::from((self.header >> TYPES_SHIFT) & TYPES_MASK) + 1;
        for _ in 0..count {
            let index = self.stream.read_varint_u32()?;
            let resolved = match self.ctx.classificator.resolve(index) {
                Some(t) => t,
                None => {
                    warn!(
                        "feature {}: unresolvable type index {}, substituting stub",
                        self.ctx.feature_id, index
                    );
                    self.ctx.classificator.stub()
                }
            };
            self.types.push(resolved);
        }
        self.common_offset = self.stream.position();
        self.state |= FeatureState::TYPES;
        Ok(())
    }

    // ---- stage: common ------------------------------------------------

    pub fn parse_common(&mut self) -> Result<()> {
        if self.state.contains(FeatureState::COMMON) {
            return Ok(());
        }
        self.parse_types()?;
        self.stream.seek(self.common_offset)?;

        if self.header & HAS_NAME != 0 {
            let blob_len = self.stream.read_varint_u32()? as usize;
            let end = self.stream.position() + blob_len;
            while self.stream.position() < end {
                let lang = self.stream.read_u8()?;
                let value = self.stream.read_string()?;
                self.names.push((lang, value));
            }
            ensure!(
                self.stream.position() == end,
                "name blob overruns its length prefix"
            );
        }
        if self.header & HAS_LAYER != 0 {
            self.layer = self.stream.read_u8()? as i8;
        }
        if self.header & HAS_ADDENDUM != 0 {
            let flags = self.stream.read_u8()?;
            ensure!(
                flags & !(ADDENDUM_HAS_HOUSE | ADDENDUM_HAS_REF | ADDENDUM_HAS_RANK) == 0,
                "unknown addendum flags {:#04x}",
                flags
            );
            if flags & ADDENDUM_HAS_HOUSE != 0 {
                self.house = Some(self.stream.read_string()?);
            }
            if flags & ADDENDUM_HAS_REF != 0 {
                self.reference = Some(self.stream.read_string()?);
            }
            if flags & ADDENDUM_HAS_RANK != 0 {
                self.rank = Some(self.stream.read_u8()?);
            }
        }
        if self.geom_type() == GeomType::Point {
            let params = self.ctx.container.coding_params();
            let mut prev = params.base();
            let p = params.read_point(&mut self.stream, &mut prev)?;
            let c = grid_to_point(p);
            self.center = Some(c);
            self.limit_rect.extend(c);
        }

        self.header2_offset = self.stream.position();
        self.state |= FeatureState::COMMON;
        Ok(())
    }

    // ---- stage: header2 -----------------------------------------------

    pub fn parse_header2(&mut self) -> Result<()> {
        if self.state.contains(FeatureState::HEADER2) {
            return Ok(());
        }
        self.parse_common()?;
        let geom = self.geom_type();
        if geom == GeomType::Point {
            self.state |= FeatureState::HEADER2;
            return Ok(());
        }
        self.stream.seek(self.header2_offset)?;

        // The count nibble, and for outer storage the presence mask,
        // come off the bit reader; dropping it realigns the stream to
        // the next byte for everything that follows.
        let (count, mask) = {
            let mut bits = BitReader::new(&mut self.stream);
            let count = bits.read(4)?;
            if count == 0 {
                (0usize, bits.read(4)?)
            } else {
                (usize::from(count), 0u8)
            }
        };

        if count > 0 {
            match geom {
                GeomType::Line => self.read_inner_line(count)?,
                GeomType::Area => self.read_inner_strip(count)?,
                GeomType::Point => unreachable!(),
            }
        } else {
            if geom == GeomType::Line {
                // The stored first point seeds outer stream decoding.
                let params = self.ctx.container.coding_params();
                let mut prev = params.base();
                let p = params.read_point(&mut self.stream, &mut prev)?;
                self.first_point = Some(p);
                self.limit_rect.extend(grid_to_point(p));
            }
            for i in 0..MAX_GEOMETRY_SCALES {
                if mask & (1 << i) != 0 {
                    self.outer_offsets[i] = Some(self.stream.read_varint_u32()?);
                }
            }
        }

        self.state |= FeatureState::HEADER2;
        Ok(())
    }

    fn read_inner_line(&mut self, count: usize) -> Result<()> {
        ensure!(count >= 2, "inner line with fewer than two points");
        let marker_count = count - 2;
        let mask_bytes = (marker_count + MARKERS_PER_BYTE - 1) / MARKERS_PER_BYTE;
        let mask = self.stream.read_bytes(mask_bytes)?;
        for i in 0..marker_count {
            let byte = mask[i / MARKERS_PER_BYTE];
            let shift = (i % MARKERS_PER_BYTE) as u8 * MARKER_BITS;
            self.markers.push((byte >> shift) & MAX_MARKER);
        }
        let params = self.ctx.container.coding_params();
        let mut prev = params.base();
        for _ in 0..count {
            let p = params.read_point(&mut self.stream, &mut prev)?;
            self.limit_rect.extend(grid_to_point(p));
            self.inner_points.push(p);
        }
        Ok(())
    }

    fn read_inner_strip(&mut self, count: usize) -> Result<()> {
        let params = self.ctx.container.coding_params();
        let mut prev = params.base();
        for _ in 0..count + 2 {
            let p = params.read_point(&mut self.stream, &mut prev)?;
            self.limit_rect.extend(grid_to_point(p));
            self.inner_points.push(p);
        }
        Ok(())
    }

    // ---- stage: points ------------------------------------------------

    pub fn parse_points(&mut self, scale: i32) -> Result<()> {
        ensure!(
            self.geom_type() == GeomType::Line,
            "points requested from a non-line feature"
        );
        if self.state.contains(FeatureState::POINTS) {
            if self.geometry_scale == Some(scale) {
                return Ok(());
            }
            self.reset_geometry();
        }
        self.parse_header2()?;

        if !self.inner_points.is_empty() {
            self.filter_inner_line(scale);
        } else {
            self.read_outer_line(scale)?;
        }

        self.geometry_scale = Some(scale);
        self.state |= FeatureState::POINTS;
        Ok(())
    }

    fn filter_inner_line(&mut self, scale: i32) {
        let lod = self.lod_index(scale) as u8;
        let last = self.inner_points.len() - 1;
        let mut kept: Vec<usize> = vec![0];
        kept.extend((1..last).filter(|&i| self.markers[i - 1] <= lod));
        kept.push(last);

        if kept.len() == 2 && last > 1 {
            // Nothing survived between the endpoints; fall back to the
            // coarsest level the feature actually carries.
            let min = *self.markers.iter().min().expect("last > 1");
            kept = vec![0];
            kept.extend((1..last).filter(|&i| self.markers[i - 1] == min));
            kept.push(last);
        }

        for i in kept {
            let p = grid_to_point(self.inner_points[i]);
            self.limit_rect.extend(p);
            self.points.push(p);
        }
    }

    fn read_outer_line(&mut self, scale: i32) -> Result<()> {
        let index = self
            .offset_index(scale)
            .or_else(|| self.offset_index(WORST_GEOMETRY));
        let index = match index {
            Some(index) => index,
            None => {
                // No geometry at any scale: collapse the limit rect so
                // visibility checks skip the feature.
                self.points.clear();
                self.limit_rect = Rect2::empty();
                return Ok(());
            }
        };
        let offset = self.outer_offsets[index].expect("offset_index only returns populated slots");
        let first = self
            .first_point
            .expect("outer line header stores its first point");

        let section = self.ctx.container.geometry_section(index)?;
        let mut stream = StreamReader::new(section);
        stream.seek(offset as usize)?;
        let params = self.ctx.container.coding_params().rebased(first);
        let count = stream.read_varint_u32()? as usize;

        self.points.push(grid_to_point(first));
        self.limit_rect.extend(grid_to_point(first));
        let mut prev = params.base();
        for _ in 0..count {
            let p = params.read_point(&mut stream, &mut prev)?;
            let p = grid_to_point(p);
            self.limit_rect.extend(p);
            self.points.push(p);
        }
        Ok(())
    }

    // ---- stage: triangles ---------------------------------------------

    pub fn parse_triangles(&mut self, scale: i32) -> Result<()> {
        ensure!(
            self.geom_type() == GeomType::Area,
            "triangles requested from a non-area feature"
        );
        if self.state.contains(FeatureState::TRIANGLES) {
            if self.geometry_scale == Some(scale) {
                return Ok(());
            }
            self.reset_geometry();
        }
        self.parse_header2()?;

        if !self.inner_points.is_empty() {
            // Inner strips are stored at a single level of detail.
            for &p in &self.inner_points {
                let p = grid_to_point(p);
                self.limit_rect.extend(p);
                self.triangles.push(p);
            }
        } else {
            self.read_outer_strip(scale)?;
        }

        self.geometry_scale = Some(scale);
        self.state |= FeatureState::TRIANGLES;
        Ok(())
    }

    fn read_outer_strip(&mut self, scale: i32) -> Result<()> {
        let index = self
            .offset_index(scale)
            .or_else(|| self.offset_index(WORST_GEOMETRY));
        let index = match index {
            Some(index) => index,
            None => {
                self.triangles.clear();
                self.limit_rect = Rect2::empty();
                return Ok(());
            }
        };
        let offset = self.outer_offsets[index].expect("offset_index only returns populated slots");

        let section = self.ctx.container.triangle_section(index)?;
        let mut stream = StreamReader::new(section);
        stream.seek(offset as usize)?;
        let params = self.ctx.container.coding_params();
        let count = stream.read_varint_u32()? as usize;
        ensure!(count >= 3, "triangle strip with fewer than three points");

        let mut prev = params.base();
        for _ in 0..count {
            let p = params.read_point(&mut stream, &mut prev)?;
            let p = grid_to_point(p);
            self.limit_rect.extend(p);
            self.triangles.push(p);
        }
        Ok(())
    }

    /// Drive the feature to the geometry stage appropriate for its kind.
    pub fn parse_geometry(&mut self, scale: i32) -> Result<()> {
        match self.geom_type() {
            GeomType::Point => self.parse_common(),
            GeomType::Line => self.parse_points(scale),
            GeomType::Area => self.parse_triangles(scale),
        }
    }

    /// Roll back the geometry stages (and only those) so a different
    /// scale can be parsed without redoing types and common.
    pub fn reset_geometry(&mut self) {
        self.state.remove(FeatureState::GEOMETRY);
        self.inner_points.clear();
        self.markers.clear();
        self.outer_offsets = [None; MAX_GEOMETRY_SCALES];
        self.first_point = None;
        self.points.clear();
        self.triangles.clear();
        self.geometry_scale = None;
        self.limit_rect = Rect2::empty();
        if let Some(c) = self.center {
            self.limit_rect.extend(c);
        }
    }

    // ---- scale mapping ------------------------------------------------

    // The container scale index used for inner simplification markers.
    fn lod_index(&self, scale: i32) -> usize {
        let n = self.ctx.container.scale_count();
        match scale {
            BEST_GEOMETRY => n - 1,
            WORST_GEOMETRY => 0,
            s => {
                let s = s.min(self.ctx.container.last_scale());
                (0..n)
                    .find(|&i| s <= self.ctx.container.scale(i))
                    .unwrap_or(n - 1)
            }
        }
    }

    // The smallest populated offset slot serving the requested scale.
    fn offset_index(&self, scale: i32) -> Option<usize> {
        let n = self.ctx.container.scale_count();
        let populated = |i: &usize| self.outer_offsets[*i].is_some();
        match scale {
            BEST_GEOMETRY => (0..n).rev().find(populated),
            WORST_GEOMETRY => (0..n).find(populated),
            s => {
                let s = s.min(self.ctx.container.last_scale());
                (0..n).find(|&i| s <= self.ctx.container.scale(i) && self.outer_offsets[i].is_some())
            }
        }
    }

    // ---- side branches: metadata --------------------------------------

    pub fn parse_metadata(&mut self) -> Result<()> {
        if self.state.contains(FeatureState::METADATA) {
            return Ok(());
        }
        if let Some(blob) = self.ctx.container.metadata_blob(self.ctx.feature_id)? {
            match Self::read_meta_blob(blob) {
                Ok(meta) => self.meta = meta,
                Err(e) => {
                    warn!(
                        "feature {}: metadata blob failed to deserialise: {}",
                        self.ctx.feature_id, e
                    );
                    self.meta.clear();
                }
            }
        }
        self.state |= FeatureState::METADATA;
        Ok(())
    }

    fn read_meta_blob(blob: &[u8]) -> Result<SmallVec<[(u8, String); 8]>> {
        let mut out = SmallVec::new();
        let mut stream = StreamReader::new(blob);
        while !stream.at_end() {
            let meta_type = stream.read_u8()?;
            let value = stream.read_string()?;
            out.push((meta_type, value.to_owned()));
        }
        Ok(out)
    }

    pub fn parse_meta_ids(&mut self) -> Result<()> {
        if self.state.contains(FeatureState::META_IDS) {
            return Ok(());
        }
        if let Some(index) = self.ctx.container.meta_index(self.ctx.feature_id)? {
            match Self::read_meta_index(index) {
                Ok(ids) => self.meta_ids = ids,
                Err(e) => {
                    warn!(
                        "feature {}: metadata index failed to deserialise: {}",
                        self.ctx.feature_id, e
                    );
                    self.meta_ids.clear();
                }
            }
        }
        self.state |= FeatureState::META_IDS;
        Ok(())
    }

    fn read_meta_index(index: &[u8]) -> Result<SmallVec<[(u8, u32); 8]>> {
        let mut out = SmallVec::new();
        let mut stream = StreamReader::new(index);
        while !stream.at_end() {
            let meta_type = stream.read_u8()?;
            let record_id = stream.read_varint_u32()?;
            out.push((meta_type, record_id));
        }
        Ok(out)
    }

    /// One metadata value. Prefers materialised metadata; otherwise
    /// searches the compact index and hydrates a single record.
    pub fn metadata(&mut self, meta_type: u8) -> Result<Option<String>> {
        if self.state.contains(FeatureState::METADATA) {
            return Ok(self
                .meta
                .iter()
                .find(|(t, _)| *t == meta_type)
                .map(|(_, v)| v.clone()));
        }
        self.parse_meta_ids()?;
        if let Some(&(_, record_id)) = self.meta_ids.iter().find(|(t, _)| *t == meta_type) {
            return self.ctx.container.meta_record(record_id);
        }
        Ok(None)
    }

    // ---- accessors ----------------------------------------------------

    pub fn types(&self) -> &[FeatureType] {
        &self.types
    }

    pub fn name(&self, lang: u8) -> Option<&'a str> {
        self.names
            .iter()
            .find(|(l, _)| *l == lang)
            .map(|&(_, s)| s)
    }

    pub fn names(&self) -> &[(u8, &'a str)] {
        &self.names
    }

    pub fn layer(&self) -> i8 {
        self.layer
    }

    pub fn house_number(&self) -> Option<&'a str> {
        self.house
    }

    pub fn road_ref(&self) -> Option<&'a str> {
        self.reference
    }

    pub fn rank(&self) -> Option<u8> {
        self.rank
    }

    pub fn center(&self) -> Option<[f64; 2]> {
        self.center
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    pub fn triangles(&self) -> &[[f64; 2]] {
        &self.triangles
    }

    pub fn limit_rect(&self) -> Rect2 {
        self.limit_rect
    }

    pub fn feature_id(&self) -> FeatureId {
        self.ctx.feature_id
    }
}
