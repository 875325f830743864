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

// In-memory container implementations. These back the workspace's tests
// and the generator tooling; a production mmap-backed container
// implements the same traits.

use crate::{
    coding::GeometryCodingParams,
    container::{Classificator, FeatureId, FeatureSource, FeatureType, MapContainer,
        MAX_GEOMETRY_SCALES},
};
use anyhow::{ensure, Result};
use fxhash::FxHashMap;
use mercator::Rect2;

pub struct MemoryContainer {
    params: GeometryCodingParams,
    scales: Vec<i32>,
    geometry: Vec<Vec<u8>>,
    triangles: Vec<Vec<u8>>,
    metadata: FxHashMap<FeatureId, Vec<u8>>,
    meta_ids: FxHashMap<FeatureId, Vec<u8>>,
    meta_records: FxHashMap<u32, String>,
}

impl MemoryContainer {
    pub fn new(scales: &[i32]) -> Self {
        assert!(!scales.is_empty() && scales.len() <= MAX_GEOMETRY_SCALES);
        assert!(scales.windows(2).all(|w| w[0] < w[1]));
        Self {
            params: GeometryCodingParams::centered(),
            scales: scales.to_vec(),
            geometry: vec![Vec::new(); scales.len()],
            triangles: vec![Vec::new(); scales.len()],
            metadata: FxHashMap::default(),
            meta_ids: FxHashMap::default(),
            meta_records: FxHashMap::default(),
        }
    }

    /// Append bytes to a per-scale geometry stream; returns the offset
    /// a feature record should store.
    pub fn append_geometry(&mut self, index: usize, bytes: &[u8]) -> u32 {
        let offset = self.geometry[index].len() as u32;
        self.geometry[index].extend_from_slice(bytes);
        offset
    }

    pub fn append_triangles(&mut self, index: usize, bytes: &[u8]) -> u32 {
        let offset = self.triangles[index].len() as u32;
        self.triangles[index].extend_from_slice(bytes);
        offset
    }

    pub fn set_metadata(&mut self, id: FeatureId, blob: Vec<u8>) {
        self.metadata.insert(id, blob);
    }

    pub fn set_meta_index(&mut self, id: FeatureId, index: Vec<u8>) {
        self.meta_ids.insert(id, index);
    }

    pub fn set_meta_record(&mut self, record_id: u32, value: &str) {
        self.meta_records.insert(record_id, value.to_owned());
    }
}

impl MapContainer for MemoryContainer {
    fn coding_params(&self) -> GeometryCodingParams {
        self.params
    }

    fn scale_count(&self) -> usize {
        self.scales.len()
    }

    fn scale(&self, index: usize) -> i32 {
        self.scales[index]
    }

    fn geometry_section(&self, index: usize) -> Result<&[u8]> {
        ensure!(index < self.geometry.len(), "no geometry at scale index {}", index);
        Ok(&self.geometry[index])
    }

    fn triangle_section(&self, index: usize) -> Result<&[u8]> {
        ensure!(index < self.triangles.len(), "no triangles at scale index {}", index);
        Ok(&self.triangles[index])
    }

    fn metadata_blob(&self, id: FeatureId) -> Result<Option<&[u8]>> {
        Ok(self.metadata.get(&id).map(|v| v.as_slice()))
    }

    fn meta_index(&self, id: FeatureId) -> Result<Option<&[u8]>> {
        Ok(self.meta_ids.get(&id).map(|v| v.as_slice()))
    }

    fn meta_record(&self, record_id: u32) -> Result<Option<String>> {
        Ok(self.meta_records.get(&record_id).cloned())
    }
}

/// A classificator over a flat index table.
pub struct TableClassificator {
    count: u32,
    stub: FeatureType,
}

impl TableClassificator {
    /// Resolves indices `0..count`; everything else maps to the stub.
    pub fn new(count: u32, stub: FeatureType) -> Self {
        Self { count, stub }
    }
}

impl Classificator for TableClassificator {
    fn resolve(&self, index: u32) -> Option<FeatureType> {
        (index < self.count).then(|| FeatureType(index))
    }

    fn stub(&self) -> FeatureType {
        self.stub
    }
}

/// A feature source over an in-memory list of records with precomputed
/// limit rects.
#[derive(Default)]
pub struct MemoryFeatureSource {
    records: Vec<(FeatureId, Rect2, Vec<u8>)>,
}

impl MemoryFeatureSource {
    pub fn add(&mut self, id: FeatureId, limit_rect: Rect2, record: Vec<u8>) {
        self.records.push((id, limit_rect, record));
    }
}

impl FeatureSource for MemoryFeatureSource {
    fn for_each(
        &self,
        rect: &Rect2,
        _scale: i8,
        callback: &mut dyn FnMut(FeatureId, &[u8]) -> Result<()>,
    ) -> Result<()> {
        for (id, limit_rect, record) in &self.records {
            if limit_rect.overlaps(rect) {
                callback(*id, record)?;
            }
        }
        Ok(())
    }
}
