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
use crate::coding::GeometryCodingParams;
use anyhow::Result;
use mercator::Rect2;

/// Container-local feature identity. Unique within one container; the
/// engine keys idempotent delivery on `(TileKey, FeatureId)`.
pub type FeatureId = u32;

/// A resolved classificator type.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FeatureType(pub u32);

/// The wire format stores outer-geometry presence as a 4-bit mask, so a
/// container exposes at most four per-scale geometry streams through
/// this interface regardless of how many physical scales it keeps.
pub const MAX_GEOMETRY_SCALES: usize = 4;

/// The catalogue mapping stored type indices to typed identifiers. An
/// index the catalogue cannot resolve is replaced by the stub type.
pub trait Classificator: Send + Sync {
    fn resolve(&self, index: u32) -> Option<FeatureType>;
    fn stub(&self) -> FeatureType;
}

/// Read access to one on-disk map container.
///
/// `scale(i)` values ascend with `i`; `last_scale` clamps oversized
/// scale requests (coastline layers ask for scales past the ladder).
/// Section accessors return whole in-memory byte sections; offsets
/// stored in feature records index into them.
pub trait MapContainer: Send + Sync {
    fn coding_params(&self) -> GeometryCodingParams;

    fn scale_count(&self) -> usize;
    fn scale(&self, index: usize) -> i32;
    fn last_scale(&self) -> i32 {
        self.scale(self.scale_count() - 1)
    }

    fn geometry_section(&self, index: usize) -> Result<&[u8]>;
    fn triangle_section(&self, index: usize) -> Result<&[u8]>;

    /// The feature's full metadata blob, if it has one.
    fn metadata_blob(&self, id: FeatureId) -> Result<Option<&[u8]>>;
    /// The feature's compact `(type, recordId)` metadata index.
    fn meta_index(&self, id: FeatureId) -> Result<Option<&[u8]>>;
    /// Hydrate a single metadata record by id.
    fn meta_record(&self, record_id: u32) -> Result<Option<String>>;
}

/// The spatial index handing out feature records. Yields every feature
/// whose limit rect intersects `rect` at the given scale, in storage
/// order.
pub trait FeatureSource: Send + Sync {
    fn for_each(
        &self,
        rect: &Rect2,
        scale: i8,
        callback: &mut dyn FnMut(FeatureId, &[u8]) -> Result<()>,
    ) -> Result<()>;
}
