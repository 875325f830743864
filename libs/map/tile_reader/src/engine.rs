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
use mapfile::{FeatureId, FeatureType};
use mercator::{Rect2, TileKey};
use smallvec::SmallVec;

/// A feature as handed to the rendering engine: classified, named, and
/// carrying geometry at the tile's scale.
#[derive(Clone, Debug)]
pub struct DecodedFeature {
    pub id: FeatureId,
    pub types: SmallVec<[FeatureType; 8]>,
    pub names: Vec<(u8, String)>,
    pub layer: i8,
    pub rank: Option<u8>,
    pub center: Option<[f64; 2]>,
    pub points: Vec<[f64; 2]>,
    pub triangles: Vec<[f64; 2]>,
    pub limit_rect: Rect2,
}

/// The downstream consumer of decoded features.
///
/// Appends happen concurrently from worker threads; implementations
/// serialise internally. Delivery must be idempotent per
/// `(TileKey, FeatureId)`: survivor re-prioritisation can run two
/// readers for the same tile at once, and late arrivals from cancelled
/// readers must be filtered against the engine's own liveness map.
pub trait EngineContext: Send + Sync {
    fn append_feature(&self, key: TileKey, feature: DecodedFeature);
}

/// The engine-side bookkeeping for tile artefacts. Driven only from the
/// manager's control thread.
pub trait TileDescriptor {
    fn drop_all(&mut self);
    fn drop_tiles(&mut self, keys: &[TileKey]);
}
