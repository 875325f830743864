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
use crate::{engine::DecodedFeature, manager::ReadEnvironment, tile_info::TileInfo};
use anyhow::{anyhow, Result};
use feature::{LoadContext, ParsedFeature};
use log::{trace, warn};
use mapfile::FeatureId;
use std::sync::Arc;

// Cooperative-cancellation marker: distinguishes "the tile went stale"
// from a real read failure when for_each returns early.
const CANCELLED: &str = "tile read cancelled";

/// One run over one tile: pull every feature record overlapping the
/// tile's rectangle, decode it at the tile's scale, and hand it to the
/// engine. Cancellation is checked before each feature and between
/// decode stages; an in-progress byte read always finishes first.
pub(crate) struct ReadTileTask {
    info: Arc<TileInfo>,
    env: Arc<ReadEnvironment>,
}

impl ReadTileTask {
    pub(crate) fn new(info: Arc<TileInfo>, env: Arc<ReadEnvironment>) -> Self {
        Self { info, env }
    }

    pub(crate) fn run(self) {
        let key = self.info.key();
        let _ticket = self.env.memory.acquire(key);
        if self.info.is_cancelled() {
            trace!("tile {}: cancelled before start", key);
            return;
        }

        let rect = key.rect();
        let result = self.env.source.for_each(&rect, key.z(), &mut |id, record| {
            if self.info.is_cancelled() {
                return Err(anyhow!(CANCELLED));
            }
            match self.decode(id, record) {
                Ok(Some(feature)) => self.env.engine.append_feature(key, feature),
                Ok(None) => return Err(anyhow!(CANCELLED)),
                Err(e) => warn!("tile {}: feature {} skipped: {:#}", key, id, e),
            }
            Ok(())
        });

        match result {
            Ok(()) => trace!("tile {}: read complete", key),
            Err(_) if self.info.is_cancelled() => {
                trace!("tile {}: cancelled mid-read", key);
            }
            // An I/O failure aborts the tile; no retry. The next
            // viewport pass re-enqueues it if it is still visible.
            Err(e) => warn!("tile {}: read aborted: {:#}", key, e),
        }
    }

    // Ok(None) means the tile was cancelled between decode stages.
    fn decode(&self, id: FeatureId, record: &[u8]) -> Result<Option<DecodedFeature>> {
        let ctx = LoadContext {
            container: &*self.env.container,
            classificator: &*self.env.classificator,
            feature_id: id,
        };
        let mut parsed = ParsedFeature::new(record, ctx)?;
        parsed.parse_common()?;
        if self.info.is_cancelled() {
            return Ok(None);
        }
        parsed.parse_geometry(i32::from(self.info.key().z()))?;
        if self.info.is_cancelled() {
            return Ok(None);
        }

        Ok(Some(DecodedFeature {
            id,
            types: parsed.types().iter().copied().collect(),
            names: parsed
                .names()
                .iter()
                .map(|&(lang, s)| (lang, s.to_owned()))
                .collect(),
            layer: parsed.layer(),
            rank: parsed.rank(),
            center: parsed.center(),
            points: parsed.points().to_vec(),
            triangles: parsed.triangles().to_vec(),
            limit_rect: parsed.limit_rect(),
        }))
    }
}
