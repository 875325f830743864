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
    engine::{EngineContext, TileDescriptor},
    memory_index::MemoryIndex,
    task::ReadTileTask,
    tile_info::TileInfo,
};
use log::{debug, trace};
use mapfile::{Classificator, FeatureSource, MapContainer};
use mercator::{enumerate_tiles, must_reset, TileKey, Viewport};
use std::{collections::BTreeMap, sync::Arc};
use workpool::WorkPool;

/// Everything a reader task needs, shared across the pool.
pub struct ReadEnvironment {
    pub container: Arc<dyn MapContainer>,
    pub classificator: Arc<dyn Classificator>,
    pub source: Arc<dyn FeatureSource>,
    pub engine: Arc<dyn EngineContext>,
    pub memory: MemoryIndex,
}

/// Turns camera movement into tile reads.
///
/// Single-threaded by design: `update` and `stop` run on the render
/// thread. Workers never touch the live set; they only observe their
/// `TileInfo`'s cancellation flag and the shared environment.
pub struct ReadManager {
    env: Arc<ReadEnvironment>,
    pool: WorkPool,
    current: Option<Viewport>,
    live: BTreeMap<TileKey, Arc<TileInfo>>,
}

impl ReadManager {
    pub fn new(env: ReadEnvironment) -> Self {
        Self::with_worker_count(env, WorkPool::default_worker_count())
    }

    pub fn with_worker_count(env: ReadEnvironment, workers: usize) -> Self {
        Self {
            env: Arc::new(env),
            pool: WorkPool::with_workers(workers),
            current: None,
            live: BTreeMap::new(),
        }
    }

    /// Bring the live tile set in line with a new camera position.
    pub fn update(&mut self, viewport: Viewport, descriptor: &mut dyn TileDescriptor) {
        if self.current.as_ref() == Some(&viewport) {
            return;
        }
        let new_tiles = enumerate_tiles(&viewport);

        let reset = self
            .current
            .as_ref()
            .map_or(true, |old| must_reset(old, &viewport));
        if reset {
            debug!(
                "viewport reset: dropping {} live tiles, scheduling {}",
                self.live.len(),
                new_tiles.len()
            );
            for info in self.live.values() {
                info.cancel();
            }
            self.live.clear();
            descriptor.drop_all();
            for &key in &new_tiles {
                self.enqueue_back(key);
            }
        } else {
            let outdated: Vec<TileKey> = self
                .live
                .keys()
                .filter(|key| !new_tiles.contains(key))
                .copied()
                .collect();
            debug!(
                "viewport pan: {} outdated, {} incoming, {} surviving",
                outdated.len(),
                new_tiles.len() - (self.live.len() - outdated.len()),
                self.live.len() - outdated.len()
            );
            for key in &outdated {
                if let Some(info) = self.live.remove(key) {
                    info.cancel();
                }
            }
            if !outdated.is_empty() {
                descriptor.drop_tiles(&outdated);
            }

            // Survivors jump the queue so in-view tiles are refreshed
            // before any tile the new viewport pulled in. The original
            // task is not cancelled; the engine deduplicates on
            // (TileKey, FeatureId).
            for info in self.live.values() {
                trace!("tile {}: re-prioritised", info.key());
                let task = ReadTileTask::new(info.clone(), self.env.clone());
                self.pool.push_front(Box::new(move || task.run()));
            }

            let incoming: Vec<TileKey> = new_tiles
                .iter()
                .filter(|key| !self.live.contains_key(key))
                .copied()
                .collect();
            for key in incoming {
                self.enqueue_back(key);
            }
        }

        self.current = Some(viewport);
    }

    /// Cancel everything and join the workers, discarding queued reads.
    pub fn stop(&mut self) {
        debug!("read manager stopping; {} tiles live", self.live.len());
        for info in self.live.values() {
            info.cancel();
        }
        self.live.clear();
        self.current = None;
        self.pool.stop();
    }

    pub fn live_keys(&self) -> Vec<TileKey> {
        self.live.keys().copied().collect()
    }

    fn enqueue_back(&mut self, key: TileKey) {
        let info = Arc::new(TileInfo::new(key));
        self.live.insert(key, info.clone());
        let task = ReadTileTask::new(info, self.env.clone());
        self.pool.push_back(Box::new(move || task.run()));
        trace!("tile {}: queued", key);
    }
}

impl Drop for ReadManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DecodedFeature;
    use anyhow::Result;
    use feature::encode::FeatureBuilder;
    use mapfile::{
        FeatureId, FeatureType, MemoryContainer, MemoryFeatureSource, TableClassificator,
    };
    use mercator::{cell_size, Rect2};
    use parking_lot::Mutex;
    use std::{
        collections::BTreeSet,
        sync::{
            atomic::{AtomicBool, Ordering},
            mpsc,
        },
    };

    const SCALES: &[i32] = &[5, 10, 14, 17];

    #[derive(Default)]
    struct Recorder {
        drop_alls: usize,
        dropped: Vec<TileKey>,
    }

    impl TileDescriptor for Recorder {
        fn drop_all(&mut self) {
            self.drop_alls += 1;
        }

        fn drop_tiles(&mut self, keys: &[TileKey]) {
            self.dropped.extend_from_slice(keys);
        }
    }

    #[derive(Default)]
    struct CountingEngine {
        appends: Mutex<Vec<(TileKey, FeatureId)>>,
        notify: Mutex<Option<mpsc::Sender<(TileKey, FeatureId)>>>,
    }

    impl CountingEngine {
        // Tests that assert on delivered features wait on the receiver:
        // stop() discards queued routines, so only deliveries observed
        // through the channel are guaranteed to have happened.
        fn with_notify() -> (Arc<Self>, mpsc::Receiver<(TileKey, FeatureId)>) {
            let (tx, rx) = mpsc::channel();
            let engine = Arc::new(Self::default());
            *engine.notify.lock() = Some(tx);
            (engine, rx)
        }
    }

    impl EngineContext for CountingEngine {
        fn append_feature(&self, key: TileKey, feature: DecodedFeature) {
            self.appends.lock().push((key, feature.id));
            if let Some(tx) = &*self.notify.lock() {
                tx.send((key, feature.id)).ok();
            }
        }
    }

    // A source whose first for_each call parks on a gate, so tests can
    // cancel a tile while its read is in flight.
    struct GatedSource {
        entered: Mutex<mpsc::Sender<()>>,
        gate: Mutex<mpsc::Receiver<()>>,
        first: AtomicBool,
        record: Vec<u8>,
    }

    impl FeatureSource for GatedSource {
        fn for_each(
            &self,
            _rect: &Rect2,
            _scale: i8,
            callback: &mut dyn FnMut(FeatureId, &[u8]) -> Result<()>,
        ) -> Result<()> {
            if self.first.swap(false, Ordering::SeqCst) {
                self.entered.lock().send(()).ok();
                self.gate.lock().recv().ok();
            }
            callback(1, &self.record)
        }
    }

    fn world_point_record(container: &mut MemoryContainer) -> Vec<u8> {
        FeatureBuilder::point([0.1, 0.1])
            .with_type(1)
            .build(container)
            .unwrap()
    }

    fn environment(engine: Arc<CountingEngine>) -> (ReadEnvironment, MemoryIndex) {
        let mut container = MemoryContainer::new(SCALES);
        let record = world_point_record(&mut container);
        let mut source = MemoryFeatureSource::default();
        source.add(1, Rect2::world(), record);
        let memory = MemoryIndex::new();
        (
            ReadEnvironment {
                container: Arc::new(container),
                classificator: Arc::new(TableClassificator::new(64, FeatureType(0))),
                source: Arc::new(source),
                engine,
                memory: memory.clone(),
            },
            memory,
        )
    }

    fn viewport_at(center: [f64; 2], z: i8) -> Viewport {
        // Sized so mercator's scale selection lands exactly on z.
        let half = cell_size(z) * 2.;
        Viewport::new(center, [half, half], 0.)
    }

    #[test]
    fn test_first_update_resets_and_schedules_everything() {
        let engine = Arc::new(CountingEngine::default());
        let (env, _memory) = environment(engine.clone());
        let mut manager = ReadManager::with_worker_count(env, 1);
        let mut recorder = Recorder::default();

        let v = viewport_at([0., 0.], 10);
        manager.update(v, &mut recorder);
        assert_eq!(recorder.drop_alls, 1);
        assert!(recorder.dropped.is_empty());

        let expected: Vec<TileKey> = enumerate_tiles(&v).into_iter().collect();
        assert_eq!(manager.live_keys(), expected);

        manager.stop();
    }

    #[test]
    fn test_noop_update_has_no_side_effects() {
        let engine = Arc::new(CountingEngine::default());
        let (env, _memory) = environment(engine);
        let mut manager = ReadManager::with_worker_count(env, 1);
        let mut recorder = Recorder::default();

        let v = viewport_at([0., 0.], 10);
        manager.update(v, &mut recorder);
        let live = manager.live_keys();
        manager.update(v, &mut recorder);
        assert_eq!(recorder.drop_alls, 1);
        assert!(recorder.dropped.is_empty());
        assert_eq!(manager.live_keys(), live);
    }

    #[test]
    fn test_pan_cancels_exactly_the_difference() {
        let engine = Arc::new(CountingEngine::default());
        let (env, _memory) = environment(engine);
        let mut manager = ReadManager::with_worker_count(env, 1);
        let mut recorder = Recorder::default();

        let v1 = viewport_at([0., 0.], 10);
        let v2 = viewport_at([cell_size(10), 0.], 10);
        assert!(!must_reset(&v1, &v2));

        manager.update(v1, &mut recorder);
        let set1 = enumerate_tiles(&v1);
        let set2 = enumerate_tiles(&v2);
        manager.update(v2, &mut recorder);

        let mut expected_dropped: Vec<TileKey> =
            set1.difference(&set2).copied().collect();
        expected_dropped.sort();
        let mut dropped = recorder.dropped.clone();
        dropped.sort();
        assert_eq!(dropped, expected_dropped);
        assert_eq!(recorder.drop_alls, 1);

        let expected_live: Vec<TileKey> = set2.into_iter().collect();
        assert_eq!(manager.live_keys(), expected_live);
    }

    #[test]
    fn test_zoom_change_takes_the_reset_path() {
        let engine = Arc::new(CountingEngine::default());
        let (env, _memory) = environment(engine);
        let mut manager = ReadManager::with_worker_count(env, 1);
        let mut recorder = Recorder::default();

        let v1 = viewport_at([0., 0.], 10);
        let v2 = viewport_at([0., 0.], 11);
        assert!(must_reset(&v1, &v2));

        manager.update(v1, &mut recorder);
        manager.update(v2, &mut recorder);
        assert_eq!(recorder.drop_alls, 2);
        assert!(recorder.dropped.is_empty());

        let expected: Vec<TileKey> = enumerate_tiles(&v2).into_iter().collect();
        assert_eq!(manager.live_keys(), expected);
        assert!(expected.iter().all(|k| k.z() == 11));
    }

    #[test]
    fn test_live_set_is_always_a_subset_of_enumeration() {
        let engine = Arc::new(CountingEngine::default());
        let (env, _memory) = environment(engine);
        let mut manager = ReadManager::with_worker_count(env, 1);
        let mut recorder = Recorder::default();

        let moves = [
            viewport_at([0., 0.], 10),
            viewport_at([cell_size(10) / 2., 0.], 10),
            viewport_at([0., 0.], 12),
            viewport_at([50., 50.], 12),
        ];
        for v in moves {
            manager.update(v, &mut recorder);
            let allowed = enumerate_tiles(&v);
            for key in manager.live_keys() {
                assert!(allowed.contains(&key));
            }
        }
    }

    #[test]
    fn test_survivors_are_read_again() {
        let (engine, appended) = CountingEngine::with_notify();
        let (env, _memory) = environment(engine.clone());
        let mut manager = ReadManager::with_worker_count(env, 1);
        let mut recorder = Recorder::default();

        let v1 = viewport_at([0., 0.], 10);
        let v2 = viewport_at([cell_size(10), 0.], 10);
        manager.update(v1, &mut recorder);
        manager.update(v2, &mut recorder);

        let set1 = enumerate_tiles(&v1);
        let set2 = enumerate_tiles(&v2);
        let survivor = *set1.intersection(&set2).next().expect("viewports overlap");

        // The survivor's original task and its front-inserted refresh
        // are never cancelled; wait for both deliveries before stopping,
        // since stop() throws away whatever is still queued.
        let mut deliveries = 0;
        while deliveries < 2 {
            let (key, _) = appended.recv().unwrap();
            if key == survivor {
                deliveries += 1;
            }
        }
        manager.stop();

        let appends = engine.appends.lock();
        let count = appends.iter().filter(|(k, _)| *k == survivor).count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_corrupt_feature_is_skipped_not_fatal() {
        let (engine, appended) = CountingEngine::with_notify();
        let mut container = MemoryContainer::new(SCALES);
        let good = world_point_record(&mut container);
        let mut source = MemoryFeatureSource::default();
        // Reserved geometry kind: the decoder rejects the record, the
        // tile keeps going.
        source.add(9, Rect2::world(), vec![0b0000_0011]);
        source.add(1, Rect2::world(), good);
        let env = ReadEnvironment {
            container: Arc::new(container),
            classificator: Arc::new(TableClassificator::new(64, FeatureType(0))),
            source: Arc::new(source),
            engine: engine.clone(),
            memory: MemoryIndex::new(),
        };
        let mut manager = ReadManager::with_worker_count(env, 1);
        let mut recorder = Recorder::default();

        let v = viewport_at([0., 0.], 10);
        manager.update(v, &mut recorder);
        let live = manager.live_keys();

        // Every tile still delivers its good feature; wait for each one
        // so stop() cannot discard a task that has not run yet.
        let mut remaining: BTreeSet<TileKey> = live.iter().copied().collect();
        while !remaining.is_empty() {
            let (key, id) = appended.recv().unwrap();
            assert_eq!(id, 1);
            remaining.remove(&key);
        }
        manager.stop();

        let appends = engine.appends.lock();
        assert!(appends.iter().all(|&(_, id)| id == 1));
        for key in live {
            assert!(appends.iter().any(|&(k, id)| k == key && id == 1));
        }
    }

    #[test]
    fn test_cancellation_mid_read_releases_ticket_and_appends_nothing() {
        let _ = env_logger::builder().is_test(true).try_init();

        let engine = Arc::new(CountingEngine::default());
        let mut container = MemoryContainer::new(SCALES);
        let record = world_point_record(&mut container);
        let (entered_tx, entered_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel();
        let source = GatedSource {
            entered: Mutex::new(entered_tx),
            gate: Mutex::new(gate_rx),
            first: AtomicBool::new(true),
            record,
        };
        let memory = MemoryIndex::new();
        let env = ReadEnvironment {
            container: Arc::new(container),
            classificator: Arc::new(TableClassificator::new(64, FeatureType(0))),
            source: Arc::new(source),
            engine: engine.clone(),
            memory: memory.clone(),
        };
        let mut manager = ReadManager::with_worker_count(env, 1);
        let mut recorder = Recorder::default();

        let v1 = viewport_at([0., 0.], 10);
        manager.update(v1, &mut recorder);
        entered_rx.recv().unwrap();
        assert_eq!(memory.held_tickets(), 1);
        let gated_key = manager.live_keys()[0];

        // Jump far away: everything from v1 is cancelled while the first
        // tile's read is parked inside the feature source.
        let v2 = viewport_at([90., 90.], 10);
        assert!(must_reset(&v1, &v2));
        manager.update(v2, &mut recorder);
        gate_tx.send(()).unwrap();

        manager.stop();
        assert_eq!(memory.held_tickets(), 0);
        let appends = engine.appends.lock();
        assert!(appends.iter().all(|(k, _)| *k != gated_key));
    }
}
