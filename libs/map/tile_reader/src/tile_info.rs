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
use mercator::TileKey;
use std::sync::atomic::{AtomicBool, Ordering};

/// The shared handle for one tile's in-flight read. The manager's live
/// set holds one `Arc` per key; every queued reader task holds another.
/// The cancellation flag is one-shot: once set it is never cleared, and
/// readers poll it cooperatively from worker threads.
#[derive(Debug)]
pub struct TileInfo {
    key: TileKey,
    cancelled: AtomicBool,
}

impl TileInfo {
    pub fn new(key: TileKey) -> Self {
        Self {
            key,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
