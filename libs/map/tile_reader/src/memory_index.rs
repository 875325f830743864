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
use fxhash::FxHashMap;
use mercator::TileKey;
use parking_lot::Mutex;
use std::sync::Arc;

/// The shared memory-pressure index. Reader tasks take a ticket per tile
/// at task start; dropping the ticket returns the tile's share, so both
/// the completion and the cancellation paths release without extra
/// bookkeeping.
#[derive(Clone, Default)]
pub struct MemoryIndex {
    tickets: Arc<Mutex<FxHashMap<TileKey, usize>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, key: TileKey) -> MemoryTicket {
        *self.tickets.lock().entry(key).or_insert(0) += 1;
        MemoryTicket {
            index: self.clone(),
            key,
        }
    }

    /// Outstanding tickets across all tiles.
    pub fn held_tickets(&self) -> usize {
        self.tickets.lock().values().sum()
    }

    fn release(&self, key: TileKey) {
        let mut tickets = self.tickets.lock();
        match tickets.get_mut(&key) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                tickets.remove(&key);
            }
            None => debug_assert!(false, "ticket released twice for {}", key),
        }
    }
}

pub struct MemoryTicket {
    index: MemoryIndex,
    key: TileKey,
}

impl Drop for MemoryTicket {
    fn drop(&mut self) {
        self.index.release(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_release_on_drop() {
        let index = MemoryIndex::new();
        let key = TileKey::new(0, 0, 10);
        let a = index.acquire(key);
        let b = index.acquire(key);
        assert_eq!(index.held_tickets(), 2);
        drop(a);
        assert_eq!(index.held_tickets(), 1);
        drop(b);
        assert_eq!(index.held_tickets(), 0);
    }
}
