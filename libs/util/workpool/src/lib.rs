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
use log::trace;
use parking_lot::{Condvar, Mutex};
use std::{collections::VecDeque, sync::Arc, thread};

/// A unit of work. The pool runs it once and drops it.
pub type Routine = Box<dyn FnOnce() + Send + 'static>;

// A fixed set of worker threads draining a double-ended queue. This is
// not a priority queue: push_front means "run next", push_back means
// "run after everything already queued", and relative order within each
// end is preserved. Insertion and pop share the one queue lock.
pub struct WorkPool {
    inner: Arc<Inner>,
    workers: Vec<thread::JoinHandle<()>>,
}

struct Inner {
    state: Mutex<QueueState>,
    available: Condvar,
}

struct QueueState {
    queue: VecDeque<Routine>,
    shutdown: bool,
}

impl WorkPool {
    /// The worker count used by the read manager: leave two cores for the
    /// render and UI threads, but always keep at least one worker.
    pub fn default_worker_count() -> usize {
        num_cpus::get().saturating_sub(2).max(1)
    }

    pub fn with_workers(count: usize) -> Self {
        assert!(count > 0);
        let inner = Arc::new(Inner {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        });
        let workers = (0..count)
            .map(|n| {
                let inner = inner.clone();
                thread::Builder::new()
                    .name(format!("workpool-{}", n))
                    .spawn(move || worker_main(&inner))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self { inner, workers }
    }

    pub fn push_back(&self, routine: Routine) {
        let mut state = self.inner.state.lock();
        state.queue.push_back(routine);
        self.inner.available.notify_one();
    }

    pub fn push_front(&self, routine: Routine) {
        let mut state = self.inner.state.lock();
        state.queue.push_front(routine);
        self.inner.available.notify_one();
    }

    pub fn queued_count(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Discard all queued routines and join the workers. Routines already
    /// running finish first; nothing else starts.
    pub fn stop(&mut self) {
        {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
            let dropped = state.queue.len();
            state.queue.clear();
            if dropped > 0 {
                trace!("workpool: dropping {} queued routines", dropped);
            }
        }
        self.inner.available.notify_all();
        for worker in self.workers.drain(..) {
            worker.join().ok();
        }
    }
}

impl Drop for WorkPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_main(inner: &Inner) {
    loop {
        let routine = {
            let mut state = inner.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(routine) = state.queue.pop_front() {
                    break routine;
                }
                inner.available.wait(&mut state);
            }
        };
        routine();
    }
}
