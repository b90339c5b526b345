//! Minimal thread-state hooks (component J).
//!
//! Full thread and monitor semantics — scheduling, `synchronized` monitors, exception
//! propagation across frames — are out of scope for this crate. What the trampoline
//! and per-class/per-method locking protocol (§5) needs from "threads" is narrow: a
//! registry of live threads, and a per-thread interrupt/park flag a blocked compiler
//! or caller thread can be woken from. This models that much and no more, using a 1:1
//! OS-thread model (one [`ThreadHandle`] per native thread).

use ahash::AHashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParkState {
    Running,
    Parked,
    Interrupted,
}

/// Per-thread park/interrupt state, guarded by its own mutex and condvar so parking
/// one thread never contends with another thread's compile or init lock.
#[derive(Debug)]
pub struct ThreadHandle {
    pub id: u64,
    state: Mutex<ParkState>,
    condvar: Condvar,
}

impl ThreadHandle {
    #[must_use]
    fn new(id: u64) -> Self {
        ThreadHandle { id, state: Mutex::new(ParkState::Running), condvar: Condvar::new() }
    }

    /// Blocks the calling thread until [`Self::unpark`] or [`Self::interrupt`] is
    /// called on this handle.
    pub fn park(&self) {
        let mut state = self.state.lock();
        if *state == ParkState::Interrupted {
            *state = ParkState::Running;
            return;
        }
        *state = ParkState::Parked;
        while *state == ParkState::Parked {
            self.condvar.wait(&mut state);
        }
        *state = ParkState::Running;
    }

    pub fn unpark(&self) {
        let mut state = self.state.lock();
        if *state == ParkState::Parked {
            *state = ParkState::Running;
            self.condvar.notify_one();
        }
    }

    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        *state = ParkState::Interrupted;
        self.condvar.notify_one();
    }
}

/// Registry of every live thread, keyed by an opaque id the embedder assigns.
#[derive(Debug, Default)]
pub struct ThreadTable {
    threads: Mutex<AHashMap<u64, Arc<ThreadHandle>>>,
    next_id: AtomicU64,
}

impl ThreadTable {
    #[must_use]
    pub fn new() -> Self {
        ThreadTable::default()
    }

    /// Registers a new thread and returns its handle.
    pub fn spawn(&self) -> Arc<ThreadHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(ThreadHandle::new(id));
        self.threads.lock().insert(id, Arc::clone(&handle));
        handle
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<Arc<ThreadHandle>> {
        self.threads.lock().get(&id).cloned()
    }

    pub fn unregister(&self, id: u64) {
        self.threads.lock().remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_spawn_and_lookup() {
        let table = ThreadTable::new();
        let handle = table.spawn();
        assert!(table.get(handle.id).is_some());
        table.unregister(handle.id);
        assert!(table.get(handle.id).is_none());
    }

    #[test]
    fn test_unpark_wakes_parked_thread() {
        let table = ThreadTable::new();
        let handle = table.spawn();
        let waiter = Arc::clone(&handle);
        let join = thread::spawn(move || waiter.park());
        thread::sleep(Duration::from_millis(20));
        handle.unpark();
        join.join().expect("joined");
    }

    #[test]
    fn test_interrupt_before_park_does_not_block() {
        let table = ThreadTable::new();
        let handle = table.spawn();
        handle.interrupt();
        handle.park();
    }
}
