//! Shared trajectory pool.
//!
//! Key characteristics:
//! - Many actors append concurrently (lock-free injection)
//! - A single learner consumes from the head (FIFO)
//! - Pending items are consolidated into ordered storage before every read,
//!   so arrival order is preserved and nothing is read twice
//!
//! # Data Flow
//!
//! ```text
//! Actor 0 ─┐
//! Actor 1 ─┼──> Injector (lock-free) ──> consolidate ──> Vec storage
//! Actor N ─┘                                                 │
//!                                                            v
//!                                                         Learner
//!                                                  (take_prefix / sample)
//! ```

use crossbeam_deque::{Injector, Steal};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

/// Append-only pool of trajectories shared between actors and the learner.
pub struct TrajectoryPool<T> {
    /// Actors push here (lock-free MPSC)
    injector: Injector<T>,
    /// Consolidated storage, oldest first
    storage: RwLock<Vec<T>>,
    /// Storage size (atomic for lock-free queries)
    size: AtomicUsize,
    /// Published items minus removed items. Goes briefly negative when a
    /// removal overtakes the count of an item it removed.
    total: AtomicIsize,
}

impl<T> TrajectoryPool<T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            injector: Injector::new(),
            storage: RwLock::new(Vec::new()),
            size: AtomicUsize::new(0),
            total: AtomicIsize::new(0),
        }
    }

    /// Append a trajectory at the tail (non-blocking).
    pub fn push(&self, trajectory: T) {
        // Publish first so len() never counts an item a reader can't see.
        self.injector.push(trajectory);
        self.total.fetch_add(1, Ordering::AcqRel);
    }

    /// Append several trajectories, keeping their order.
    pub fn push_batch(&self, trajectories: Vec<T>) {
        for trajectory in trajectories {
            self.push(trajectory);
        }
    }

    /// Move pending items from the injector into storage.
    ///
    /// Returns the number of items moved.
    pub fn consolidate(&self) -> usize {
        let mut storage = self.storage.write();
        self.consolidate_locked(&mut storage)
    }

    fn consolidate_locked(&self, storage: &mut Vec<T>) -> usize {
        let mut count = 0;
        loop {
            match self.injector.steal() {
                Steal::Success(item) => {
                    storage.push(item);
                    count += 1;
                }
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        self.size.store(storage.len(), Ordering::Release);
        count
    }

    fn record_removed(&self, removed: usize) {
        if removed > 0 {
            self.total.fetch_sub(removed as isize, Ordering::AcqRel);
        }
    }

    /// Atomically remove and return the first `n` trajectories.
    ///
    /// Returns fewer than `n` when the pool holds fewer items. The remaining
    /// items keep their order.
    pub fn take_prefix(&self, n: usize) -> Vec<T> {
        let mut storage = self.storage.write();
        self.consolidate_locked(&mut storage);

        let n = n.min(storage.len());
        let taken: Vec<T> = storage.drain(..n).collect();
        self.size.store(storage.len(), Ordering::Release);
        self.record_removed(taken.len());
        taken
    }

    /// Run `f` with exclusive access to the consolidated storage.
    ///
    /// Used by the sampler for in-place shuffles, trims and removals. `f`
    /// sees every item published before the call; appends made by actors
    /// while `f` runs stay in the injector until the next read. `f` must
    /// not insert items.
    pub(crate) fn with_storage<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        let mut storage = self.storage.write();
        self.consolidate_locked(&mut storage);
        let before = storage.len();
        let result = f(&mut storage);
        self.size.store(storage.len(), Ordering::Release);
        self.record_removed(before.saturating_sub(storage.len()));
        result
    }

    /// Total number of trajectories (consolidated + pending).
    ///
    /// Never exceeds what a subsequent read can see. It may briefly lag
    /// behind an append that is still in flight.
    pub fn len(&self) -> usize {
        self.total.load(Ordering::Acquire).max(0) as usize
    }

    /// Number of trajectories pushed but not yet consolidated.
    pub fn pending_len(&self) -> usize {
        self.len().saturating_sub(self.size.load(Ordering::Acquire))
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every trajectory, pending ones included.
    pub fn clear(&self) {
        let mut storage = self.storage.write();
        self.consolidate_locked(&mut storage);
        let removed = storage.len();
        storage.clear();
        self.size.store(0, Ordering::Release);
        self.record_removed(removed);
    }
}

#[cfg(test)]
impl<T> TrajectoryPool<T> {
    /// Publish an item without counting it, as a producer preempted inside
    /// `push` would leave it.
    pub(crate) fn push_uncounted(&self, trajectory: T) {
        self.injector.push(trajectory);
    }
}

impl<T: Clone> TrajectoryPool<T> {
    /// Clone every trajectory currently in the pool, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        let mut storage = self.storage.write();
        self.consolidate_locked(&mut storage);
        storage.clone()
    }
}

impl<T> Default for TrajectoryPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe shared pool.
pub type SharedTrajectoryPool<T> = Arc<TrajectoryPool<T>>;

/// Create a new shared pool.
pub fn trajectory_pool<T>() -> SharedTrajectoryPool<T> {
    Arc::new(TrajectoryPool::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_pool_new() {
        let pool: TrajectoryPool<u32> = TrajectoryPool::new();
        assert!(pool.is_empty());
        assert_eq!(pool.pending_len(), 0);
    }

    #[test]
    fn test_push_counts_pending() {
        let pool = TrajectoryPool::new();
        pool.push(1u32);
        pool.push(2u32);
        assert_eq!(pool.pending_len(), 2);
        assert_eq!(pool.len(), 2);

        assert_eq!(pool.consolidate(), 2);
        assert_eq!(pool.pending_len(), 0);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_take_prefix_fifo() {
        let pool = TrajectoryPool::new();
        pool.push_batch((0..10u32).collect());

        let taken = pool.take_prefix(4);
        assert_eq!(taken, vec![0, 1, 2, 3]);
        assert_eq!(pool.len(), 6);
        assert_eq!(pool.snapshot(), vec![4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_take_prefix_underrun_returns_available() {
        let pool = TrajectoryPool::new();
        pool.push_batch(vec![7u32, 8]);

        let taken = pool.take_prefix(5);
        assert_eq!(taken, vec![7, 8]);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_with_storage_updates_size() {
        let pool = TrajectoryPool::new();
        pool.push_batch((0..5u32).collect());

        let removed = pool.with_storage(|items| items.drain(..2).count());
        assert_eq!(removed, 2);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_len_lags_in_flight_append() {
        let pool = TrajectoryPool::new();
        pool.push_batch(vec![1u32, 2, 3]);

        // A producer published its item but has not counted it yet.
        pool.push_uncounted(4);
        assert_eq!(pool.len(), 3);

        // Everything len() reports can be taken.
        let taken = pool.take_prefix(pool.len());
        assert_eq!(taken, vec![1, 2, 3]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.snapshot(), vec![4]);
    }

    #[test]
    fn test_removal_overtaking_count_settles() {
        let pool = TrajectoryPool::new();
        pool.push(1u32);
        pool.push_uncounted(2);

        // The removal sees the uncounted item before its count lands.
        assert_eq!(pool.take_prefix(5), vec![1, 2]);
        assert_eq!(pool.len(), 0);

        pool.total.fetch_add(1, Ordering::AcqRel);
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.pending_len(), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_clear() {
        let pool = TrajectoryPool::new();
        pool.push_batch((0..5u32).collect());
        pool.consolidate();
        pool.push(99);

        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.pending_len(), 0);
    }

    #[test]
    fn test_concurrent_producers_no_lost_updates() {
        let pool = trajectory_pool::<(usize, usize)>();
        let n_producers = 8;
        let per_producer = 500;

        let handles: Vec<_> = (0..n_producers)
            .map(|p| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for i in 0..per_producer {
                        pool.push((p, i));
                    }
                })
            })
            .collect();

        // Consume concurrently with the producers.
        let mut consumed = Vec::new();
        while consumed.len() < n_producers * per_producer {
            consumed.extend(pool.take_prefix(64));
            thread::yield_now();
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(consumed.len(), n_producers * per_producer);
        assert!(pool.is_empty());

        // No duplicates, and per-producer order is preserved.
        let mut last_seen = vec![None::<usize>; n_producers];
        for (p, i) in consumed {
            if let Some(prev) = last_seen[p] {
                assert!(i > prev, "producer {} out of order: {} after {}", p, i, prev);
            }
            last_seen[p] = Some(i);
        }
        assert!(last_seen.iter().all(|l| *l == Some(per_producer - 1)));
    }
}
