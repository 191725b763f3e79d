//! Shared learner counters.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Thread-safe learner progress counters.
///
/// Written by the learner thread, read from any thread through a
/// [`LearnerStats`] snapshot.
#[derive(Debug, Default)]
pub struct LearnerMetrics {
    /// Global step counter (batch_size * sequence_length per optimizer step)
    steps: AtomicU64,
    /// Completed update calls
    updates: AtomicUsize,
    /// Optimizer steps across all updates
    optimizer_steps: AtomicUsize,
    /// Trajectories drawn into sample batches
    trajectories_consumed: AtomicUsize,
    /// Checkpoints written
    checkpoints: AtomicUsize,
}

impl LearnerMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the global step counter.
    pub fn add_steps(&self, steps: u64) {
        self.steps.fetch_add(steps, Ordering::Relaxed);
    }

    /// Record one optimizer step.
    pub fn increment_optimizer_steps(&self) {
        self.optimizer_steps.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed update that consumed `trajectories`.
    pub fn record_update(&self, trajectories: usize) {
        self.updates.fetch_add(1, Ordering::Relaxed);
        self.trajectories_consumed
            .fetch_add(trajectories, Ordering::Relaxed);
    }

    /// Record a checkpoint write.
    pub fn record_checkpoint(&self) {
        self.checkpoints.fetch_add(1, Ordering::Relaxed);
    }

    /// Current global step.
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    /// Completed updates.
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::Relaxed)
    }

    /// Snapshot of every counter.
    pub fn snapshot(&self) -> LearnerStats {
        LearnerStats {
            steps: self.steps.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            optimizer_steps: self.optimizer_steps.load(Ordering::Relaxed),
            trajectories_consumed: self.trajectories_consumed.load(Ordering::Relaxed),
            checkpoints: self.checkpoints.load(Ordering::Relaxed),
        }
    }
}

/// Shared learner metrics.
pub type SharedLearnerMetrics = Arc<LearnerMetrics>;

/// Create shared learner metrics.
pub fn learner_metrics() -> SharedLearnerMetrics {
    Arc::new(LearnerMetrics::new())
}

/// Point-in-time copy of [`LearnerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearnerStats {
    pub steps: u64,
    pub updates: usize,
    pub optimizer_steps: usize,
    pub trajectories_consumed: usize,
    pub checkpoints: usize,
}

impl std::fmt::Display for LearnerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "steps={} updates={} optimizer_steps={} consumed={} checkpoints={}",
            self.steps,
            self.updates,
            self.optimizer_steps,
            self.trajectories_consumed,
            self.checkpoints
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_counters() {
        let metrics = LearnerMetrics::new();
        metrics.add_steps(2048);
        metrics.add_steps(2048);
        metrics.increment_optimizer_steps();
        metrics.record_update(32);
        metrics.record_checkpoint();

        let stats = metrics.snapshot();
        assert_eq!(stats.steps, 4096);
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.optimizer_steps, 1);
        assert_eq!(stats.trajectories_consumed, 32);
        assert_eq!(stats.checkpoints, 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let metrics = learner_metrics();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.add_steps(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.steps(), 400);
    }
}
