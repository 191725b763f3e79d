//! The three outcome-partitioned pools fed by actors.

use super::trajectory::{Outcome, Trajectory};
use super::trajectory_pool::{trajectory_pool, SharedTrajectoryPool};
use std::fmt;
use std::sync::Arc;

/// Producer-facing handle to the ordinary, final and win pools.
///
/// Cloning is cheap: every clone refers to the same shared pools, so each
/// actor thread can own one.
pub struct TrajectoryPools<T> {
    ordinary: SharedTrajectoryPool<T>,
    final_: SharedTrajectoryPool<T>,
    win: SharedTrajectoryPool<T>,
}

impl<T> TrajectoryPools<T> {
    /// Create three empty pools.
    pub fn new() -> Self {
        Self {
            ordinary: trajectory_pool(),
            final_: trajectory_pool(),
            win: trajectory_pool(),
        }
    }

    /// Append to the ordinary pool.
    pub fn send_trajectory(&self, trajectory: T) {
        self.ordinary.push(trajectory);
    }

    /// Append to the final (terminal-episode) pool.
    pub fn send_final_trajectory(&self, trajectory: T) {
        self.final_.push(trajectory);
    }

    /// Append to the win pool.
    pub fn send_win_trajectory(&self, trajectory: T) {
        self.win.push(trajectory);
    }

    /// Ordinary pool.
    pub fn ordinary(&self) -> &SharedTrajectoryPool<T> {
        &self.ordinary
    }

    /// Final pool.
    pub fn final_pool(&self) -> &SharedTrajectoryPool<T> {
        &self.final_
    }

    /// Win pool.
    pub fn win(&self) -> &SharedTrajectoryPool<T> {
        &self.win
    }

    /// Current occupancy of all three pools.
    pub fn sizes(&self) -> PoolSizes {
        PoolSizes {
            ordinary: self.ordinary.len(),
            final_: self.final_.len(),
            win: self.win.len(),
        }
    }
}

impl<S> TrajectoryPools<Trajectory<S>> {
    /// Route a trajectory to the pool matching its outcome.
    pub fn send_classified(&self, trajectory: Trajectory<S>) {
        match trajectory.outcome {
            Outcome::Ordinary => self.send_trajectory(trajectory),
            Outcome::Final => self.send_final_trajectory(trajectory),
            Outcome::Win => self.send_win_trajectory(trajectory),
        }
    }
}

impl<T> Clone for TrajectoryPools<T> {
    fn clone(&self) -> Self {
        Self {
            ordinary: Arc::clone(&self.ordinary),
            final_: Arc::clone(&self.final_),
            win: Arc::clone(&self.win),
        }
    }
}

impl<T> Default for TrajectoryPools<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Occupancy snapshot of the three pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSizes {
    /// Ordinary pool length
    pub ordinary: usize,
    /// Final pool length
    pub final_: usize,
    /// Win pool length
    pub win: usize,
}

impl fmt::Display for PoolSizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ordinary={} final={} win={}",
            self.ordinary, self.final_, self.win
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sends_route_to_separate_pools() {
        let pools = TrajectoryPools::new();
        pools.send_trajectory(1u32);
        pools.send_trajectory(2u32);
        pools.send_final_trajectory(3u32);
        pools.send_win_trajectory(4u32);

        assert_eq!(
            pools.sizes(),
            PoolSizes {
                ordinary: 2,
                final_: 1,
                win: 1
            }
        );
    }

    #[test]
    fn test_clones_share_storage() {
        let pools = TrajectoryPools::new();
        let producer = pools.clone();
        producer.send_trajectory(10u32);
        assert_eq!(pools.ordinary().len(), 1);
    }

    #[test]
    fn test_send_classified() {
        let pools = TrajectoryPools::new();
        pools.send_classified(Trajectory::<u8>::new(0));
        pools.send_classified(Trajectory::<u8>::new(1).finish(Outcome::Final, -1.0));
        pools.send_classified(Trajectory::<u8>::new(2).finish(Outcome::Win, 1.0));

        assert_eq!(pools.sizes().to_string(), "ordinary=1 final=1 win=1");
    }
}
