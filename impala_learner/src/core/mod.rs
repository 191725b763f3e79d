//! Core types shared by actors and the learner.

pub mod device;
pub mod pools;
pub mod trajectory;
pub mod trajectory_pool;

pub use device::DeviceConfig;
pub use pools::{PoolSizes, TrajectoryPools};
pub use trajectory::{Outcome, Trajectory};
pub use trajectory_pool::{trajectory_pool, SharedTrajectoryPool, TrajectoryPool};
