//! # impala_learner: Learner side of an actor-learner RL system
//!
//! Actors push finished trajectories into three shared pools; one background
//! learner thread drains them, trains a burn model against an external loss
//! and checkpoints the model after every update.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Actor-Learner                               │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  Actor 0           Actor 1           Actor N                        │
//! │  send_trajectory / send_final_trajectory / send_win_trajectory      │
//! │      │                 │                 │                          │
//! │      └─────────────────┼─────────────────┘                          │
//! │                        ▼                                            │
//! │   ┌──────────┐   ┌──────────┐   ┌──────────┐                        │
//! │   │ ordinary │   │  final   │   │   win    │   TrajectoryPools      │
//! │   └────┬─────┘   └────┬─────┘   └────┬─────┘   (lock-free append)   │
//! │        └──────────────┼──────────────┘                              │
//! │                       ▼                                             │
//! │              ┌─────────────────┐                                    │
//! │              │ Learner Thread  │  poll → Sampler → UpdateStep       │
//! │              │ (time-bounded)  │  loss → backward → Adam step       │
//! │              └────────┬────────┘                                    │
//! │                       ▼                                             │
//! │        learner/<component> scalars, checkpoint .bin                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use impala_learner::{LearnerConfig, LearnerProcess, SamplingStrategy};
//!
//! let config = LearnerConfig::new()
//!     .with_batch_size(16)
//!     .with_count_of_batches(2)
//!     .with_sampling(SamplingStrategy::Mixed);
//!
//! let optimizer = config.create_optimizer::<B, MyModel<B>>();
//! let learner = LearnerProcess::new(config, model, optimizer, my_loss)?;
//! let handle = learner.start();
//!
//! // From actor threads:
//! handle.send_trajectory(trajectory);
//!
//! let report = handle.wait_report(Duration::from_secs(600));
//! ```

pub mod checkpoint;
pub mod config;
pub mod core;
pub mod error;
pub mod learner;
pub mod metrics;
pub mod sampling;

pub use checkpoint::{CheckpointError, CheckpointInfo, Checkpointer};
pub use config::LearnerConfig;
pub use crate::core::{
    trajectory_pool, DeviceConfig, Outcome, PoolSizes, SharedTrajectoryPool, Trajectory,
    TrajectoryPool, TrajectoryPools,
};
pub use error::{LearnerError, PoolKind};
pub use learner::{
    LearnerHandle, LearnerModel, LearnerProcess, LossFunction, LossOptions, LossOutput, RunReport,
    StopReason, UpdateStep, UpdateSummary,
};
pub use metrics::{
    CsvSink, LearnerMetrics, LearnerStats, LogSink, MemorySink, MultiSink, ScalarRecord,
    ScalarSink,
};
pub use sampling::{
    BatchComposition, MixedSamplingConfig, SampleBatch, Sampler, SamplingStrategy,
};
