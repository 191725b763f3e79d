//! Model checkpointing.
//!
//! The learner serializes its model at the end of every update cycle with
//! burn's `BinFileRecorder`. Checkpoints can be listed and loaded back into
//! a model template to resume training.
//!
//! ## Example
//!
//! ```rust,ignore
//! use impala_learner::checkpoint::Checkpointer;
//!
//! let checkpointer = Checkpointer::new("./model/", "rl")?;
//! checkpointer.save(&model)?;
//!
//! // Resume:
//! let (model, info) = checkpointer.load_latest(Model::new(&device), &device)?;
//! ```

pub mod checkpointer;

pub use checkpointer::{CheckpointError, CheckpointInfo, Checkpointer};
