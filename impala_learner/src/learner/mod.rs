//! Learner system.
//!
//! - [`LearnerProcess`]: Owns the pools and the update step, starts the loop
//! - [`LearnerHandle`]: Producer and monitoring handle of a started learner
//! - [`UpdateStep`]: Sample, train, checkpoint
//! - [`LossFunction`]: External loss over a mini-batch
//! - [`LearnerModel`]: Model bound with a training/evaluation switch

pub mod loss;
pub mod model;
pub mod process;
pub mod update;

#[cfg(test)]
mod tests;

pub use loss::{LossFunction, LossOptions, LossOutput};
pub use model::LearnerModel;
pub use process::{LearnerHandle, LearnerProcess, RunReport, StopReason};
pub use update::{UpdateStep, UpdateSummary};
