//! Seam between the learner and the external loss computation.

use crate::config::LearnerConfig;
use crate::error::LearnerError;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Tensor;

/// Flags forwarded to the loss on every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LossOptions {
    /// Include opponent observations in the value estimate
    pub use_opponent_state: bool,
    /// Skip the replay (supervised imitation) term
    pub no_replay_learn: bool,
    /// Only train the baseline (value) head
    pub only_update_baseline: bool,
}

impl LossOptions {
    /// Read the flags from the learner configuration.
    pub fn from_config(config: &LearnerConfig) -> Self {
        Self {
            use_opponent_state: config.use_opponent_state,
            no_replay_learn: config.no_replay_learn,
            only_update_baseline: config.only_update_baseline,
        }
    }
}

/// Result of one loss evaluation.
///
/// `loss` is the scalar that gets back-propagated. `components` are reported
/// as `learner/<name>` and do not take part in the gradient.
#[derive(Debug, Clone)]
pub struct LossOutput<B: AutodiffBackend> {
    pub loss: Tensor<B, 1>,
    pub components: Vec<(String, f32)>,
}

impl<B: AutodiffBackend> LossOutput<B> {
    /// Loss with no named components.
    pub fn new(loss: Tensor<B, 1>) -> Self {
        Self {
            loss,
            components: Vec::new(),
        }
    }

    /// Add a named component.
    pub fn with_component(mut self, name: impl Into<String>, value: f32) -> Self {
        self.components.push((name.into(), value));
        self
    }
}

/// Loss computed over a mini-batch of trajectories.
///
/// Implemented for any `FnMut(&M, &[T], &LossOptions, &B::Device)` closure
/// returning `Result<LossOutput<B>, LearnerError>`.
pub trait LossFunction<B: AutodiffBackend, M, T>: Send {
    fn compute(
        &mut self,
        model: &M,
        batch: &[T],
        options: &LossOptions,
        device: &B::Device,
    ) -> Result<LossOutput<B>, LearnerError>;
}

impl<B, M, T, F> LossFunction<B, M, T> for F
where
    B: AutodiffBackend,
    F: FnMut(&M, &[T], &LossOptions, &B::Device) -> Result<LossOutput<B>, LearnerError> + Send,
{
    fn compute(
        &mut self,
        model: &M,
        batch: &[T],
        options: &LossOptions,
        device: &B::Device,
    ) -> Result<LossOutput<B>, LearnerError> {
        self(model, batch, options, device)
    }
}
