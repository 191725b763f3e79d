//! Learner configuration.
//!
//! All options are fixed at construction time. Defaults follow the
//! AlphaStar-style RL hyper-parameters the learner was tuned with.

use crate::sampling::{MixedSamplingConfig, SamplingStrategy};
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Learner configuration.
///
/// # Example
///
/// ```ignore
/// let config = LearnerConfig::new()
///     .with_max_time_for_training(Duration::from_secs(600))
///     .with_batch_size(16)
///     .with_count_of_batches(2)
///     .with_sampling(SamplingStrategy::Mixed);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerConfig {
    // === Run loop ===
    /// Time-to-live of the run loop
    pub max_time_for_training: Duration,
    /// Sleep between two run-loop iterations
    pub poll_interval: Duration,
    /// Number of sample batches the ordinary pool must hold before an update
    pub buffer_size: usize,

    // === Optimizer ===
    /// Adam learning rate
    pub learning_rate: f64,
    /// Adam β1
    pub beta1: f32,
    /// Adam β2
    pub beta2: f32,
    /// Adam ε
    pub epsilon: f32,
    /// L2 penalty added to the gradients (0 disables it)
    pub weight_decay: f32,

    // === Update step ===
    /// Whether `update_parameters` does anything at all
    pub is_training: bool,
    /// Passes over each sample batch
    pub num_epochs: usize,
    /// Mini-batches per sample batch
    pub count_of_batches: usize,
    /// Trajectories per mini-batch
    pub batch_size: usize,
    /// Steps per trajectory (used to advance the step counter)
    pub sequence_length: usize,

    // === Loss flags (forwarded to the loss function) ===
    /// Feed the opponent's observations to the value baseline
    pub use_opponent_state: bool,
    /// Disable the replay (supervised imitation) loss terms
    pub no_replay_learn: bool,
    /// Only train the value baselines
    pub only_update_baseline: bool,

    // === Sampling ===
    /// How sample batches are drawn from the pools
    pub sampling: SamplingStrategy,
    /// Shuffle the ordinary pool before taking from it
    pub use_random_sample: bool,
    /// Quotas and retain limits of the mixed strategy
    pub mixed: MixedSamplingConfig,
    /// Seed for the sampler's RNG (None = seeded from entropy)
    pub seed: Option<u64>,

    // === Output ===
    /// Directory checkpoints are written to
    pub checkpoint_dir: PathBuf,
    /// Model kind tag used as checkpoint file prefix
    pub model_kind: String,
    /// Directory scalar metric files are written to
    pub metrics_dir: PathBuf,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            max_time_for_training: Duration::from_secs(60 * 3),
            poll_interval: Duration::from_millis(50),
            buffer_size: 10,

            learning_rate: 3e-5,
            beta1: 0.0,
            beta2: 0.99,
            epsilon: 1e-5,
            weight_decay: 1e-5,

            is_training: true,
            num_epochs: 1,
            count_of_batches: 1,
            batch_size: 32,
            sequence_length: 64,

            use_opponent_state: true,
            no_replay_learn: false,
            only_update_baseline: false,

            sampling: SamplingStrategy::Uniform,
            use_random_sample: false,
            mixed: MixedSamplingConfig::default(),
            seed: None,

            checkpoint_dir: PathBuf::from("./model/"),
            model_kind: "rl".to_string(),
            metrics_dir: PathBuf::from("./log/"),
        }
    }
}

impl LearnerConfig {
    /// Create config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trajectories drawn per update (`count_of_batches × batch_size`).
    pub fn sample_size(&self) -> usize {
        self.count_of_batches * self.batch_size
    }

    /// Ordinary-pool size that triggers an update
    /// (`buffer_size × count_of_batches × batch_size`).
    pub fn buffer_threshold(&self) -> usize {
        self.buffer_size * self.sample_size()
    }

    /// Step-counter increment per mini-batch.
    pub fn steps_per_mini_batch(&self) -> u64 {
        (self.batch_size * self.sequence_length) as u64
    }

    /// Step-counter increment per full update.
    pub fn steps_per_update(&self) -> u64 {
        (self.num_epochs * self.count_of_batches) as u64 * self.steps_per_mini_batch()
    }

    /// Create the Adam optimizer described by this config.
    pub fn create_optimizer<B, M>(&self) -> impl Optimizer<M, B>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        let weight_decay = if self.weight_decay > 0.0 {
            Some(WeightDecayConfig::new(self.weight_decay))
        } else {
            None
        };

        AdamConfig::new()
            .with_beta_1(self.beta1)
            .with_beta_2(self.beta2)
            .with_epsilon(self.epsilon)
            .with_weight_decay(weight_decay)
            .init()
    }

    // === Builder methods for the run loop ===

    /// Set the run loop's time-to-live.
    pub fn with_max_time_for_training(mut self, ttl: Duration) -> Self {
        self.max_time_for_training = ttl;
        self
    }

    /// Set the sleep between run-loop iterations.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the buffer-fullness threshold, in sample batches.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    // === Builder methods for the optimizer ===

    /// Set learning rate.
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set Adam's β1 and β2.
    pub fn with_betas(mut self, beta1: f32, beta2: f32) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    /// Set Adam's ε.
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set weight decay.
    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    // === Builder methods for the update step ===

    /// Enable or disable training.
    pub fn with_training(mut self, is_training: bool) -> Self {
        self.is_training = is_training;
        self
    }

    /// Set epochs per update.
    pub fn with_num_epochs(mut self, num_epochs: usize) -> Self {
        self.num_epochs = num_epochs;
        self
    }

    /// Set mini-batches per update.
    pub fn with_count_of_batches(mut self, count: usize) -> Self {
        self.count_of_batches = count;
        self
    }

    /// Set trajectories per mini-batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set steps per trajectory.
    pub fn with_sequence_length(mut self, sequence_length: usize) -> Self {
        self.sequence_length = sequence_length;
        self
    }

    // === Builder methods for the loss flags ===

    /// Use opponent observations in the baseline.
    pub fn with_opponent_state(mut self, enabled: bool) -> Self {
        self.use_opponent_state = enabled;
        self
    }

    /// Disable the replay loss terms.
    pub fn with_no_replay_learn(mut self, disabled: bool) -> Self {
        self.no_replay_learn = disabled;
        self
    }

    /// Restrict updates to the value baselines.
    pub fn with_only_update_baseline(mut self, only_baseline: bool) -> Self {
        self.only_update_baseline = only_baseline;
        self
    }

    // === Builder methods for sampling ===

    /// Set the sampling strategy.
    pub fn with_sampling(mut self, sampling: SamplingStrategy) -> Self {
        self.sampling = sampling;
        self
    }

    /// Shuffle the ordinary pool before sampling.
    pub fn with_random_sample(mut self, random: bool) -> Self {
        self.use_random_sample = random;
        self
    }

    /// Set the mixed strategy's quotas and limits.
    pub fn with_mixed_sampling(mut self, mixed: MixedSamplingConfig) -> Self {
        self.mixed = mixed;
        self
    }

    /// Seed the sampler's RNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    // === Builder methods for output ===

    /// Set the checkpoint directory.
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    /// Set the checkpoint file prefix.
    pub fn with_model_kind(mut self, kind: impl Into<String>) -> Self {
        self.model_kind = kind.into();
        self
    }

    /// Set the metrics directory.
    pub fn with_metrics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.metrics_dir = dir.into();
        self
    }

    /// Validate the configuration and return any issues.
    ///
    /// Returns `Ok(())` if valid, or an error message describing the issue.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.batch_size == 0 {
            return Err("batch_size must be > 0");
        }
        if self.count_of_batches == 0 {
            return Err("count_of_batches must be > 0");
        }
        if self.sequence_length == 0 {
            return Err("sequence_length must be > 0");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err("learning_rate must be positive and finite");
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err("betas must be in [0, 1)");
        }
        if self.epsilon <= 0.0 {
            return Err("epsilon must be > 0");
        }
        if self.weight_decay < 0.0 {
            return Err("weight_decay must be >= 0");
        }
        if self.model_kind.is_empty() {
            return Err("model_kind must not be empty");
        }
        self.mixed.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = LearnerConfig::default();
        assert_eq!(config.max_time_for_training, Duration::from_secs(180));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.buffer_size, 10);
        assert_eq!(config.count_of_batches, 1);
        assert!(config.is_training);
        assert!(config.use_opponent_state);
        assert!(!config.no_replay_learn);
        assert!(!config.use_random_sample);
        assert!(!config.only_update_baseline);
        assert_eq!(config.sampling, SamplingStrategy::Uniform);
        assert_eq!(config.model_kind, "rl");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_sizes() {
        let config = LearnerConfig::new()
            .with_batch_size(32)
            .with_count_of_batches(2)
            .with_buffer_size(3)
            .with_sequence_length(8)
            .with_num_epochs(4);

        assert_eq!(config.sample_size(), 64);
        assert_eq!(config.buffer_threshold(), 192);
        assert_eq!(config.steps_per_mini_batch(), 256);
        assert_eq!(config.steps_per_update(), 4 * 2 * 256);
    }

    #[test]
    fn test_builder() {
        let config = LearnerConfig::new()
            .with_learning_rate(1e-4)
            .with_betas(0.9, 0.999)
            .with_epsilon(1e-8)
            .with_weight_decay(0.0)
            .with_training(false)
            .with_opponent_state(false)
            .with_no_replay_learn(true)
            .with_only_update_baseline(true)
            .with_random_sample(true)
            .with_sampling(SamplingStrategy::Mixed)
            .with_seed(7)
            .with_model_kind("sl")
            .with_checkpoint_dir("/tmp/ckpt");

        assert_eq!(config.learning_rate, 1e-4);
        assert_eq!(config.beta1, 0.9);
        assert_eq!(config.beta2, 0.999);
        assert!(!config.is_training);
        assert!(!config.use_opponent_state);
        assert!(config.no_replay_learn);
        assert!(config.only_update_baseline);
        assert!(config.use_random_sample);
        assert_eq!(config.sampling, SamplingStrategy::Mixed);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.model_kind, "sl");
        assert_eq!(config.checkpoint_dir, PathBuf::from("/tmp/ckpt"));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = LearnerConfig::new().with_batch_size(0);
        assert_eq!(config.validate(), Err("batch_size must be > 0"));

        let config = LearnerConfig::new().with_count_of_batches(0);
        assert_eq!(config.validate(), Err("count_of_batches must be > 0"));
    }

    #[test]
    fn test_validate_rejects_bad_optimizer() {
        assert!(LearnerConfig::new().with_learning_rate(0.0).validate().is_err());
        assert!(LearnerConfig::new().with_betas(1.0, 0.9).validate().is_err());
        assert!(LearnerConfig::new().with_epsilon(0.0).validate().is_err());
        assert!(LearnerConfig::new().with_weight_decay(-1.0).validate().is_err());
    }

    #[test]
    fn test_zero_ttl_is_valid() {
        let config = LearnerConfig::new().with_max_time_for_training(Duration::ZERO);
        assert!(config.validate().is_ok());
    }
}
