//! One learner update: sample, train over epochs and mini-batches, checkpoint.
//!
//! ```text
//! update_parameters()
//!   ├─ training disabled → Ok(None), nothing touched
//!   ├─ sample count_of_batches × batch_size trajectories
//!   ├─ for epoch in 0..num_epochs
//!   │    for i in 0..count_of_batches
//!   │      loss(mini_batch i) → emit learner/<component>, learner/loss
//!   │      backward → optimizer step
//!   │      step += batch_size × sequence_length
//!   └─ save checkpoint
//! ```

use crate::checkpoint::Checkpointer;
use crate::config::LearnerConfig;
use crate::core::device::DeviceConfig;
use crate::core::pools::TrajectoryPools;
use crate::error::LearnerError;
use crate::learner::loss::{LossFunction, LossOptions};
use crate::learner::model::LearnerModel;
use crate::metrics::{component_tag, ScalarSink, SharedLearnerMetrics, TOTAL_LOSS_TAG};
use crate::sampling::{BatchComposition, Sampler};
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use std::path::PathBuf;

/// What one completed update did.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSummary {
    /// Step counter after the update
    pub step: u64,
    /// Where the sample batch came from
    pub composition: BatchComposition,
    /// Optimizer steps applied (num_epochs × count_of_batches)
    pub optimizer_steps: usize,
    /// Mean total loss over all mini-batches
    pub mean_loss: f32,
    /// Total loss of the last mini-batch
    pub last_loss: f32,
    /// Checkpoint written at the end of the update
    pub checkpoint: PathBuf,
}

/// Owns the model, the optimizer and the loss, and runs updates against the
/// shared pools.
pub struct UpdateStep<B, M, O, L, T>
where
    B: AutodiffBackend,
    M: LearnerModel<B>,
    O: Optimizer<M, B>,
    L: LossFunction<B, M, T>,
{
    config: LearnerConfig,
    pools: TrajectoryPools<T>,
    sampler: Sampler,
    model: M,
    optimizer: O,
    loss: L,
    device: DeviceConfig<B>,
    sink: Box<dyn ScalarSink>,
    checkpointer: Checkpointer,
    metrics: SharedLearnerMetrics,
    step: u64,
}

impl<B, M, O, L, T> UpdateStep<B, M, O, L, T>
where
    B: AutodiffBackend,
    M: LearnerModel<B>,
    O: Optimizer<M, B>,
    L: LossFunction<B, M, T>,
    T: Clone,
{
    /// Create an update step.
    ///
    /// The sampler is built from `config`; the model is put in evaluation
    /// mode until the first update.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: LearnerConfig,
        pools: TrajectoryPools<T>,
        model: M,
        optimizer: O,
        loss: L,
        device: DeviceConfig<B>,
        sink: Box<dyn ScalarSink>,
        checkpointer: Checkpointer,
        metrics: SharedLearnerMetrics,
    ) -> Self {
        Self {
            sampler: Sampler::from_config(&config),
            config,
            pools,
            model: model.set_training(false),
            optimizer,
            loss,
            device,
            sink,
            checkpointer,
            metrics,
            step: 0,
        }
    }

    /// Run one update.
    ///
    /// Returns `Ok(None)` without touching pools, counters or the checkpoint
    /// when training is disabled. Nothing is caught here: sampling, loss and
    /// checkpoint errors go straight to the caller.
    pub fn update_parameters(&mut self) -> Result<Option<UpdateSummary>, LearnerError> {
        if !self.config.is_training {
            return Ok(None);
        }

        let batch = self.sampler.sample(&self.pools, self.config.sample_size())?;
        log::debug!(
            "Sampled {} trajectories ({} ordinary, {} final, {} win)",
            batch.len(),
            batch.composition.ordinary,
            batch.composition.final_,
            batch.composition.win
        );

        self.model = self.model.clone().set_training(true);
        let options = LossOptions::from_config(&self.config);

        let mut loss_sum = 0.0f32;
        let mut last_loss = 0.0f32;
        let mut optimizer_steps = 0usize;

        for _epoch in 0..self.config.num_epochs {
            for index in 0..self.config.count_of_batches {
                let mini_batch = batch.mini_batch(index, self.config.batch_size);
                last_loss = self.train_mini_batch(mini_batch, &options)?;
                loss_sum += last_loss;
                optimizer_steps += 1;
            }
        }

        let checkpoint = self.checkpointer.save::<B, M>(&self.model)?;
        self.metrics.record_checkpoint();
        self.model = self.model.clone().set_training(false);

        self.metrics.record_update(batch.len());
        self.sink.flush();

        let mean_loss = if optimizer_steps > 0 {
            loss_sum / optimizer_steps as f32
        } else {
            0.0
        };

        Ok(Some(UpdateSummary {
            step: self.step,
            composition: batch.composition,
            optimizer_steps,
            mean_loss,
            last_loss,
            checkpoint,
        }))
    }

    fn train_mini_batch(
        &mut self,
        mini_batch: &[T],
        options: &LossOptions,
    ) -> Result<f32, LearnerError> {
        let step = self.step;
        let output = self
            .loss
            .compute(&self.model, mini_batch, options, self.device.device())?;

        let value: f32 = output.loss.clone().into_scalar().elem();
        if !value.is_finite() {
            return Err(LearnerError::NonFiniteLoss { step, value });
        }

        for (name, component) in &output.components {
            self.sink.add_scalar(&component_tag(name), *component, step);
        }
        self.sink.add_scalar(TOTAL_LOSS_TAG, value, step);

        let grads = output.loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self
            .optimizer
            .step(self.config.learning_rate, self.model.clone(), grads);

        let advance = self.config.steps_per_mini_batch();
        self.step += advance;
        self.metrics.add_steps(advance);
        self.metrics.increment_optimizer_steps();

        Ok(value)
    }

    /// Step counter (advanced by batch_size × sequence_length per mini-batch).
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Current model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consume the update step and return its model.
    pub fn into_model(self) -> M {
        self.model
    }

    /// Pools this update step samples from.
    pub fn pools(&self) -> &TrajectoryPools<T> {
        &self.pools
    }

    /// Configuration.
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Checkpointer.
    pub fn checkpointer(&self) -> &Checkpointer {
        &self.checkpointer
    }

    /// Replace the scalar sink.
    pub fn set_sink(&mut self, sink: Box<dyn ScalarSink>) {
        self.sink = sink;
    }

    /// Replace the device passed to the loss.
    pub fn set_device(&mut self, device: DeviceConfig<B>) {
        self.device = device;
    }
}
