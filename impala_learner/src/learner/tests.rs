//! Behavioral tests for the update step and the run loop.
//!
//! A two-input linear model is trained against a squared-output loss on the
//! `Autodiff<NdArray>` backend. The loss records every call so tests can
//! check how many mini-batches were processed and with which flags.

use super::*;
use crate::config::LearnerConfig;
use crate::error::{LearnerError, PoolKind};
use crate::metrics::MemorySink;
use crate::sampling::{BatchComposition, SamplingStrategy};
use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::optim::Optimizer;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor, TensorData};
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

type TB = Autodiff<NdArray<f32>>;
type Sample = [f32; 2];

const REPORT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Test Helpers and Mock Types
// =============================================================================

#[derive(Module, Debug)]
struct TinyModel<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> TinyModel<B> {
    fn new(device: &B::Device) -> Self {
        Self {
            linear: LinearConfig::new(2, 1).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(x)
    }

    fn weights(&self) -> Vec<f32> {
        self.linear.weight.val().into_data().to_vec::<f32>().unwrap()
    }
}

impl<B: AutodiffBackend> LearnerModel<B> for TinyModel<B> {}

fn regression(
    model: &TinyModel<TB>,
    batch: &[Sample],
    device: &<TB as Backend>::Device,
) -> Tensor<TB, 1> {
    let flat: Vec<f32> = batch.iter().flat_map(|s| s.iter().copied()).collect();
    let x = Tensor::<TB, 2>::from_data(TensorData::new(flat, [batch.len(), 2]), device);
    model.forward(x).powf_scalar(2.0).mean()
}

#[derive(Debug, Clone, Copy)]
enum LossMode {
    Normal,
    FailOnCall(usize),
    PanicOnCall(usize),
    NanOnCall(usize),
}

/// Shared view of what the loss saw.
#[derive(Clone, Default)]
struct LossProbe {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<(usize, LossOptions)>>>,
}

impl LossProbe {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct RecordingLoss {
    mode: LossMode,
    probe: LossProbe,
}

impl LossFunction<TB, TinyModel<TB>, Sample> for RecordingLoss {
    fn compute(
        &mut self,
        model: &TinyModel<TB>,
        batch: &[Sample],
        options: &LossOptions,
        device: &<TB as Backend>::Device,
    ) -> Result<LossOutput<TB>, LearnerError> {
        let call = self.probe.calls.fetch_add(1, Ordering::SeqCst);
        self.probe.seen.lock().push((batch.len(), *options));

        match self.mode {
            LossMode::FailOnCall(n) if n == call => return Err(LearnerError::loss("boom")),
            LossMode::PanicOnCall(n) if n == call => panic!("loss exploded"),
            LossMode::NanOnCall(n) if n == call => {
                return Ok(LossOutput::new(Tensor::<TB, 1>::from_floats([f32::NAN], device)))
            }
            _ => {}
        }

        let loss = regression(model, batch, device);
        let value: f32 = loss.clone().into_scalar().elem();
        Ok(LossOutput::new(loss)
            .with_component("baseline", value)
            .with_component("entropy", 0.0))
    }
}

fn test_config(dir: &Path) -> LearnerConfig {
    LearnerConfig::new()
        .with_batch_size(4)
        .with_count_of_batches(1)
        .with_sequence_length(8)
        .with_buffer_size(1)
        .with_learning_rate(1e-2)
        .with_checkpoint_dir(dir)
        .with_seed(7)
        .with_poll_interval(Duration::from_millis(5))
}

fn learner(
    config: LearnerConfig,
    mode: LossMode,
) -> (
    LearnerProcess<TB, TinyModel<TB>, impl Optimizer<TinyModel<TB>, TB>, RecordingLoss, Sample>,
    LossProbe,
) {
    let device = Default::default();
    let model = TinyModel::<TB>::new(&device);
    let optimizer = config.create_optimizer::<TB, TinyModel<TB>>();
    let probe = LossProbe::default();
    let loss = RecordingLoss {
        mode,
        probe: probe.clone(),
    };
    let process = LearnerProcess::new(config, model, optimizer, loss).unwrap();
    (process, probe)
}

fn fill_ordinary<M, O, L>(process: &LearnerProcess<TB, M, O, L, Sample>, n: usize)
where
    M: LearnerModel<TB>,
    O: Optimizer<M, TB> + 'static,
    L: LossFunction<TB, M, Sample> + 'static,
{
    for i in 0..n {
        process.send_trajectory([1.0 + i as f32, -0.5]);
    }
}

fn dir_entries(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

// =============================================================================
// Update Step
// =============================================================================

mod update_tests {
    use super::*;

    #[test]
    fn test_step_counter_advances_per_mini_batch() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path())
            .with_num_epochs(3)
            .with_count_of_batches(2);
        let (mut learner, probe) = learner(config, LossMode::Normal);
        fill_ordinary(&learner, 8);

        let summary = learner.update_parameters().unwrap().unwrap();

        // 3 epochs × 2 mini-batches × batch 4 × sequence 8
        assert_eq!(summary.step, 192);
        assert_eq!(summary.optimizer_steps, 6);
        assert_eq!(probe.calls(), 6);
        assert!(probe.seen.lock().iter().all(|(len, _)| *len == 4));

        fill_ordinary(&learner, 8);
        let summary = learner.update_parameters().unwrap().unwrap();
        assert_eq!(summary.step, 384);
        assert_eq!(learner.step(), 384);
        assert_eq!(learner.stats().steps, 384);
        assert_eq!(learner.stats().updates, 2);
    }

    #[test]
    fn test_training_disabled_is_noop() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_training(false);
        let (mut learner, probe) = learner(config, LossMode::Normal);
        fill_ordinary(&learner, 10);

        let result = learner.update_parameters().unwrap();

        assert!(result.is_none());
        assert_eq!(learner.pools().ordinary().len(), 10);
        assert_eq!(learner.step(), 0);
        assert_eq!(probe.calls(), 0);
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[test]
    fn test_uniform_update_consumes_one_sample_batch() {
        // 40 ordinary, buffer_size 1, count_of_batches 1, batch_size 32
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_batch_size(32);
        let (mut learner, _probe) = learner(config, LossMode::Normal);
        fill_ordinary(&learner, 40);

        let summary = learner.update_parameters().unwrap().unwrap();

        assert_eq!(summary.composition.ordinary, 32);
        assert_eq!(learner.pools().ordinary().len(), 8);
        assert_eq!(learner.stats().trajectories_consumed, 32);
    }

    #[test]
    fn test_mixed_update_composition() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path())
            .with_batch_size(10)
            .with_sampling(SamplingStrategy::Mixed);
        let (mut learner, _probe) = learner(config, LossMode::Normal);
        fill_ordinary(&learner, 100);
        for _ in 0..3 {
            learner.send_final_trajectory([0.0, 1.0]);
        }
        for _ in 0..5 {
            learner.send_win_trajectory([1.0, 1.0]);
        }

        let summary = learner.update_parameters().unwrap().unwrap();

        assert_eq!(
            summary.composition,
            BatchComposition {
                ordinary: 7,
                final_: 2,
                win: 1
            }
        );
        assert_eq!(learner.pools().ordinary().len(), 93);
    }

    #[test]
    fn test_metric_tags_and_steps() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_count_of_batches(2);
        let sink = MemorySink::new();
        let (learner, _probe) = learner(config, LossMode::Normal);
        let mut learner = learner.with_sink(sink.clone());
        fill_ordinary(&learner, 8);

        learner.update_parameters().unwrap();

        let records = sink.records();
        let tags: Vec<&str> = records.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(
            tags,
            vec![
                "learner/baseline",
                "learner/entropy",
                "learner/loss",
                "learner/baseline",
                "learner/entropy",
                "learner/loss",
            ]
        );

        let loss_steps: Vec<u64> = sink
            .records_for("learner/loss")
            .iter()
            .map(|r| r.step)
            .collect();
        assert_eq!(loss_steps, vec![0, 32]);
        assert!(records.iter().all(|r| r.value.is_finite()));
    }

    #[test]
    fn test_loss_options_forwarded() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path())
            .with_opponent_state(false)
            .with_no_replay_learn(true)
            .with_only_update_baseline(true);
        let (mut learner, probe) = learner(config, LossMode::Normal);
        fill_ordinary(&learner, 4);

        learner.update_parameters().unwrap();

        let seen = probe.seen.lock();
        assert_eq!(
            seen[0].1,
            LossOptions {
                use_opponent_state: false,
                no_replay_learn: true,
                only_update_baseline: true,
            }
        );
    }

    #[test]
    fn test_checkpoint_written_after_update() {
        let dir = tempdir().unwrap();
        let (mut learner, _probe) = learner(test_config(dir.path()), LossMode::Normal);
        fill_ordinary(&learner, 8);

        let first = learner.update_parameters().unwrap().unwrap();
        let second = learner.update_parameters().unwrap().unwrap();

        assert!(first.checkpoint.exists());
        assert_eq!(first.checkpoint, second.checkpoint);
        assert_eq!(first.checkpoint.parent().unwrap(), dir.path());
        let name = first.checkpoint.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("rl_") && name.ends_with(".bin"));
        assert_eq!(dir_entries(dir.path()), 1);
        assert_eq!(learner.stats().checkpoints, 2);
    }

    #[test]
    fn test_parameters_change_after_update() {
        let dir = tempdir().unwrap();
        let (mut learner, _probe) = learner(test_config(dir.path()), LossMode::Normal);
        let before = learner.parameters().weights();
        fill_ordinary(&learner, 4);

        learner.update_parameters().unwrap();

        assert_ne!(learner.parameters().weights(), before);
        assert_eq!(learner.parameter_count(), 3);
    }

    #[test]
    fn test_insufficient_data_propagates() {
        let dir = tempdir().unwrap();
        let (mut learner, probe) = learner(test_config(dir.path()), LossMode::Normal);
        fill_ordinary(&learner, 3);

        let err = learner.update_parameters().unwrap_err();

        assert!(matches!(
            err,
            LearnerError::InsufficientData {
                pool: PoolKind::Ordinary,
                requested: 4,
                available: 3
            }
        ));
        assert_eq!(probe.calls(), 0);
        assert_eq!(learner.pools().ordinary().len(), 3);
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[test]
    fn test_loss_error_propagates_after_partial_update() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_count_of_batches(2);
        let (mut learner, _probe) = learner(config, LossMode::FailOnCall(1));
        fill_ordinary(&learner, 8);

        let err = learner.update_parameters().unwrap_err();

        assert!(matches!(err, LearnerError::Loss(ref msg) if msg == "boom"));
        assert_eq!(learner.step(), 32);
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[test]
    fn test_non_finite_loss_is_rejected() {
        let dir = tempdir().unwrap();
        let (mut learner, _probe) = learner(test_config(dir.path()), LossMode::NanOnCall(0));
        let before = learner.parameters().weights();
        fill_ordinary(&learner, 4);

        let err = learner.update_parameters().unwrap_err();

        match err {
            LearnerError::NonFiniteLoss { step, value } => {
                assert_eq!(step, 0);
                assert!(value.is_nan());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(learner.parameters().weights(), before);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_batch_size(0);
        let device = Default::default();
        let optimizer = config.create_optimizer::<TB, TinyModel<TB>>();
        let loss = RecordingLoss {
            mode: LossMode::Normal,
            probe: LossProbe::default(),
        };

        let result = LearnerProcess::new(config, TinyModel::<TB>::new(&device), optimizer, loss);

        assert!(matches!(result, Err(LearnerError::InvalidConfig(_))));
    }

    #[test]
    fn test_closure_loss() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let device = Default::default();
        let optimizer = config.create_optimizer::<TB, TinyModel<TB>>();
        let loss = |model: &TinyModel<TB>,
                    batch: &[Sample],
                    _options: &LossOptions,
                    device: &<TB as Backend>::Device|
         -> Result<LossOutput<TB>, LearnerError> {
            Ok(LossOutput::new(regression(model, batch, device)))
        };

        let mut learner: LearnerProcess<TB, TinyModel<TB>, _, _, Sample> =
            LearnerProcess::new(config, TinyModel::<TB>::new(&device), optimizer, loss).unwrap();
        for _ in 0..4 {
            learner.send_trajectory([0.5, 0.5]);
        }

        let summary = learner.update_parameters().unwrap().unwrap();
        assert_eq!(summary.step, 32);
        assert!(summary.mean_loss.is_finite());
    }
}

// =============================================================================
// Run Loop
// =============================================================================

mod run_loop_tests {
    use super::*;

    #[test]
    fn test_zero_ttl_never_updates() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_max_time_for_training(Duration::ZERO);
        let (learner, probe) = learner(config, LossMode::Normal);
        fill_ordinary(&learner, 100);

        let handle = learner.start();
        let report = handle.wait_report(REPORT_TIMEOUT).unwrap();

        assert!(matches!(report.stop, StopReason::TimeToLive));
        assert_eq!(report.updates, 0);
        assert_eq!(report.steps, 0);
        assert_eq!(probe.calls(), 0);
        assert!(!handle.is_running());
        assert_eq!(handle.pool_sizes().ordinary, 100);
    }

    #[test]
    fn test_running_flag_lifecycle() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_max_time_for_training(Duration::from_millis(200));
        let (learner, _probe) = learner(config, LossMode::Normal);
        assert!(!learner.is_running());

        let handle = learner.start();
        assert!(handle.is_running());

        let report = handle.wait_report(REPORT_TIMEOUT).unwrap();
        assert!(!report.stop.is_failure());
        assert!(!handle.is_running());
    }

    #[test]
    fn test_updates_until_pool_below_threshold() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_max_time_for_training(Duration::from_secs(1));
        let (learner, probe) = learner(config, LossMode::Normal);
        fill_ordinary(&learner, 10);

        let handle = learner.start();
        let report = handle.wait_report(REPORT_TIMEOUT).unwrap();

        assert!(matches!(report.stop, StopReason::TimeToLive));
        assert_eq!(report.updates, 2);
        assert_eq!(report.steps, 64);
        assert_eq!(probe.calls(), 2);
        assert_eq!(handle.pool_sizes().ordinary, 2);
        assert_eq!(handle.stats().trajectories_consumed, 8);
    }

    #[test]
    fn test_loss_error_terminates_loop() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_max_time_for_training(Duration::from_secs(60));
        let (learner, probe) = learner(config, LossMode::FailOnCall(0));
        fill_ordinary(&learner, 40);

        let handle = learner.start();
        let report = handle.wait_report(REPORT_TIMEOUT).unwrap();

        match report.stop.error() {
            Some(LearnerError::Loss(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected stop: {:?}", other),
        }
        assert_eq!(report.updates, 0);
        assert!(!handle.is_running());

        // No iteration after the failing one.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(probe.calls(), 1);
        assert_eq!(handle.pool_sizes().ordinary, 36);
    }

    #[test]
    fn test_panic_is_caught() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_max_time_for_training(Duration::from_secs(60));
        let (learner, probe) = learner(config, LossMode::PanicOnCall(0));
        fill_ordinary(&learner, 8);

        let handle = learner.start();
        let report = handle.wait_report(REPORT_TIMEOUT).unwrap();

        match report.stop {
            StopReason::Failed(LearnerError::Panicked(ref msg)) => {
                assert!(msg.contains("loss exploded"))
            }
            ref other => panic!("unexpected stop: {:?}", other),
        }
        assert!(!handle.is_running());
        assert_eq!(probe.calls(), 1);

        // The thread itself exits normally and hands the model back.
        let model = handle.join().unwrap();
        assert_eq!(model.num_params(), 3);
    }

    #[test]
    fn test_concurrent_producers_through_handle() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_max_time_for_training(Duration::from_secs(1));
        let (learner, _probe) = learner(config, LossMode::Normal);

        let handle = learner.start();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let pools = handle.pools().clone();
                thread::spawn(move || {
                    for i in 0..8 {
                        pools.send_trajectory([p as f32, i as f32]);
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let report = handle.wait_report(REPORT_TIMEOUT).unwrap();
        assert!(!report.stop.is_failure());

        // Nothing lost, nothing read twice.
        let consumed = handle.stats().trajectories_consumed;
        assert_eq!(consumed + handle.pool_sizes().ordinary, 32);
        assert_eq!(consumed, report.updates * 4);
    }

    #[test]
    fn test_report_delivered_once() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path()).with_max_time_for_training(Duration::ZERO);
        let (learner, _probe) = learner(config, LossMode::Normal);

        let handle = learner.start();
        assert!(handle.wait_report(REPORT_TIMEOUT).is_some());
        assert!(handle.try_report().is_none());
        handle.join().unwrap();
    }
}
