//! Learner process: pools, update step and the time-bounded run loop.
//!
//! # Thread Safety and Lifecycle
//!
//! `start()` moves the update step (model, optimizer, loss) onto one named
//! background thread, which is the only consumer of the pools. Producers
//! append through [`LearnerProcess`] before the start or through the
//! returned [`LearnerHandle`] afterwards, from any number of threads.
//!
//! The loop terminates when:
//! - the time-to-live elapses
//! - an update returns an error
//! - an update panics
//!
//! On every exit path the running flag is cleared and a [`RunReport`] is
//! sent to the handle.

use crate::checkpoint::Checkpointer;
use crate::config::LearnerConfig;
use crate::core::device::DeviceConfig;
use crate::core::pools::{PoolSizes, TrajectoryPools};
use crate::error::LearnerError;
use crate::learner::loss::LossFunction;
use crate::learner::model::LearnerModel;
use crate::learner::update::{UpdateStep, UpdateSummary};
use crate::metrics::{learner_metrics, CsvSink, LearnerStats, LogSink, MultiSink, ScalarSink, SharedLearnerMetrics};
use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Why the run loop stopped.
#[derive(Debug)]
pub enum StopReason {
    /// `max_time_for_training` elapsed.
    TimeToLive,
    /// An iteration returned an error or panicked.
    Failed(LearnerError),
}

impl StopReason {
    /// Check if the loop stopped because of a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Failed(_))
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&LearnerError> {
        match self {
            StopReason::Failed(e) => Some(e),
            StopReason::TimeToLive => None,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TimeToLive => write!(f, "time to live elapsed"),
            StopReason::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Terminal report of one run.
#[derive(Debug)]
pub struct RunReport {
    /// Completed updates
    pub updates: usize,
    /// Step counter at exit
    pub steps: u64,
    /// Wall time spent in the loop
    pub elapsed: Duration,
    /// Why the loop stopped
    pub stop: StopReason,
}

/// Clears the running flag when the loop exits, panics included.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// The learner before it is started.
///
/// # Type Parameters
/// - `B`: Autodiff backend
/// - `M`: Model
/// - `O`: Optimizer, usually from [`LearnerConfig::create_optimizer`]
/// - `L`: Loss
/// - `T`: Trajectory
pub struct LearnerProcess<B, M, O, L, T>
where
    B: AutodiffBackend,
    M: LearnerModel<B>,
    O: Optimizer<M, B>,
    L: LossFunction<B, M, T>,
{
    update: UpdateStep<B, M, O, L, T>,
    pools: TrajectoryPools<T>,
    metrics: SharedLearnerMetrics,
    is_running: Arc<AtomicBool>,
}

impl<B, M, O, L, T> LearnerProcess<B, M, O, L, T>
where
    B: AutodiffBackend,
    M: LearnerModel<B>,
    O: Optimizer<M, B> + 'static,
    L: LossFunction<B, M, T> + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create a learner.
    ///
    /// Validates the configuration and creates the checkpoint directory.
    /// Scalars go to the `log` facade at debug level until another sink is
    /// installed.
    pub fn new(config: LearnerConfig, model: M, optimizer: O, loss: L) -> Result<Self, LearnerError> {
        config.validate().map_err(LearnerError::InvalidConfig)?;

        let pools = TrajectoryPools::new();
        let metrics = learner_metrics();
        let checkpointer = Checkpointer::new(config.checkpoint_dir.clone(), config.model_kind.clone())?;

        log::info!(
            "Learner created: {} parameters, sampling {:?}, sample size {}, threshold {}, checkpoint {}",
            model.num_params(),
            config.sampling,
            config.sample_size(),
            config.buffer_threshold(),
            checkpointer.path().display()
        );

        let update = UpdateStep::new(
            config,
            pools.clone(),
            model,
            optimizer,
            loss,
            DeviceConfig::resolve(),
            Box::new(LogSink::with_level(log::Level::Debug)),
            checkpointer,
            Arc::clone(&metrics),
        );

        Ok(Self {
            update,
            pools,
            metrics,
            is_running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Send scalars to `sink` instead.
    pub fn with_sink(mut self, sink: impl ScalarSink + 'static) -> Self {
        self.update.set_sink(Box::new(sink));
        self
    }

    /// Log scalars and also write them to a CSV file under `metrics_dir`.
    pub fn with_csv_metrics(mut self) -> std::io::Result<Self> {
        let csv = CsvSink::in_run_dir(&self.update.config().metrics_dir)?;
        log::info!("Writing learner scalars to {}", csv.path().display());
        let sink = MultiSink::new()
            .add(LogSink::with_level(log::Level::Debug))
            .add(csv);
        self.update.set_sink(Box::new(sink));
        Ok(self)
    }

    /// Use a specific device for loss computation.
    pub fn with_device(mut self, device: DeviceConfig<B>) -> Self {
        self.update.set_device(device);
        self
    }

    /// Append to the ordinary pool.
    pub fn send_trajectory(&self, trajectory: T) {
        self.pools.send_trajectory(trajectory);
    }

    /// Append to the final pool.
    pub fn send_final_trajectory(&self, trajectory: T) {
        self.pools.send_final_trajectory(trajectory);
    }

    /// Append to the win pool.
    pub fn send_win_trajectory(&self, trajectory: T) {
        self.pools.send_win_trajectory(trajectory);
    }

    /// Shared pools; clone to hand them to producer threads.
    pub fn pools(&self) -> &TrajectoryPools<T> {
        &self.pools
    }

    /// The trainable model.
    pub fn parameters(&self) -> &M {
        self.update.model()
    }

    /// Number of trainable scalars in the model.
    pub fn parameter_count(&self) -> usize {
        self.update.model().num_params()
    }

    /// Configuration.
    pub fn config(&self) -> &LearnerConfig {
        self.update.config()
    }

    /// Current step counter.
    pub fn step(&self) -> u64 {
        self.update.step()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> LearnerStats {
        self.metrics.snapshot()
    }

    /// Always false before `start()`.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Run one update on the calling thread.
    pub fn update_parameters(&mut self) -> Result<Option<UpdateSummary>, LearnerError> {
        self.update.update_parameters()
    }

    /// Launch the run loop on a background thread and return immediately.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn the thread.
    pub fn start(self) -> LearnerHandle<M, T> {
        let (report_tx, report_rx) = crossbeam_channel::bounded(1);
        let pools = self.pools.clone();
        let metrics = Arc::clone(&self.metrics);
        let is_running = Arc::clone(&self.is_running);

        is_running.store(true, Ordering::SeqCst);

        let thread = std::thread::Builder::new()
            .name("IMPALA-Learner".to_string())
            .spawn(move || {
                let (report, model) = self.run_loop();
                if report_tx.send(report).is_err() {
                    log::debug!("Learner handle dropped before the run report was sent");
                }
                model
            })
            .expect("Failed to spawn learner thread");

        LearnerHandle {
            thread,
            pools,
            metrics,
            is_running,
            report_rx,
        }
    }

    fn run_loop(mut self) -> (RunReport, M) {
        let guard = RunningGuard(Arc::clone(&self.is_running));
        let ttl = self.update.config().max_time_for_training;
        let poll_interval = self.update.config().poll_interval;
        let threshold = self.update.config().buffer_threshold();

        log::info!(
            "Learner started: ttl {:?}, poll interval {:?}, threshold {}",
            ttl,
            poll_interval,
            threshold
        );

        let start = Instant::now();
        let mut updates = 0usize;

        let stop = loop {
            if start.elapsed() >= ttl {
                break StopReason::TimeToLive;
            }

            let iteration = panic::catch_unwind(AssertUnwindSafe(|| self.run_iteration(threshold)));
            match iteration {
                Ok(Ok(Some(summary))) => {
                    updates += 1;
                    log::debug!(
                        "Update {} done: step {}, mean loss {:.6}",
                        updates,
                        summary.step,
                        summary.mean_loss
                    );
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    log::error!("Learner update failed: {}", e);
                    break StopReason::Failed(e);
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    log::error!("Learner update panicked: {}", message);
                    break StopReason::Failed(LearnerError::Panicked(message));
                }
            }

            std::thread::sleep(poll_interval);
        };

        let report = RunReport {
            updates,
            steps: self.update.step(),
            elapsed: start.elapsed(),
            stop,
        };
        log::info!(
            "Learner stopped after {} updates ({:?}): {}",
            report.updates,
            report.elapsed,
            report.stop
        );

        drop(guard);
        (report, self.update.into_model())
    }

    fn run_iteration(&mut self, threshold: usize) -> Result<Option<UpdateSummary>, LearnerError> {
        let sizes = self.pools.sizes();
        log::debug!("Pool occupancy: {}", sizes);

        if sizes.ordinary >= threshold {
            self.update.update_parameters()
        } else {
            Ok(None)
        }
    }
}

/// Handle to a started learner.
pub struct LearnerHandle<M, T> {
    thread: JoinHandle<M>,
    pools: TrajectoryPools<T>,
    metrics: SharedLearnerMetrics,
    is_running: Arc<AtomicBool>,
    report_rx: Receiver<RunReport>,
}

impl<M, T> LearnerHandle<M, T> {
    /// Check if the run loop is still going.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> LearnerStats {
        self.metrics.snapshot()
    }

    /// Current pool sizes.
    pub fn pool_sizes(&self) -> PoolSizes {
        self.pools.sizes()
    }

    /// Shared pools; clone to hand them to producer threads.
    pub fn pools(&self) -> &TrajectoryPools<T> {
        &self.pools
    }

    /// Append to the ordinary pool.
    pub fn send_trajectory(&self, trajectory: T) {
        self.pools.send_trajectory(trajectory);
    }

    /// Append to the final pool.
    pub fn send_final_trajectory(&self, trajectory: T) {
        self.pools.send_final_trajectory(trajectory);
    }

    /// Append to the win pool.
    pub fn send_win_trajectory(&self, trajectory: T) {
        self.pools.send_win_trajectory(trajectory);
    }

    /// Take the run report if the loop has finished (non-blocking).
    ///
    /// The report is delivered once.
    pub fn try_report(&self) -> Option<RunReport> {
        self.report_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the run report.
    pub fn wait_report(&self, timeout: Duration) -> Option<RunReport> {
        match self.report_rx.recv_timeout(timeout) {
            Ok(report) => Some(report),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Wait for the learner thread to finish and take back the trained model.
    pub fn join(self) -> std::thread::Result<M> {
        self.thread.join()
    }
}
