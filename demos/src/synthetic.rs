//! Synthetic actors, a toy actor-critic network and a REINFORCE-with-baseline
//! loss, enough to drive the learner end to end without a game.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::{log_softmax, relu, softmax};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Int, Tensor, TensorData};
use impala_learner::{
    LearnerError, LearnerModel, LossFunction, LossOptions, LossOutput, Outcome, Trajectory,
    TrajectoryPools,
};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub const OBS_SIZE: usize = 4;
pub const N_ACTIONS: usize = 2;

const GAMMA: f32 = 0.99;
const ENTROPY_COEF: f32 = 0.01;
const BASELINE_COEF: f32 = 0.5;

// ============================================================================
// Trajectory Step
// ============================================================================

/// One environment step recorded by an actor.
#[derive(Debug, Clone)]
pub struct Step {
    pub obs: [f32; OBS_SIZE],
    pub action: usize,
    pub reward: f32,
}

// ============================================================================
// Network Definition
// ============================================================================

/// Two-head network: action logits and a value baseline.
#[derive(Module, Debug)]
pub struct ToyNet<B: Backend> {
    shared: Linear<B>,
    policy_head: Linear<B>,
    value_head: Linear<B>,
}

impl<B: Backend> ToyNet<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            shared: LinearConfig::new(OBS_SIZE, 32).init(device),
            policy_head: LinearConfig::new(32, N_ACTIONS).init(device),
            value_head: LinearConfig::new(32, 1).init(device),
        }
    }

    /// Forward pass returning (logits, values).
    pub fn forward(&self, obs: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let x = relu(self.shared.forward(obs));
        (self.policy_head.forward(x.clone()), self.value_head.forward(x))
    }
}

impl<B: AutodiffBackend> LearnerModel<B> for ToyNet<B> {}

// ============================================================================
// Loss
// ============================================================================

/// REINFORCE with a learned baseline.
///
/// Components: `policy`, `baseline`, `entropy`.
pub struct ReinforceLoss;

impl<B: AutodiffBackend> LossFunction<B, ToyNet<B>, Trajectory<Step>> for ReinforceLoss {
    fn compute(
        &mut self,
        model: &ToyNet<B>,
        batch: &[Trajectory<Step>],
        options: &LossOptions,
        device: &B::Device,
    ) -> Result<LossOutput<B>, LearnerError> {
        let mut obs = Vec::new();
        let mut actions = Vec::new();
        let mut returns = Vec::new();

        for trajectory in batch {
            let mut ret = 0.0f32;
            let mut traj_returns = Vec::with_capacity(trajectory.len());
            for step in trajectory.steps.iter().rev() {
                ret = step.reward + GAMMA * ret;
                traj_returns.push(ret);
            }
            traj_returns.reverse();

            for (step, ret) in trajectory.iter().zip(traj_returns) {
                obs.extend_from_slice(&step.obs);
                actions.push(step.action as i64);
                returns.push(ret);
            }
        }

        let n = actions.len();
        if n == 0 {
            return Err(LearnerError::loss("mini-batch holds no steps"));
        }

        let obs = Tensor::<B, 2>::from_data(TensorData::new(obs, [n, OBS_SIZE]), device);
        let actions = Tensor::<B, 2, Int>::from_data(TensorData::new(actions, [n, 1]), device);
        let returns = Tensor::<B, 2>::from_data(TensorData::new(returns, [n, 1]), device);

        let (logits, values) = model.forward(obs);

        let baseline_loss = (returns.clone() - values.clone()).powf_scalar(2.0).mean();
        let advantages = (returns - values).detach();

        let log_probs = log_softmax(logits.clone(), 1);
        let probs = softmax(logits, 1);
        let entropy = (probs * log_probs.clone()).sum_dim(1).neg().mean();
        let chosen = log_probs.gather(1, actions);
        let policy_loss = (chosen * advantages).neg().mean();

        let baseline_value: f32 = baseline_loss.clone().into_scalar().elem();
        let policy_value: f32 = policy_loss.clone().into_scalar().elem();
        let entropy_value: f32 = entropy.clone().into_scalar().elem();

        let loss = if options.only_update_baseline {
            baseline_loss.mul_scalar(BASELINE_COEF)
        } else {
            policy_loss + baseline_loss.mul_scalar(BASELINE_COEF) - entropy.mul_scalar(ENTROPY_COEF)
        };

        Ok(LossOutput::new(loss)
            .with_component("policy", policy_value)
            .with_component("baseline", baseline_value)
            .with_component("entropy", entropy_value))
    }
}

// ============================================================================
// Synthetic Actors
// ============================================================================

/// Counters shared by all synthetic actors.
#[derive(Debug, Default)]
pub struct ActorCounters {
    pub ordinary: AtomicUsize,
    pub final_: AtomicUsize,
    pub win: AtomicUsize,
}

/// Spawn `n_actors` threads producing random episodes until `stop` is set.
///
/// Rewards favour action 0 when the first observation is positive, so the
/// policy has something to learn.
pub fn spawn_actors(
    n_actors: usize,
    sequence_length: usize,
    pools: TrajectoryPools<Trajectory<Step>>,
    stop: Arc<AtomicBool>,
    counters: Arc<ActorCounters>,
) -> Vec<JoinHandle<()>> {
    (0..n_actors)
        .map(|actor_id| {
            let pools = pools.clone();
            let stop = Arc::clone(&stop);
            let counters = Arc::clone(&counters);
            std::thread::Builder::new()
                .name(format!("Actor-{}", actor_id))
                .spawn(move || {
                    let mut rng = rand::thread_rng();
                    while !stop.load(Ordering::Relaxed) {
                        let mut trajectory = Trajectory::with_capacity(actor_id, sequence_length);
                        let mut episode_return = 0.0;
                        for _ in 0..sequence_length {
                            let obs: [f32; OBS_SIZE] = std::array::from_fn(|_| rng.gen_range(-1.0..1.0));
                            let action = rng.gen_range(0..N_ACTIONS);
                            let good = (obs[0] > 0.0) == (action == 0);
                            let reward = if good { 1.0 } else { 0.0 };
                            episode_return += reward;
                            trajectory.push(Step { obs, action, reward });
                        }

                        let roll: f32 = rng.gen();
                        let outcome = if roll < 0.05 {
                            counters.win.fetch_add(1, Ordering::Relaxed);
                            Outcome::Win
                        } else if roll < 0.15 {
                            counters.final_.fetch_add(1, Ordering::Relaxed);
                            Outcome::Final
                        } else {
                            counters.ordinary.fetch_add(1, Ordering::Relaxed);
                            Outcome::Ordinary
                        };

                        pools.send_classified(trajectory.finish(outcome, episode_return));
                        std::thread::sleep(Duration::from_millis(2));
                    }
                })
                .expect("Failed to spawn actor thread")
        })
        .collect()
}
