//! Trajectory type produced by actors and consumed by the learner.
//!
//! The learner itself is generic over the trajectory type stored in its pools.
//! `Trajectory<S>` is the ready-made container for hosts that only need a
//! sequence of steps tagged with the actor that produced it and the way the
//! episode ended.

/// How the episode that produced a trajectory ended.
///
/// The outcome selects the pool a trajectory is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    /// Trajectory cut from the middle of an episode.
    #[default]
    Ordinary,
    /// Last trajectory of an episode that did not end in a victory.
    Final,
    /// Last trajectory of an episode that ended in a victory.
    Win,
}

impl Outcome {
    /// Short lowercase name, used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ordinary => "ordinary",
            Outcome::Final => "final",
            Outcome::Win => "win",
        }
    }
}

/// Fixed sequence of steps recorded by one actor.
///
/// Trajectories are never mutated once handed to a pool.
#[derive(Debug, Clone)]
pub struct Trajectory<S> {
    /// Ordered steps (observation, action, reward, auxiliary state)
    pub steps: Vec<S>,
    /// Actor that produced this trajectory
    pub actor_id: usize,
    /// How the episode ended (`Ordinary` if it has not ended yet)
    pub outcome: Outcome,
    /// Total undiscounted return (if episode is complete)
    pub episode_return: Option<f32>,
}

impl<S> Trajectory<S> {
    /// Create a new empty trajectory.
    pub fn new(actor_id: usize) -> Self {
        Self {
            steps: Vec::new(),
            actor_id,
            outcome: Outcome::Ordinary,
            episode_return: None,
        }
    }

    /// Create a trajectory with room for `sequence_length` steps.
    pub fn with_capacity(actor_id: usize, sequence_length: usize) -> Self {
        Self {
            steps: Vec::with_capacity(sequence_length),
            actor_id,
            outcome: Outcome::Ordinary,
            episode_return: None,
        }
    }

    /// Append a step.
    pub fn push(&mut self, step: S) {
        self.steps.push(step);
    }

    /// Mark the trajectory as the end of an episode.
    pub fn finish(mut self, outcome: Outcome, episode_return: f32) -> Self {
        self.outcome = outcome;
        self.episode_return = Some(episode_return);
        self
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the trajectory has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterate over steps.
    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.steps.iter()
    }
}

impl<S> Default for Trajectory<S> {
    fn default() -> Self {
        Self::new(0)
    }
}
