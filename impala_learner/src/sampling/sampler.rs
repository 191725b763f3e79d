//! Sample-batch selection over the three trajectory pools.

use crate::config::LearnerConfig;
use crate::core::pools::TrajectoryPools;
use crate::error::{LearnerError, PoolKind};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// How a sample batch is drawn from the pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplingStrategy {
    /// Head of the ordinary pool only.
    #[default]
    Uniform,
    /// Win and final quotas first, ordinary pool fills the rest.
    Mixed,
}

/// Quotas and retain limits of the mixed strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixedSamplingConfig {
    /// Share of the batch reserved for win trajectories
    pub win_ratio: f64,
    /// Share of the batch reserved for final trajectories
    pub final_ratio: f64,
    /// Win pool keeps drawn trajectories while it holds at most this many
    pub win_retain_limit: usize,
    /// Final pool keeps drawn trajectories while it holds at most this many
    pub final_retain_limit: usize,
}

impl Default for MixedSamplingConfig {
    fn default() -> Self {
        Self {
            win_ratio: 0.1,
            final_ratio: 0.2,
            win_retain_limit: 128,
            final_retain_limit: 64,
        }
    }
}

impl MixedSamplingConfig {
    /// Win and final quotas for a batch of `sample_size`.
    ///
    /// Each quota is at least 1, so ratios are only approximate for small
    /// batches. An empty pool still contributes nothing.
    pub fn quotas(&self, sample_size: usize) -> (usize, usize) {
        let quota = |ratio: f64| ((sample_size as f64 * ratio).floor() as usize).max(1);
        (quota(self.win_ratio), quota(self.final_ratio))
    }

    /// Validate ratios.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(0.0..=1.0).contains(&self.win_ratio) || !(0.0..=1.0).contains(&self.final_ratio) {
            return Err("mixed sampling ratios must be in [0, 1]");
        }
        if self.win_ratio + self.final_ratio > 1.0 {
            return Err("mixed sampling ratios must sum to at most 1");
        }
        Ok(())
    }
}

/// Number of trajectories a batch drew from each pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchComposition {
    /// Drawn from the ordinary pool
    pub ordinary: usize,
    /// Drawn from the final pool
    pub final_: usize,
    /// Drawn from the win pool
    pub win: usize,
}

impl BatchComposition {
    /// Total batch length.
    pub fn total(&self) -> usize {
        self.ordinary + self.final_ + self.win
    }
}

/// Trajectories selected for one update.
///
/// Order: win draws, then final draws, then ordinary draws.
#[derive(Debug, Clone)]
pub struct SampleBatch<T> {
    /// Selected trajectories
    pub trajectories: Vec<T>,
    /// Per-pool counts
    pub composition: BatchComposition,
}

impl<T> SampleBatch<T> {
    /// Number of trajectories.
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Contiguous mini-batch `index` of `batch_size` trajectories.
    pub fn mini_batch(&self, index: usize, batch_size: usize) -> &[T] {
        let start = (index * batch_size).min(self.trajectories.len());
        let end = ((index + 1) * batch_size).min(self.trajectories.len());
        &self.trajectories[start..end]
    }
}

/// Draws sample batches according to the configured strategy.
///
/// The sampler is the only consumer of the pools it reads. It owns its RNG so
/// that seeded runs are reproducible.
pub struct Sampler {
    strategy: SamplingStrategy,
    use_random_sample: bool,
    mixed: MixedSamplingConfig,
    rng: StdRng,
}

impl Sampler {
    /// Create a sampler.
    pub fn new(
        strategy: SamplingStrategy,
        use_random_sample: bool,
        mixed: MixedSamplingConfig,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            strategy,
            use_random_sample,
            mixed,
            rng,
        }
    }

    /// Create a sampler from the learner configuration.
    pub fn from_config(config: &LearnerConfig) -> Self {
        Self::new(
            config.sampling,
            config.use_random_sample,
            config.mixed.clone(),
            config.seed,
        )
    }

    /// Configured strategy.
    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    /// Draw `sample_size` trajectories with the configured strategy.
    pub fn sample<T: Clone>(
        &mut self,
        pools: &TrajectoryPools<T>,
        sample_size: usize,
    ) -> Result<SampleBatch<T>, LearnerError> {
        match self.strategy {
            SamplingStrategy::Uniform => self.sample_uniform(pools, sample_size),
            SamplingStrategy::Mixed => self.sample_mixed(pools, sample_size),
        }
    }

    /// Take the first `sample_size` trajectories of the ordinary pool.
    ///
    /// Fails without touching the pool when it holds fewer than `sample_size`.
    pub fn sample_uniform<T>(
        &mut self,
        pools: &TrajectoryPools<T>,
        sample_size: usize,
    ) -> Result<SampleBatch<T>, LearnerError> {
        let shuffle = self.use_random_sample;
        let rng = &mut self.rng;
        let trajectories = pools
            .ordinary()
            .with_storage(|items| Self::take_head(items, sample_size, shuffle, rng))?;

        Ok(SampleBatch {
            composition: BatchComposition {
                ordinary: trajectories.len(),
                ..Default::default()
            },
            trajectories,
        })
    }

    /// Outcome-balanced sample.
    ///
    /// Win and final trajectories are drawn first (up to their quotas, from a
    /// shuffled pool) and stay in their pool unless it is over its retain
    /// limit. The ordinary pool covers the remaining budget and is always
    /// consumed. All three pools are locked for the whole draw, so a shortfall
    /// of ordinary trajectories fails before any pool is shuffled or trimmed.
    pub fn sample_mixed<T: Clone>(
        &mut self,
        pools: &TrajectoryPools<T>,
        sample_size: usize,
    ) -> Result<SampleBatch<T>, LearnerError> {
        let (win_quota, final_quota) = self.mixed.quotas(sample_size);
        log::debug!(
            "Mixed sample of {} (win quota {}, final quota {}) from {}",
            sample_size,
            win_quota,
            final_quota,
            pools.sizes()
        );

        let win_limit = self.mixed.win_retain_limit;
        let final_limit = self.mixed.final_retain_limit;
        let shuffle = self.use_random_sample;
        let rng = &mut self.rng;

        pools.ordinary().with_storage(|ordinary_items| {
            pools.win().with_storage(|win_items| {
                pools.final_pool().with_storage(|final_items| {
                    let win = win_quota.min(win_items.len()).min(sample_size);
                    let final_ = final_quota
                        .min(final_items.len())
                        .min(sample_size - win);
                    let residual = sample_size - win - final_;
                    if ordinary_items.len() < residual {
                        return Err(LearnerError::InsufficientData {
                            pool: PoolKind::Ordinary,
                            requested: residual,
                            available: ordinary_items.len(),
                        });
                    }

                    let mut trajectories = Vec::with_capacity(sample_size);
                    Self::draw_class(win_items, win, win_limit, rng, &mut trajectories);
                    Self::draw_class(final_items, final_, final_limit, rng, &mut trajectories);
                    let ordinary_draw = Self::take_head(ordinary_items, residual, shuffle, rng)?;
                    let ordinary = ordinary_draw.len();
                    trajectories.extend(ordinary_draw);

                    Ok(SampleBatch {
                        trajectories,
                        composition: BatchComposition {
                            ordinary,
                            final_,
                            win,
                        },
                    })
                })
            })
        })
    }

    /// Shuffle a class pool, copy `take` items from its head and drop the
    /// copied head when the pool is over `retain_limit`.
    fn draw_class<T: Clone>(
        items: &mut Vec<T>,
        take: usize,
        retain_limit: usize,
        rng: &mut StdRng,
        out: &mut Vec<T>,
    ) {
        if items.is_empty() {
            return;
        }
        items.shuffle(rng);
        out.extend(items[..take].iter().cloned());

        if items.len() > retain_limit {
            items.drain(..take);
        }
    }

    /// Remove the first `n` items, or fail with the pool left as it was.
    fn take_head<T>(
        items: &mut Vec<T>,
        n: usize,
        shuffle: bool,
        rng: &mut StdRng,
    ) -> Result<Vec<T>, LearnerError> {
        if items.len() < n {
            return Err(LearnerError::InsufficientData {
                pool: PoolKind::Ordinary,
                requested: n,
                available: items.len(),
            });
        }
        if shuffle {
            items.shuffle(rng);
        }
        Ok(items.drain(..n).collect())
    }
}
