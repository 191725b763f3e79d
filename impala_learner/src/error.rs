//! Learner error type.

use crate::checkpoint::CheckpointError;
use std::fmt;

/// Pool a sample was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Ordinary,
    Final,
    Win,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Ordinary => write!(f, "ordinary"),
            PoolKind::Final => write!(f, "final"),
            PoolKind::Win => write!(f, "win"),
        }
    }
}

/// Errors raised while sampling, training or checkpointing.
///
/// None of these are retried: the run loop stops on the first one.
#[derive(Debug)]
pub enum LearnerError {
    /// A sample asked for more trajectories than the pool holds.
    InsufficientData {
        pool: PoolKind,
        requested: usize,
        available: usize,
    },
    /// The external loss computation failed.
    Loss(String),
    /// The loss evaluated to NaN or infinity.
    NonFiniteLoss { step: u64, value: f32 },
    /// Writing the checkpoint failed.
    Checkpoint(CheckpointError),
    /// A panic was caught inside a run-loop iteration.
    Panicked(String),
    /// The configuration was rejected by `LearnerConfig::validate`.
    InvalidConfig(&'static str),
}

impl LearnerError {
    /// Convenience constructor for loss implementations.
    pub fn loss(message: impl Into<String>) -> Self {
        LearnerError::Loss(message.into())
    }
}

impl fmt::Display for LearnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearnerError::InsufficientData {
                pool,
                requested,
                available,
            } => write!(
                f,
                "Insufficient data in {} pool: requested {}, available {}",
                pool, requested, available
            ),
            LearnerError::Loss(e) => write!(f, "Loss computation failed: {}", e),
            LearnerError::NonFiniteLoss { step, value } => {
                write!(f, "Non-finite loss {} at step {}", value, step)
            }
            LearnerError::Checkpoint(e) => write!(f, "Checkpoint error: {}", e),
            LearnerError::Panicked(e) => write!(f, "Learner iteration panicked: {}", e),
            LearnerError::InvalidConfig(e) => write!(f, "Invalid LearnerConfig: {}", e),
        }
    }
}

impl std::error::Error for LearnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LearnerError::Checkpoint(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CheckpointError> for LearnerError {
    fn from(e: CheckpointError) -> Self {
        LearnerError::Checkpoint(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_insufficient_data() {
        let e = LearnerError::InsufficientData {
            pool: PoolKind::Ordinary,
            requested: 32,
            available: 8,
        };
        assert_eq!(
            e.to_string(),
            "Insufficient data in ordinary pool: requested 32, available 8"
        );
    }

    #[test]
    fn test_checkpoint_error_source() {
        use std::error::Error;

        let e: LearnerError = CheckpointError::NoCheckpoints.into();
        assert!(e.source().is_some());
    }
}
