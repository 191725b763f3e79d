//! Model bound used by the learner.

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;

/// A trainable burn module the learner can own on its thread.
///
/// burn has no global train/eval switch: gradient tracking follows the
/// backend. Models with mode-dependent layers (dropout flags, recurrent
/// state resets) override [`LearnerModel::set_training`].
pub trait LearnerModel<B: AutodiffBackend>: AutodiffModule<B> + Send + 'static {
    /// Switch between training and evaluation mode.
    fn set_training(self, training: bool) -> Self {
        let _ = training;
        self
    }
}
