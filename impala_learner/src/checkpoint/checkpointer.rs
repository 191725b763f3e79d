//! Model snapshots for the learner.
//!
//! One learner writes one checkpoint file, named after the model kind and the
//! learner start time, and overwrites it at the end of every update cycle:
//!
//! ```text
//! <checkpoint_dir>/<model_kind>_<YY-MM-DD_HH-MM-SS>.bin
//! ```

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Checkpoint file extension written by `BinFileRecorder`.
const CHECKPOINT_EXTENSION: &str = "bin";

/// Timestamp format of the checkpoint file name.
const STAMP_FORMAT: &str = "%y-%m-%d_%H-%M-%S";

/// Error type for checkpointing operations.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// Burn recorder error.
    Recorder(String),
    /// No checkpoints found.
    NoCheckpoints,
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::Recorder(e) => write!(f, "Recorder error: {}", e),
            CheckpointError::NoCheckpoints => write!(f, "No checkpoints found"),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

/// A checkpoint file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointInfo {
    /// Path to the checkpoint file.
    pub path: PathBuf,
    /// Learner start time encoded in the file name.
    pub stamp: String,
}

/// Writes and reads learner checkpoints.
#[derive(Debug, Clone)]
pub struct Checkpointer {
    checkpoint_dir: PathBuf,
    model_kind: String,
    path: PathBuf,
}

impl Checkpointer {
    /// Create a checkpointer stamped with the current local time.
    ///
    /// Creates the checkpoint directory if it doesn't exist.
    pub fn new(
        checkpoint_dir: impl Into<PathBuf>,
        model_kind: impl Into<String>,
    ) -> Result<Self, CheckpointError> {
        let stamp = chrono::Local::now().format(STAMP_FORMAT).to_string();
        Self::with_stamp(checkpoint_dir, model_kind, stamp)
    }

    /// Create a checkpointer with an explicit start stamp.
    pub fn with_stamp(
        checkpoint_dir: impl Into<PathBuf>,
        model_kind: impl Into<String>,
        stamp: impl AsRef<str>,
    ) -> Result<Self, CheckpointError> {
        let checkpoint_dir = checkpoint_dir.into();
        let model_kind = model_kind.into();
        fs::create_dir_all(&checkpoint_dir)?;

        let path = checkpoint_dir.join(format!(
            "{}_{}.{}",
            model_kind,
            stamp.as_ref(),
            CHECKPOINT_EXTENSION
        ));

        Ok(Self {
            checkpoint_dir,
            model_kind,
            path,
        })
    }

    /// Directory holding the checkpoints.
    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Model kind used as the file name prefix.
    pub fn model_kind(&self) -> &str {
        &self.model_kind
    }

    /// File this checkpointer writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the model, overwriting the previous snapshot of this learner.
    pub fn save<B: Backend, M: Module<B>>(&self, model: &M) -> Result<PathBuf, CheckpointError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        model
            .clone()
            .save_file(&self.path, &recorder)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))?;

        log::debug!("Checkpoint written to {}", self.path.display());
        Ok(self.path.clone())
    }

    /// Load a model from a checkpoint file.
    ///
    /// Burn loads records into an existing module, so a template built with
    /// the same architecture is required.
    pub fn load<B: Backend, M: Module<B>>(
        &self,
        model_template: M,
        path: &Path,
        device: &B::Device,
    ) -> Result<M, CheckpointError> {
        if !path.exists() {
            return Err(CheckpointError::NoCheckpoints);
        }
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        model_template
            .load_file(path, &recorder, device)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))
    }

    /// Load the most recent checkpoint of this model kind.
    pub fn load_latest<B: Backend, M: Module<B>>(
        &self,
        model_template: M,
        device: &B::Device,
    ) -> Result<(M, CheckpointInfo), CheckpointError> {
        let latest = self
            .list_checkpoints()?
            .pop()
            .ok_or(CheckpointError::NoCheckpoints)?;
        let model = self.load::<B, M>(model_template, &latest.path, device)?;
        Ok((model, latest))
    }

    /// List checkpoints of this model kind, oldest first.
    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointInfo>, CheckpointError> {
        let prefix = format!("{}_", self.model_kind);
        let suffix = format!(".{}", CHECKPOINT_EXTENSION);

        let mut checkpoints: Vec<CheckpointInfo> = fs::read_dir(&self.checkpoint_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                let filename = path.file_name()?.to_str()?;
                let stamp = filename.strip_prefix(&prefix)?.strip_suffix(&suffix)?;
                Some(CheckpointInfo {
                    stamp: stamp.to_string(),
                    path,
                })
            })
            .collect();

        // Fixed-width stamps sort chronologically.
        checkpoints.sort_by(|a, b| a.stamp.cmp(&b.stamp));
        Ok(checkpoints)
    }
}
