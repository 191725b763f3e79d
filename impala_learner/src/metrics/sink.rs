//! Scalar metric sinks.
//!
//! The learner emits `(tag, value, step)` triples. Tags are namespaced under
//! `learner/`, one per loss component plus `learner/loss` for the total.

use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Tag prefix for every scalar the learner emits.
pub const LEARNER_TAG_PREFIX: &str = "learner/";

/// Tag of the combined loss.
pub const TOTAL_LOSS_TAG: &str = "learner/loss";

/// Build the tag of a named loss component.
pub fn component_tag(name: &str) -> String {
    format!("{}{}", LEARNER_TAG_PREFIX, name)
}

/// Destination for scalar metrics.
pub trait ScalarSink: Send {
    /// Record one scalar.
    fn add_scalar(&mut self, tag: &str, value: f32, step: u64);

    /// Flush any buffered output.
    fn flush(&mut self) {}
}

/// Sink that forwards scalars to the `log` facade.
pub struct LogSink {
    level: log::Level,
}

impl LogSink {
    /// Log scalars at `Info`.
    pub fn new() -> Self {
        Self {
            level: log::Level::Info,
        }
    }

    /// Log scalars at a specific level.
    pub fn with_level(level: log::Level) -> Self {
        Self { level }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarSink for LogSink {
    fn add_scalar(&mut self, tag: &str, value: f32, step: u64) {
        log::log!(self.level, "{} = {:.6} @ step {}", tag, value, step);
    }
}

/// CSV file sink for offline analysis.
pub struct CsvSink {
    writer: BufWriter<File>,
    path: PathBuf,
    start_time: Instant,
}

impl CsvSink {
    /// Create a CSV sink writing to `path`.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "tag,value,step,elapsed_secs")?;

        Ok(Self {
            writer,
            path,
            start_time: Instant::now(),
        })
    }

    /// Create `<metrics_dir>/<YYYYmmdd-HHMMSS>/scalars.csv`.
    ///
    /// Every learner run gets its own timestamped directory.
    pub fn in_run_dir(metrics_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let dir = metrics_dir.as_ref().join(stamp);
        fs::create_dir_all(&dir)?;
        Self::new(dir.join("scalars.csv"))
    }

    /// Path of the CSV file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScalarSink for CsvSink {
    fn add_scalar(&mut self, tag: &str, value: f32, step: u64) {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        if let Err(e) = writeln!(self.writer, "{},{},{},{:.3}", tag, value, step, elapsed) {
            log::warn!("Failed to write scalar {} to {}: {}", tag, self.path.display(), e);
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::warn!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        self.flush();
    }
}

/// One recorded scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarRecord {
    pub tag: String,
    pub value: f32,
    pub step: u64,
}

/// In-memory sink. Clones share the same record list, so a host can keep one
/// clone for inspection while the learner thread owns another.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<ScalarRecord>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record so far.
    pub fn records(&self) -> Vec<ScalarRecord> {
        self.records.lock().clone()
    }

    /// Records with the given tag, in emission order.
    pub fn records_for(&self, tag: &str) -> Vec<ScalarRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.tag == tag)
            .cloned()
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScalarSink for MemorySink {
    fn add_scalar(&mut self, tag: &str, value: f32, step: u64) {
        self.records.lock().push(ScalarRecord {
            tag: tag.to_string(),
            value,
            step,
        });
    }
}

/// Sink that writes to several backends.
pub struct MultiSink {
    sinks: Vec<Box<dyn ScalarSink>>,
}

impl MultiSink {
    /// Create an empty multi-sink.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink.
    pub fn add<S: ScalarSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl Default for MultiSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarSink for MultiSink {
    fn add_scalar(&mut self, tag: &str, value: f32, step: u64) {
        for sink in &mut self.sinks {
            sink.add_scalar(tag, value, step);
        }
    }

    fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}
