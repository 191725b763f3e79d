//! Learner metrics.
//!
//! ## Counters
//!
//! - [`LearnerMetrics`]: Thread-safe progress counters
//! - [`LearnerStats`]: Snapshot readable from any thread
//!
//! ## Scalar sinks
//!
//! - [`LogSink`]: Scalars through the `log` facade
//! - [`CsvSink`]: CSV file per run
//! - [`MemorySink`]: In-memory records for inspection
//! - [`MultiSink`]: Combine multiple sinks

pub mod learner_metrics;
pub mod sink;

pub use learner_metrics::{learner_metrics, LearnerMetrics, LearnerStats, SharedLearnerMetrics};
pub use sink::{
    component_tag, CsvSink, LogSink, MemorySink, MultiSink, ScalarRecord, ScalarSink,
    LEARNER_TAG_PREFIX, TOTAL_LOSS_TAG,
};
