pub mod check;
pub mod collectors;
pub mod config;
pub mod evaluator;
pub mod http;
pub mod metric;
pub mod metrics;
pub mod policy;
pub mod report;
pub mod sampler;
pub mod snapshot;

pub use check::run_health_check;
pub use collectors::MetricSource;
pub use evaluator::{evaluate, Health, MetricVerdict, Status, Verdict};
pub use metric::{Metric, SourceError, Unit};
pub use policy::{PolicyError, ThresholdPolicy};
pub use sampler::Sampler;
pub use snapshot::{Sample, SampleOutcome, Snapshot, SnapshotError};
