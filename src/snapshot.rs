use crate::metric::{Metric, SourceError};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("метрика '{0}' встречается более одного раза")]
    DuplicateMetric(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SampleOutcome {
    Value(Metric),
    Failed { error: SourceError },
}

/// One slot of a snapshot: either the reading or the reason it is missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub name: String,
    pub outcome: SampleOutcome,
}

impl Sample {
    pub fn from_result(name: impl Into<String>, result: Result<Metric, SourceError>) -> Self {
        let name = name.into();
        let outcome = match result {
            Ok(metric) => SampleOutcome::Value(metric),
            Err(error) => SampleOutcome::Failed { error },
        };
        Self { name, outcome }
    }

    pub fn value(&self) -> Option<f64> {
        match &self.outcome {
            SampleOutcome::Value(metric) => Some(metric.value()),
            SampleOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&SourceError> {
        match &self.outcome {
            SampleOutcome::Value(_) => None,
            SampleOutcome::Failed { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    captured_at_unix_ms: i64,
    samples: Vec<Sample>,
}

impl Snapshot {
    pub fn new(captured_at_unix_ms: i64, samples: Vec<Sample>) -> Result<Self, SnapshotError> {
        let mut seen = HashSet::new();
        for sample in &samples {
            if !seen.insert(sample.name.as_str()) {
                return Err(SnapshotError::DuplicateMetric(sample.name.clone()));
            }
        }
        Ok(Self {
            captured_at_unix_ms,
            samples,
        })
    }

    /// For callers that already checked name uniqueness.
    pub(crate) fn from_unique(captured_at_unix_ms: i64, samples: Vec<Sample>) -> Self {
        Self {
            captured_at_unix_ms,
            samples,
        }
    }

    pub fn captured_at_unix_ms(&self) -> i64 {
        self.captured_at_unix_ms
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn get(&self, name: &str) -> Option<&Sample> {
        self.samples.iter().find(|s| s.name == name)
    }

    pub fn failed(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(|s| s.error().is_some())
    }
}
