use crate::metric::SourceError;
use crate::policy::{PolicyError, ThresholdPolicy};
use crate::snapshot::{SampleOutcome, Snapshot};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Health {
    Healthy,
    Unhealthy,
}

impl Health {
    pub fn as_str(self) -> &'static str {
        match self {
            Health::Healthy => "Healthy",
            Health::Unhealthy => "Unhealthy",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Health::Healthy => 0,
            Health::Unhealthy => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Critical,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricVerdict {
    pub name: String,
    pub value: Option<f64>,
    pub ceiling: f64,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SourceError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub overall: Health,
    pub captured_at_unix_ms: i64,
    pub metrics: Vec<MetricVerdict>,
    pub failing_metrics: Vec<String>,
}

impl Verdict {
    pub fn is_healthy(&self) -> bool {
        self.overall == Health::Healthy
    }

    pub fn metric(&self, name: &str) -> Option<&MetricVerdict> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

/// Classifies a snapshot. A reading is OK only while strictly below its
/// ceiling; a slot without a reading is always CRITICAL.
pub fn evaluate(snapshot: &Snapshot, policy: &ThresholdPolicy) -> Result<Verdict, PolicyError> {
    policy.validate()?;

    let metrics: Vec<MetricVerdict> = snapshot
        .samples()
        .iter()
        .map(|sample| {
            let ceiling = policy.ceiling_for(&sample.name);
            let (value, status, error) = match &sample.outcome {
                SampleOutcome::Value(metric) => {
                    let v = metric.value();
                    let status = if v < ceiling {
                        Status::Ok
                    } else {
                        Status::Critical
                    };
                    (Some(v), status, None)
                }
                SampleOutcome::Failed { error } => (None, Status::Critical, Some(error.clone())),
            };
            MetricVerdict {
                name: sample.name.clone(),
                value,
                ceiling,
                status,
                error,
            }
        })
        .collect();

    let failing_metrics: Vec<String> = metrics
        .iter()
        .filter(|m| m.status != Status::Ok)
        .map(|m| m.name.clone())
        .collect();
    let overall = if failing_metrics.is_empty() {
        Health::Healthy
    } else {
        Health::Unhealthy
    };

    Ok(Verdict {
        overall,
        captured_at_unix_ms: snapshot.captured_at_unix_ms(),
        metrics,
        failing_metrics,
    })
}
