use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Ceiling used when neither an override nor the policy default is set.
pub const FALLBACK_CEILING_PERCENT: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("порог '{metric}' = {value} вне диапазона 0..100")]
    CeilingOutOfRange { metric: String, value: f64 },
}

/// Maps metric names to the highest acceptable percentage.
///
/// Lookup order: exact metric name, then the metric family (the part before
/// `:`, so `disk` covers `disk:/var`), then `default_percent`, then 60.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ThresholdPolicy {
    #[serde(default)]
    pub default_percent: Option<f64>,
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
}

impl ThresholdPolicy {
    pub fn with_default(percent: f64) -> Self {
        Self {
            default_percent: Some(percent),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, metric: impl Into<String>, percent: f64) -> Self {
        self.overrides.insert(metric.into(), percent);
        self
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if let Some(value) = self.default_percent {
            check_ceiling("*", value)?;
        }
        for (metric, value) in &self.overrides {
            check_ceiling(metric, *value)?;
        }
        Ok(())
    }

    pub fn ceiling_for(&self, metric: &str) -> f64 {
        if let Some(v) = self.overrides.get(metric) {
            return *v;
        }
        if let Some((family, _)) = metric.split_once(':') {
            if let Some(v) = self.overrides.get(family) {
                return *v;
            }
        }
        self.default_percent.unwrap_or(FALLBACK_CEILING_PERCENT)
    }
}

fn check_ceiling(metric: &str, value: f64) -> Result<(), PolicyError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        return Ok(());
    }
    Err(PolicyError::CeilingOutOfRange {
        metric: metric.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_prefers_exact_then_family_then_default() {
        let policy = ThresholdPolicy::with_default(70.0)
            .with_override("disk", 85.0)
            .with_override("disk:/var", 95.0);

        assert_eq!(policy.ceiling_for("disk:/var"), 95.0);
        assert_eq!(policy.ceiling_for("disk:/"), 85.0);
        assert_eq!(policy.ceiling_for("cpu"), 70.0);
    }

    #[test]
    fn empty_policy_falls_back_to_sixty() {
        assert_eq!(ThresholdPolicy::default().ceiling_for("memory"), 60.0);
    }

    #[test]
    fn ceilings_outside_range_are_rejected() {
        let err = ThresholdPolicy::with_default(101.0).validate().unwrap_err();
        assert_eq!(
            err,
            PolicyError::CeilingOutOfRange {
                metric: "*".to_string(),
                value: 101.0
            }
        );

        let err = ThresholdPolicy::default()
            .with_override("memory", -1.0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("memory"));

        assert!(ThresholdPolicy::with_default(f64::NAN).validate().is_err());
    }

    #[test]
    fn bounds_are_inclusive() {
        ThresholdPolicy::with_default(0.0)
            .with_override("cpu", 100.0)
            .validate()
            .unwrap();
    }
}
