use serde::Serialize;
use thiserror::Error;

/// Failure of a single metric source. Recorded in the snapshot slot of that
/// metric instead of aborting the whole capture.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SourceError {
    #[error("источник недоступен: {0}")]
    Unavailable(String),
    #[error("не удалось разобрать значение: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    name: String,
    value: f64,
    unit: Unit,
}

impl Metric {
    /// Builds a percentage reading, rounded half away from zero to a whole
    /// percent. Anything that is not a finite value in 0..=100 is a parse error.
    pub fn percent(name: impl Into<String>, raw: f64) -> Result<Self, SourceError> {
        let name = name.into();
        if !raw.is_finite() {
            return Err(SourceError::Parse(format!(
                "{name}: значение {raw} не является числом"
            )));
        }
        let value = round_percent(raw);
        if !(0.0..=100.0).contains(&value) {
            return Err(SourceError::Parse(format!(
                "{name}: значение {raw} вне диапазона 0..100"
            )));
        }
        Ok(Self {
            name,
            value,
            unit: Unit::Percent,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }
}

pub fn round_percent(raw: f64) -> f64 {
    // f64::round rounds half-way cases away from zero.
    let rounded = raw.round();
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn ratio_percent(used: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(used as f64 / total as f64 * 100.0)
}
