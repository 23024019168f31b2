use crate::evaluator::{MetricVerdict, Status, Verdict};
use crate::metric::SourceError;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Plain,
    Detailed,
    Json,
    Log,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("ошибка сериализации JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("не удалось записать лог {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Reporter {
    format: ReportFormat,
    host_name: Option<String>,
}

impl Reporter {
    pub fn new(format: ReportFormat, host_name: Option<String>) -> Self {
        Self { format, host_name }
    }

    pub fn render(&self, verdict: &Verdict) -> Result<String, ReportError> {
        match self.format {
            ReportFormat::Plain => Ok(render_plain(verdict)),
            ReportFormat::Detailed => Ok(render_detailed(verdict, self.host_name.as_deref())),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(verdict)?),
            ReportFormat::Log => Ok(render_log_line(verdict)),
        }
    }
}

pub fn render_plain(verdict: &Verdict) -> String {
    let mut out = String::new();
    for m in &verdict.metrics {
        let _ = write!(
            out,
            "{}: {} (ceiling {}%) {}",
            m.name,
            value_text(m),
            fmt_pct(m.ceiling),
            m.status.as_str()
        );
        if let Some(err) = &m.error {
            let _ = write!(out, " - {err}");
        }
        out.push('\n');
    }
    let _ = write!(out, "Overall: {}", verdict.overall.as_str());
    out
}

pub fn render_detailed(verdict: &Verdict, host_name: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Host health report: {}", host_name.unwrap_or("unknown"));
    let _ = writeln!(out, "Captured at: {}", format_unix_ms(verdict.captured_at_unix_ms));
    out.push('\n');

    let width = verdict
        .metrics
        .iter()
        .map(|m| title(&m.name).len())
        .max()
        .unwrap_or(0);
    for m in &verdict.metrics {
        let _ = writeln!(
            out,
            "{:<width$}  {:>4}  ceiling {:>3}%  {:<8}  {}",
            title(&m.name),
            value_text(m),
            fmt_pct(m.ceiling),
            m.status.as_str(),
            explain(m),
        );
    }

    out.push('\n');
    let _ = write!(out, "Overall: {}", verdict.overall.as_str());
    if !verdict.failing_metrics.is_empty() {
        let _ = write!(out, "\nFailing: {}", verdict.failing_metrics.join(", "));
    }
    out
}

/// Single line for appending to a flat log file.
pub fn render_log_line(verdict: &Verdict) -> String {
    let mut out = format!(
        "{} overall={}",
        format_unix_ms(verdict.captured_at_unix_ms),
        verdict.overall.as_str()
    );
    for m in &verdict.metrics {
        match (&m.value, &m.error) {
            (Some(v), _) => {
                let _ = write!(out, " {}={}", m.name, fmt_pct(*v));
            }
            (None, Some(err)) => {
                let _ = write!(out, " {}=error:{:?}", m.name, err.to_string());
            }
            (None, None) => {
                let _ = write!(out, " {}=n/a", m.name);
            }
        }
    }
    let _ = write!(out, " failing={}", verdict.failing_metrics.join(","));
    out
}

pub fn append_log(path: &Path, verdict: &Verdict) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    writeln!(file, "{}", render_log_line(verdict)).map_err(io_err)
}

fn value_text(m: &MetricVerdict) -> String {
    match m.value {
        Some(v) => format!("{}%", fmt_pct(v)),
        None => "n/a".to_string(),
    }
}

fn explain(m: &MetricVerdict) -> String {
    match (m.value, &m.error) {
        (None, Some(SourceError::Unavailable(msg))) => format!("could not measure: {msg}"),
        (None, Some(SourceError::Parse(msg))) => format!("unreadable output: {msg}"),
        (None, None) => "no reading".to_string(),
        (Some(v), _) if m.status == Status::Ok => {
            format!("{} points of headroom", fmt_pct(m.ceiling - v))
        }
        (Some(v), _) if v == m.ceiling => "at the ceiling".to_string(),
        (Some(v), _) => format!("{} points over the ceiling", fmt_pct(v - m.ceiling)),
    }
}

fn title(name: &str) -> String {
    match name {
        "cpu" => "CPU usage".to_string(),
        "memory" => "Memory usage".to_string(),
        other => match other.strip_prefix("disk:") {
            Some(mount) => format!("Disk usage {mount}"),
            None => other.to_string(),
        },
    }
}

fn fmt_pct(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

fn format_unix_ms(ms: i64) -> String {
    let st = UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64);
    humantime::format_rfc3339_seconds(st).to_string()
}
