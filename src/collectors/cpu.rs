use super::MetricSource;
use crate::metric::{Metric, SourceError};
#[cfg(target_os = "linux")]
use std::fs;
use std::thread;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

#[cfg(target_os = "linux")]
const PROC_STAT: &str = "/proc/stat";

/// CPU busy share, computed as `100 - idle%` across a fixed window.
#[derive(Debug, Clone)]
pub struct CpuSource {
    window: Duration,
}

impl CpuSource {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

impl Default for CpuSource {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl MetricSource for CpuSource {
    fn name(&self) -> String {
        "cpu".to_string()
    }

    fn sample(&self) -> Result<Metric, SourceError> {
        let idle = sample_idle_percent(self.window)?;
        debug!(
            idle_percent = idle,
            window_ms = self.window.as_millis() as u64,
            "cpu idle sampled"
        );
        Metric::percent(self.name(), 100.0 - idle)
    }
}

/// Aggregate jiffy counters from the first `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

impl CpuTimes {
    pub fn parse(stat: &str) -> Result<Self, SourceError> {
        let line = stat
            .lines()
            .find(|l| l.split_whitespace().next() == Some("cpu"))
            .ok_or_else(|| SourceError::Parse("в /proc/stat нет строки 'cpu'".to_string()))?;

        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .map(|v| {
                v.parse::<u64>().map_err(|_| {
                    SourceError::Parse(format!("некорректное поле '{v}' в строке cpu"))
                })
            })
            .collect::<Result<_, _>>()?;
        if fields.len() < 4 {
            return Err(SourceError::Parse(format!(
                "в строке cpu {} полей, ожидалось не меньше 4",
                fields.len()
            )));
        }

        // user nice system idle iowait irq softirq steal; guest time is
        // already counted in user and nice. iowait is busy time, as in top's `wa`.
        let idle = fields[3];
        let total = fields.iter().take(8).sum();
        Ok(Self { idle, total })
    }
}

pub fn idle_percent_between(prev: CpuTimes, next: CpuTimes) -> Result<f64, SourceError> {
    let total = next.total.saturating_sub(prev.total);
    if total == 0 {
        return Err(SourceError::Unavailable(
            "счётчики CPU не изменились за окно измерения".to_string(),
        ));
    }
    let idle = next.idle.saturating_sub(prev.idle).min(total);
    Ok(idle as f64 / total as f64 * 100.0)
}

#[cfg(target_os = "linux")]
fn sample_idle_percent(window: Duration) -> Result<f64, SourceError> {
    let prev = read_cpu_times()?;
    thread::sleep(window);
    let next = read_cpu_times()?;
    idle_percent_between(prev, next)
}

#[cfg(target_os = "linux")]
fn read_cpu_times() -> Result<CpuTimes, SourceError> {
    let text = fs::read_to_string(PROC_STAT)
        .map_err(|err| SourceError::Unavailable(format!("{PROC_STAT}: {err}")))?;
    CpuTimes::parse(&text)
}

#[cfg(not(target_os = "linux"))]
fn sample_idle_percent(window: Duration) -> Result<f64, SourceError> {
    use sysinfo::{CpuExt, System, SystemExt};

    let mut system = System::new();
    system.refresh_cpu();
    thread::sleep(window.max(System::MINIMUM_CPU_UPDATE_INTERVAL));
    system.refresh_cpu();
    if system.cpus().is_empty() {
        return Err(SourceError::Unavailable(
            "sysinfo не вернул ни одного CPU".to_string(),
        ));
    }
    let usage = system.global_cpu_info().cpu_usage() as f64;
    Ok((100.0 - usage).clamp(0.0, 100.0))
}
