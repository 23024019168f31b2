use super::MetricSource;
use crate::metric::{ratio_percent, Metric, SourceError};
#[cfg(target_os = "linux")]
use std::fs;

#[cfg(target_os = "linux")]
const PROC_MEMINFO: &str = "/proc/meminfo";

#[derive(Debug, Clone, Default)]
pub struct MemorySource;

impl MemorySource {
    pub fn new() -> Self {
        Self
    }
}

impl MetricSource for MemorySource {
    fn name(&self) -> String {
        "memory".to_string()
    }

    fn sample(&self) -> Result<Metric, SourceError> {
        let usage = read_memory_usage()?;
        let pct = ratio_percent(usage.used_bytes, usage.total_bytes).ok_or_else(|| {
            SourceError::Unavailable("общий объём памяти равен 0".to_string())
        })?;
        Metric::percent(self.name(), pct)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl MemoryUsage {
    /// Used memory the way `free` reports it: `MemTotal - MemAvailable`,
    /// falling back to free+buffers+cached on kernels without MemAvailable.
    pub fn parse_meminfo(text: &str) -> Result<Self, SourceError> {
        let mut total = None;
        let mut available = None;
        let mut free = None;
        let mut buffers = None;
        let mut cached = None;

        for line in text.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let slot = match key.trim() {
                "MemTotal" => &mut total,
                "MemAvailable" => &mut available,
                "MemFree" => &mut free,
                "Buffers" => &mut buffers,
                "Cached" => &mut cached,
                _ => continue,
            };
            *slot = Some(parse_kib(key, rest)?);
        }

        let total_bytes =
            total.ok_or_else(|| SourceError::Parse("в meminfo нет MemTotal".to_string()))?;
        let available_bytes = match (available, free) {
            (Some(v), _) => v,
            (None, Some(free)) => free + buffers.unwrap_or(0) + cached.unwrap_or(0),
            (None, None) => {
                return Err(SourceError::Parse(
                    "в meminfo нет ни MemAvailable, ни MemFree".to_string(),
                ))
            }
        };

        Ok(Self {
            used_bytes: total_bytes.saturating_sub(available_bytes),
            total_bytes,
        })
    }
}

fn parse_kib(key: &str, rest: &str) -> Result<u64, SourceError> {
    let mut parts = rest.split_whitespace();
    let number = parts
        .next()
        .ok_or_else(|| SourceError::Parse(format!("{key}: пустое значение")))?;
    let value: u64 = number
        .parse()
        .map_err(|_| SourceError::Parse(format!("{key}: '{number}' не число")))?;
    match parts.next() {
        Some("kB") => Ok(value.saturating_mul(1024)),
        None => Ok(value),
        Some(unit) => Err(SourceError::Parse(format!(
            "{key}: неизвестная единица '{unit}'"
        ))),
    }
}

#[cfg(target_os = "linux")]
fn read_memory_usage() -> Result<MemoryUsage, SourceError> {
    let text = fs::read_to_string(PROC_MEMINFO)
        .map_err(|err| SourceError::Unavailable(format!("{PROC_MEMINFO}: {err}")))?;
    MemoryUsage::parse_meminfo(&text)
}

#[cfg(not(target_os = "linux"))]
fn read_memory_usage() -> Result<MemoryUsage, SourceError> {
    use sysinfo::{System, SystemExt};

    let mut system = System::new();
    system.refresh_memory();
    Ok(MemoryUsage {
        used_bytes: system.used_memory(),
        total_bytes: system.total_memory(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16000000 kB\n\
                           MemFree:         1000000 kB\n\
                           MemAvailable:    5760000 kB\n\
                           Buffers:          200000 kB\n\
                           Cached:          4000000 kB\n\
                           HugePages_Total:       0\n";

    #[test]
    fn used_is_total_minus_available() {
        let usage = MemoryUsage::parse_meminfo(MEMINFO).unwrap();
        assert_eq!(usage.total_bytes, 16_000_000 * 1024);
        assert_eq!(usage.used_bytes, (16_000_000 - 5_760_000) * 1024);
        let pct = ratio_percent(usage.used_bytes, usage.total_bytes).unwrap();
        assert_eq!(Metric::percent("memory", pct).unwrap().value(), 64.0);
    }

    #[test]
    fn falls_back_without_mem_available() {
        let text = "MemTotal: 1000 kB\nMemFree: 100 kB\nBuffers: 50 kB\nCached: 250 kB\n";
        let usage = MemoryUsage::parse_meminfo(text).unwrap();
        assert_eq!(usage.used_bytes, 600 * 1024);
    }

    #[test]
    fn missing_total_is_parse_error() {
        assert!(matches!(
            MemoryUsage::parse_meminfo("MemFree: 100 kB\n"),
            Err(SourceError::Parse(_))
        ));
        assert!(matches!(
            MemoryUsage::parse_meminfo("MemTotal: lots kB\n"),
            Err(SourceError::Parse(_))
        ));
    }

    #[test]
    fn zero_total_has_no_percentage() {
        let usage = MemoryUsage::parse_meminfo("MemTotal: 0 kB\nMemAvailable: 0 kB\n").unwrap();
        assert_eq!(ratio_percent(usage.used_bytes, usage.total_bytes), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn live_sample_is_in_range() {
        let metric = MemorySource::new()
            .sample()
            .expect("/proc/meminfo should be readable");
        assert!((0.0..=100.0).contains(&metric.value()));
        assert_eq!(metric.name(), "memory");
    }
}
