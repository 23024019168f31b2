pub mod cpu;
pub mod disk;
pub mod memory;

use crate::config::SamplingConfig;
use crate::metric::{Metric, SourceError};
use std::sync::Arc;
use std::time::Duration;

pub use cpu::CpuSource;
pub use disk::DiskSource;
pub use memory::MemorySource;

/// One OS measurement facility. `sample` may block (the CPU source waits out
/// its window), so callers run it off the async executor.
pub trait MetricSource: Send + Sync {
    fn name(&self) -> String;
    fn sample(&self) -> Result<Metric, SourceError>;
}

pub fn build_sources(cfg: &SamplingConfig) -> Vec<Arc<dyn MetricSource>> {
    let mut sources: Vec<Arc<dyn MetricSource>> = Vec::new();
    if cfg.cpu {
        sources.push(Arc::new(CpuSource::new(Duration::from_millis(
            cfg.cpu_window_ms,
        ))));
    }
    if cfg.memory {
        sources.push(Arc::new(MemorySource::new()));
    }
    for mount in &cfg.disk_mounts {
        sources.push(Arc::new(DiskSource::new(mount)));
    }
    sources
}
