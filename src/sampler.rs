use crate::collectors::MetricSource;
use crate::metric::SourceError;
use crate::snapshot::{Sample, Snapshot, SnapshotError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::{task, time};
use tracing::{debug, warn};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs every configured source once per capture and joins the results into
/// a snapshot. A failing source never aborts the capture.
pub struct Sampler {
    slots: Vec<SourceSlot>,
    timeout: Duration,
    anchor: Instant,
    anchor_unix_ms: i64,
}

struct SourceSlot {
    source: Arc<dyn MetricSource>,
    // Set while a blocking call of this source is running, including one
    // that already timed out. At most one thread per source at a time.
    in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag when the blocking call returns or unwinds.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Sampler {
    pub fn new(
        sources: Vec<Arc<dyn MetricSource>>,
        timeout: Duration,
    ) -> Result<Self, SnapshotError> {
        let mut names = HashSet::new();
        for source in &sources {
            let name = source.name();
            if !names.insert(name.clone()) {
                return Err(SnapshotError::DuplicateMetric(name));
            }
        }
        let slots = sources
            .into_iter()
            .map(|source| SourceSlot {
                source,
                in_flight: Arc::new(AtomicBool::new(false)),
            })
            .collect();
        Ok(Self {
            slots,
            timeout,
            anchor: Instant::now(),
            anchor_unix_ms: now_unix_ms(),
        })
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.source.name()).collect()
    }

    pub async fn capture(&self) -> Snapshot {
        let captured_at_unix_ms = self.monotonic_unix_ms();
        let started = Instant::now();

        // Deadlines are fixed at spawn time, so the sources share one budget
        // rather than queueing behind each other.
        let pending: Vec<_> = self
            .slots
            .iter()
            .map(|slot| {
                let name = slot.source.name();
                if slot.in_flight.swap(true, Ordering::AcqRel) {
                    return (name, None);
                }
                let guard = InFlightGuard(Arc::clone(&slot.in_flight));
                let source = Arc::clone(&slot.source);
                let handle = task::spawn_blocking(move || {
                    let _guard = guard;
                    source.sample()
                });
                (name, Some(time::timeout(self.timeout, handle)))
            })
            .collect();

        let mut samples = Vec::with_capacity(pending.len());
        for (name, pending_sample) in pending {
            let result = match pending_sample {
                None => Err(SourceError::Unavailable(
                    "предыдущий замер ещё выполняется".to_string(),
                )),
                Some(pending_sample) => match pending_sample.await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => Err(SourceError::Unavailable(format!(
                        "источник завершился аварийно: {join_err}"
                    ))),
                    Err(_elapsed) => Err(SourceError::Unavailable(format!(
                        "нет ответа за {} мс",
                        self.timeout.as_millis()
                    ))),
                },
            };
            if let Err(err) = &result {
                warn!(metric = %name, error = %err, "metric source failed");
            }
            samples.push(Sample::from_result(name, result));
        }

        debug!(
            metrics = samples.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot captured"
        );
        Snapshot::from_unique(captured_at_unix_ms, samples)
    }

    fn monotonic_unix_ms(&self) -> i64 {
        let elapsed = self.anchor.elapsed().as_millis() as i64;
        self.anchor_unix_ms.saturating_add(elapsed)
    }
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
