use crate::evaluator::{Status, Verdict};
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub hostcheck_metric_percent: GaugeVec,
    pub hostcheck_metric_ceiling_percent: GaugeVec,
    pub hostcheck_metric_ok: GaugeVec,
    pub hostcheck_metric_sample_error: GaugeVec,
    pub hostcheck_healthy: Gauge,
    pub hostcheck_failing_metrics: Gauge,
    pub hostcheck_last_check_timestamp_seconds: Gauge,
    pub hostcheck_checks_total: Counter,
    pub hostcheck_source_errors_total: CounterVec,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let hostcheck_metric_percent = GaugeVec::new(
            opts!(
                "hostcheck_metric_percent",
                "Last sampled value in percent by metric"
            ),
            &["metric"],
        )?;
        let hostcheck_metric_ceiling_percent = GaugeVec::new(
            opts!(
                "hostcheck_metric_ceiling_percent",
                "Configured ceiling in percent by metric"
            ),
            &["metric"],
        )?;
        let hostcheck_metric_ok = GaugeVec::new(
            opts!(
                "hostcheck_metric_ok",
                "1 when the metric is below its ceiling, 0 when CRITICAL"
            ),
            &["metric"],
        )?;
        let hostcheck_metric_sample_error = GaugeVec::new(
            opts!(
                "hostcheck_metric_sample_error",
                "1 when the metric could not be measured in the last check"
            ),
            &["metric"],
        )?;
        let hostcheck_healthy = Gauge::with_opts(opts!(
            "hostcheck_healthy",
            "1 when the last verdict was Healthy"
        ))?;
        let hostcheck_failing_metrics = Gauge::with_opts(opts!(
            "hostcheck_failing_metrics",
            "Number of metrics failing in the last verdict"
        ))?;
        let hostcheck_last_check_timestamp_seconds = Gauge::with_opts(opts!(
            "hostcheck_last_check_timestamp_seconds",
            "Capture time of the last snapshot (unix seconds)"
        ))?;
        let hostcheck_checks_total = Counter::with_opts(opts!(
            "hostcheck_checks_total",
            "Health checks run since start"
        ))?;
        let hostcheck_source_errors_total = CounterVec::new(
            opts!(
                "hostcheck_source_errors_total",
                "Metric source failures by metric"
            ),
            &["metric"],
        )?;

        register(&registry, &hostcheck_metric_percent)?;
        register(&registry, &hostcheck_metric_ceiling_percent)?;
        register(&registry, &hostcheck_metric_ok)?;
        register(&registry, &hostcheck_metric_sample_error)?;
        register(&registry, &hostcheck_healthy)?;
        register(&registry, &hostcheck_failing_metrics)?;
        register(&registry, &hostcheck_last_check_timestamp_seconds)?;
        register(&registry, &hostcheck_checks_total)?;
        register(&registry, &hostcheck_source_errors_total)?;

        Ok(Arc::new(Self {
            registry,
            hostcheck_metric_percent,
            hostcheck_metric_ceiling_percent,
            hostcheck_metric_ok,
            hostcheck_metric_sample_error,
            hostcheck_healthy,
            hostcheck_failing_metrics,
            hostcheck_last_check_timestamp_seconds,
            hostcheck_checks_total,
            hostcheck_source_errors_total,
        }))
    }

    pub fn update_from_verdict(&self, verdict: &Verdict) {
        self.hostcheck_checks_total.inc();
        // Drop series of metrics that vanished since the previous verdict.
        self.hostcheck_metric_percent.reset();
        self.hostcheck_metric_ceiling_percent.reset();
        self.hostcheck_metric_ok.reset();
        self.hostcheck_metric_sample_error.reset();

        for m in &verdict.metrics {
            let labels = [m.name.as_str()];
            if let Some(v) = m.value {
                self.hostcheck_metric_percent.with_label_values(&labels).set(v);
            }
            self.hostcheck_metric_ceiling_percent
                .with_label_values(&labels)
                .set(m.ceiling);
            self.hostcheck_metric_ok
                .with_label_values(&labels)
                .set(bool_gauge(m.status == Status::Ok));
            self.hostcheck_metric_sample_error
                .with_label_values(&labels)
                .set(bool_gauge(m.error.is_some()));
            if m.error.is_some() {
                self.hostcheck_source_errors_total
                    .with_label_values(&labels)
                    .inc();
            }
        }

        self.hostcheck_healthy.set(bool_gauge(verdict.is_healthy()));
        self.hostcheck_failing_metrics
            .set(verdict.failing_metrics.len() as f64);
        self.hostcheck_last_check_timestamp_seconds
            .set(verdict.captured_at_unix_ms as f64 / 1000.0);
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn bool_gauge(v: bool) -> f64 {
    if v {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::metric::{Metric, SourceError};
    use crate::policy::ThresholdPolicy;
    use crate::snapshot::{Sample, Snapshot};

    #[test]
    fn exposes_verdict_per_metric() {
        let snapshot = Snapshot::new(
            2_000,
            vec![
                Sample::from_result("cpu", Metric::percent("cpu", 12.0)),
                Sample::from_result(
                    "disk:/",
                    Err(SourceError::Parse("garbage".to_string())),
                ),
            ],
        )
        .unwrap();
        let verdict = evaluate(&snapshot, &ThresholdPolicy::default()).unwrap();

        let metrics = Metrics::new().expect("инициализация метрик");
        metrics.update_from_verdict(&verdict);
        let text = String::from_utf8(metrics.encode_metrics().unwrap()).unwrap();

        assert!(text.contains("hostcheck_metric_percent{metric=\"cpu\"} 12"));
        assert!(text.contains("hostcheck_metric_ok{metric=\"cpu\"} 1"));
        assert!(text.contains("hostcheck_metric_ok{metric=\"disk:/\"} 0"));
        assert!(text.contains("hostcheck_metric_sample_error{metric=\"disk:/\"} 1"));
        assert!(!text.contains("hostcheck_metric_percent{metric=\"disk:/\"}"));
        assert!(text.contains("hostcheck_healthy 0"));
        assert!(text.contains("hostcheck_last_check_timestamp_seconds 2"));
        assert!(text.contains("hostcheck_source_errors_total{metric=\"disk:/\"} 1"));
    }
}
