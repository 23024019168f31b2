use crate::evaluator::{evaluate, Verdict};
use crate::policy::{PolicyError, ThresholdPolicy};
use crate::sampler::Sampler;
use tracing::info;

/// One full cycle: validate the policy, capture a snapshot, classify it.
/// An invalid policy is reported before any source is touched.
pub async fn run_health_check(
    policy: &ThresholdPolicy,
    sampler: &Sampler,
) -> Result<Verdict, PolicyError> {
    policy.validate()?;
    let snapshot = sampler.capture().await;
    let verdict = evaluate(&snapshot, policy)?;
    info!(
        overall = verdict.overall.as_str(),
        failing = ?verdict.failing_metrics,
        "health check finished"
    );
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Health, Status};
    use crate::metric::SourceError;
    use crate::sampler::tests::FixedSource;
    use crate::sampler::DEFAULT_SOURCE_TIMEOUT;

    #[tokio::test]
    async fn unavailable_disk_makes_host_unhealthy() {
        let sampler = Sampler::new(
            vec![
                FixedSource::value("cpu", 10.0),
                FixedSource::value("memory", 20.0),
                FixedSource::failing(
                    "disk:/",
                    SourceError::Unavailable("df: command not found".to_string()),
                ),
            ],
            DEFAULT_SOURCE_TIMEOUT,
        )
        .unwrap();

        let verdict = run_health_check(&ThresholdPolicy::default(), &sampler)
            .await
            .unwrap();
        assert_eq!(verdict.overall, Health::Unhealthy);
        assert_eq!(verdict.failing_metrics, ["disk:/"]);
        let disk = verdict.metric("disk:/").unwrap();
        assert_eq!(disk.status, Status::Critical);
        assert_eq!(
            disk.error,
            Some(SourceError::Unavailable("df: command not found".to_string()))
        );
    }

    #[tokio::test]
    async fn healthy_host() {
        let sampler = Sampler::new(
            vec![
                FixedSource::value("cpu", 10.0),
                FixedSource::value("memory", 20.0),
                FixedSource::value("disk:/", 30.0),
            ],
            DEFAULT_SOURCE_TIMEOUT,
        )
        .unwrap();

        let verdict = run_health_check(&ThresholdPolicy::with_default(60.0), &sampler)
            .await
            .unwrap();
        assert!(verdict.is_healthy());
        assert!(verdict.failing_metrics.is_empty());
    }

    #[tokio::test]
    async fn invalid_policy_fails_before_sampling() {
        let sampler = Sampler::new(vec![FixedSource::value("cpu", 10.0)], DEFAULT_SOURCE_TIMEOUT)
            .unwrap();
        let err = run_health_check(&ThresholdPolicy::with_default(-5.0), &sampler)
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::CeilingOutOfRange { .. }));
    }
}
