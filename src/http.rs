use crate::check::run_health_check;
use crate::evaluator::Verdict;
use crate::metrics::Metrics;
use crate::policy::{PolicyError, ThresholdPolicy};
use crate::sampler::Sampler;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub sampler: Arc<Sampler>,
    pub policy: Arc<ThresholdPolicy>,
    // Held for the whole cycle so that concurrent requests never overlap
    // sampling windows on the same host.
    cycle: Arc<Mutex<()>>,
}

impl HttpAppState {
    pub fn new(metrics: Arc<Metrics>, sampler: Arc<Sampler>, policy: ThresholdPolicy) -> Self {
        Self {
            metrics,
            sampler,
            policy: Arc::new(policy),
            cycle: Arc::new(Mutex::new(())),
        }
    }

    async fn check(&self) -> Result<Verdict, PolicyError> {
        let _guard = self.cycle.lock().await;
        let verdict = run_health_check(&self.policy, &self.sampler).await?;
        self.metrics.update_from_verdict(&verdict);
        Ok(verdict)
    }
}

pub fn build_router(state: HttpAppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/api/verdict", get(verdict_handler))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn verdict_handler(State(state): State<HttpAppState>) -> Response {
    match state.check().await {
        Ok(verdict) => {
            let status = if verdict.is_healthy() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            (status, Json(verdict)).into_response()
        }
        Err(err) => policy_error_response(err),
    }
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    if let Err(err) = state.check().await {
        return policy_error_response(err);
    }
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("ошибка кодирования метрик: {err}"),
        )
            .into_response(),
    }
}

fn policy_error_response(err: PolicyError) -> Response {
    error!(error = %err, "некорректная политика порогов");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("некорректная политика порогов: {err}"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::SourceError;
    use crate::sampler::tests::FixedSource;
    use crate::sampler::DEFAULT_SOURCE_TIMEOUT;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(disk: f64, policy: ThresholdPolicy) -> Router {
        let sampler = Sampler::new(
            vec![
                FixedSource::value("cpu", 10.0),
                FixedSource::value("memory", 20.0),
                FixedSource::value("disk:/", disk),
            ],
            DEFAULT_SOURCE_TIMEOUT,
        )
        .unwrap();
        let metrics = Metrics::new().expect("инициализация метрик");
        build_router(HttpAppState::new(metrics, Arc::new(sampler), policy))
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (status, body) = get_body(app(30.0, ThresholdPolicy::default()), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn verdict_is_ok_when_healthy() {
        let (status, body) = get_body(app(30.0, ThresholdPolicy::default()), "/api/verdict").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"overall\":\"Healthy\""));
    }

    #[tokio::test]
    async fn verdict_is_503_when_unhealthy() {
        let (status, body) = get_body(app(78.0, ThresholdPolicy::default()), "/api/verdict").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("\"failing_metrics\":[\"disk:/\"]"));
    }

    #[tokio::test]
    async fn unmeasured_metric_is_503() {
        let sampler = Sampler::new(
            vec![FixedSource::failing(
                "memory",
                SourceError::Unavailable("permission denied".to_string()),
            )],
            DEFAULT_SOURCE_TIMEOUT,
        )
        .unwrap();
        let metrics = Metrics::new().expect("инициализация метрик");
        let router = build_router(HttpAppState::new(
            metrics,
            Arc::new(sampler),
            ThresholdPolicy::default(),
        ));
        let (status, body) = get_body(router, "/api/verdict").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("permission denied"));
    }

    #[tokio::test]
    async fn metrics_runs_a_check() {
        let (status, body) = get_body(app(30.0, ThresholdPolicy::default()), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("hostcheck_healthy 1"));
        assert!(body.contains("hostcheck_metric_percent{metric=\"disk:/\"} 30"));
    }

    #[tokio::test]
    async fn invalid_policy_is_server_error() {
        let router = app(30.0, ThresholdPolicy::with_default(500.0));
        let (status, _) = get_body(router, "/api/verdict").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
