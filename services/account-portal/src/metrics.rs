//! Prometheus metrics exposition and per-request tracking
//!
//! - `portal_requests_total` (counter): labels `status`, `method`
//! - `portal_request_duration_seconds` (histogram): label `status`
//! - `portal_crm_calls_total` (counter): labels `operation`, `outcome`

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::{Instrument, info, info_span};

const DURATION_METRIC: &str = "portal_request_duration_seconds";

/// Bucket boundaries from 5ms to 60s; the CRM timeout is configurable up to
/// that range.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The duration metric gets explicit buckets so it renders as a histogram
/// (`_bucket` lines for `histogram_quantile()`) rather than a summary.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed request with status code and HTTP method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("portal_requests_total", "status" => status_str.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "status" => status_str).record(duration_secs);
}

/// Record one outbound call to the identity provider or the CRM API.
pub fn record_crm_call(operation: &'static str, outcome: &'static str) {
    metrics::counter!("portal_crm_calls_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}

/// Middleware: run each request inside a span carrying a fresh request id,
/// then record its status and duration.
pub async fn track(request: Request, next: Next) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let method = request.method().clone();
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
    );

    async move {
        let started = Instant::now();
        let response = next.run(request).await;
        let elapsed = started.elapsed();
        let status = response.status().as_u16();
        record_request(status, method.as_str(), elapsed.as_secs_f64());
        info!(status, duration_ms = elapsed.as_millis() as u64, "request completed");
        response
    }
    .instrument(span)
    .await
}
