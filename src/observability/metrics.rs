//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests received, by method
//! - `http_requests_in_flight` (gauge): requests currently being served
//! - `http_responses_total` (counter): responses sent, by method and status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `http_route_responses_total` (counter): responses by route template
//!
//! With the deprecated hooks enabled the unlabelled `http_request_count` and
//! `http_response_count` counters are emitted as well.

use std::sync::OnceLock;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUESTS_IN_FLIGHT: &str = "http_requests_in_flight";
pub const RESPONSES_TOTAL: &str = "http_responses_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const ROUTE_RESPONSES_TOTAL: &str = "http_route_responses_total";

const LEGACY_REQUEST_COUNT: &str = "http_request_count";
const LEGACY_RESPONSE_COUNT: &str = "http_response_count";

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the process-wide Prometheus recorder and return its handle.
///
/// Safe to call more than once; later calls return the same handle.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| match install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Metrics recorder not installed, scrapes will be empty");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), LATENCY_BUCKETS)?
        .install_recorder()
}

/// Switches shared by the two counting stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsHooks {
    pub legacy_counters: bool,
}

/// Request-count stage.
pub async fn count_requests(
    State(hooks): State<MetricsHooks>,
    request: Request,
    next: Next,
) -> Response {
    metrics::counter!(REQUESTS_TOTAL, "method" => request.method().to_string()).increment(1);
    if hooks.legacy_counters {
        metrics::counter!(LEGACY_REQUEST_COUNT).increment(1);
    }

    let in_flight = metrics::gauge!(REQUESTS_IN_FLIGHT);
    in_flight.increment(1.0);
    let response = next.run(request).await;
    in_flight.decrement(1.0);

    response
}

/// Response-count stage.
pub async fn count_responses(
    State(hooks): State<MetricsHooks>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(RESPONSES_TOTAL, "method" => method.clone(), "status" => status)
        .increment(1);
    metrics::histogram!(REQUEST_DURATION, "method" => method)
        .record(start.elapsed().as_secs_f64());
    if hooks.legacy_counters {
        metrics::counter!(LEGACY_RESPONSE_COUNT).increment(1);
    }

    response
}

/// Count a completed response under its route template.
pub fn record_route_response(route: &str, method: &str, status: u16) {
    metrics::counter!(
        ROUTE_RESPONSES_TOTAL,
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
