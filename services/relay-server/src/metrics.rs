//! Prometheus metrics exposition
//!
//! Installs the recorder that backs the relay metrics emitted by
//! `donation_relay::telemetry`, and records the OAuth metrics owned by this
//! service:
//!
//! - `relay_oauth_exchanges_total` (counter): label `outcome`
//! - `relay_http_requests_total` (counter): labels `route`, `status`

use donation_relay::telemetry::POLL_DURATION_METRIC;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Poll latency buckets, 10ms to 30s. A poll is one upstream GET plus fan-out.
const POLL_DURATION_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(POLL_DURATION_METRIC.to_string()),
            POLL_DURATION_BUCKETS,
        )
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format served on `/metrics`.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record the result of one OAuth callback.
pub fn record_exchange(outcome: &'static str) {
    metrics::counter!("relay_oauth_exchanges_total", "outcome" => outcome).increment(1);
}

/// Record a handled request on one of the OAuth/token routes.
pub fn record_request(route: &'static str, status: u16) {
    metrics::counter!("relay_http_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
}
