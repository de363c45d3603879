//! Relay metrics
//!
//! Emitted through the `metrics` facade; the binary installs the Prometheus
//! recorder. Without a recorder every call here is a no-op.
//!
//! - `relay_polls_total` (counter): label `outcome` (idle, delivered, failed)
//! - `relay_poll_duration_seconds` (histogram)
//! - `relay_donations_broadcast_total` (counter)
//! - `relay_deliveries_total` (counter): label `result` (delivered, failed, skipped)
//! - `relay_subscribers` (gauge)
//! - `relay_token_refresh_total` (counter): label `outcome`

use crate::broadcast::BroadcastReport;

pub const POLL_DURATION_METRIC: &str = "relay_poll_duration_seconds";

pub fn record_poll(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("relay_polls_total", "outcome" => outcome).increment(1);
    metrics::histogram!(POLL_DURATION_METRIC).record(duration_secs);
}

pub fn record_broadcast(report: &BroadcastReport) {
    metrics::counter!("relay_donations_broadcast_total").increment(1);
    for (result, count) in [
        ("delivered", report.delivered),
        ("failed", report.failed),
        ("skipped", report.skipped),
    ] {
        if count > 0 {
            metrics::counter!("relay_deliveries_total", "result" => result)
                .increment(count as u64);
        }
    }
}

pub fn set_subscribers(count: usize) {
    metrics::gauge!("relay_subscribers").set(count as f64);
}

pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("relay_token_refresh_total", "outcome" => outcome).increment(1);
}
