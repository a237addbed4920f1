//! Prometheus metrics for the request gatekeeper.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `clearsky_auth_decisions_total` - Gate decisions (labels: key_type, outcome)
//! - `clearsky_rate_limited_total` - Requests rejected with 429 (label: route)
//! - `clearsky_snapshot_pushes_total` - Snapshot pushes (labels: snapshot, status)
//!
//! ## Histograms
//! - `clearsky_authority_lookup_seconds` - Duration of API-key lookups (label: outcome)
//!
//! Recording functions are no-ops until [`init_metrics`] installs the exporter.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

use crate::models::KeyType;

/// Metric names as constants for consistency.
pub mod names {
    pub const AUTH_DECISIONS_TOTAL: &str = "clearsky_auth_decisions_total";
    pub const RATE_LIMITED_TOTAL: &str = "clearsky_rate_limited_total";
    pub const SNAPSHOT_PUSHES_TOTAL: &str = "clearsky_snapshot_pushes_total";
    pub const AUTHORITY_LOOKUP_SECONDS: &str = "clearsky_authority_lookup_seconds";
}

/// Initialize the Prometheus metrics exporter.
///
/// Starts the Prometheus HTTP listener on `metrics_addr` and registers
/// metric descriptions.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::AUTH_DECISIONS_TOTAL,
        "API-key gate decisions by key type and outcome"
    );
    describe_counter!(
        names::RATE_LIMITED_TOTAL,
        "Requests rejected by a per-route rate limiter"
    );
    describe_counter!(
        names::SNAPSHOT_PUSHES_TOTAL,
        "Stats snapshot pushes by snapshot and status"
    );
    describe_histogram!(
        names::AUTHORITY_LOOKUP_SECONDS,
        "Duration of API-key lookups against the authorization service"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record a gate decision. `outcome` is "allow" or a deny reason label.
pub fn record_auth_decision(key_type: KeyType, outcome: &'static str) {
    counter!(names::AUTH_DECISIONS_TOTAL, "key_type" => key_type.as_str(), "outcome" => outcome)
        .increment(1);
}

/// Record a 429 rejection.
pub fn record_rate_limited(route: &str) {
    counter!(names::RATE_LIMITED_TOTAL, "route" => route.to_string()).increment(1);
}

/// Record a snapshot push.
pub fn record_snapshot_push(snapshot: &'static str, status: &'static str) {
    counter!(names::SNAPSHOT_PUSHES_TOTAL, "snapshot" => snapshot, "status" => status)
        .increment(1);
}

/// Record how long an authority lookup took.
pub fn record_authority_lookup(outcome: &'static str, duration_secs: f64) {
    histogram!(names::AUTHORITY_LOOKUP_SECONDS, "outcome" => outcome).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These only verify the recorders don't panic without an installed exporter.

    #[test]
    fn test_record_auth_decision() {
        record_auth_decision(KeyType::Ui, "allow");
        record_auth_decision(KeyType::UiPush, "key_mismatch");
    }

    #[test]
    fn test_record_rate_limited() {
        record_rate_limited("/status");
    }

    #[test]
    fn test_record_snapshot_push() {
        record_snapshot_push("total-users", "success");
    }

    #[test]
    fn test_record_authority_lookup() {
        record_authority_lookup("ok", 0.012);
    }
}
