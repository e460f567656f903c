//! Metrics collection and exposition.
//!
//! # Metrics
//! - `user_service_login_attempts_total` (counter): login outcomes
//! - `user_service_rate_limited_total` (counter): requests refused by the limiter
//! - `user_service_token_rejections_total` (counter): bearer tokens that failed verification
//! - `user_service_uploads_total` (counter): avatar validation outcomes
//! - `user_service_rate_limit_buckets` (gauge): live rate limit buckets
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_login(outcome: &'static str) {
    counter!("user_service_login_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limited(scope: &'static str) {
    counter!("user_service_rate_limited_total", "scope" => scope).increment(1);
}

pub fn record_token_rejected(reason: &'static str) {
    counter!("user_service_token_rejections_total", "reason" => reason).increment(1);
}

pub fn record_upload(outcome: &'static str) {
    counter!("user_service_uploads_total", "outcome" => outcome).increment(1);
}

pub fn record_bucket_count(count: usize) {
    gauge!("user_service_rate_limit_buckets").set(count as f64);
}
