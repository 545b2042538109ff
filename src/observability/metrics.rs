//! Prometheus metrics for the gateway.
//!
//! Provides metrics for:
//! - authentication and ACL decisions per vendor
//! - validator calls
//! - request latency per endpoint

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Global Prometheus handle for the metrics endpoint.
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system with the given configuration.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &seconds_from_ms(&config.latency_buckets_ms),
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?;

    let handle = builder.install_recorder().map_err(MetricsError::Install)?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

/// Convert millisecond buckets to seconds.
#[cfg(feature = "prometheus")]
fn seconds_from_ms(ms_buckets: &[f64]) -> Vec<f64> {
    ms_buckets.iter().map(|ms| ms / 1000.0).collect()
}

/// Get the Prometheus handle for rendering metrics.
#[cfg(feature = "prometheus")]
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record an authentication decision. `status` is `ok` or an error status label.
pub fn record_auth(company: &str, status: &'static str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "tollgate_auth_requests_total",
            "company" => company.to_string(),
            "status" => status
        )
        .increment(1);
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (company, status);
    }
}

/// Record an ACL decision.
pub fn record_acl(company: &str, access: &'static str, status: &'static str, topic_type: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "tollgate_acl_requests_total",
            "company" => company.to_string(),
            "access" => access,
            "status" => status,
            "topic_type" => topic_type.to_string()
        )
        .increment(1);
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (company, access, status, topic_type);
    }
}

/// Record a call to the external token validator.
pub fn record_validator(status: &'static str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("tollgate_validator_requests_total", "status" => status).increment(1);
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = status;
    }
}

/// Record how long an endpoint took to answer.
pub fn record_request_duration(endpoint: &'static str, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        histogram!("tollgate_request_duration_seconds", "endpoint" => endpoint)
            .record(duration_secs);
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (endpoint, duration_secs);
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
