//! # Metrics Collection
//!
//! Prometheus metrics for the credential lifecycle and the ThingsDB link.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, ProvisioningStep, Result};
use ::tracing::{info, warn};
use lazy_static::lazy_static;
use metrics::{counter, describe_counter, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::RwLock;

/// Metrics recorder that tracks application metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record an HTTP request
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration: f64) {
        let labels = [
            ("method", method.to_string()),
            ("path", path.to_string()),
            ("status", status.to_string()),
        ];
        counter!("http_requests_total", &labels).increment(1);

        let duration_labels = [("method", method.to_string()), ("path", path.to_string())];
        histogram!("http_request_duration_seconds", &duration_labels).record(duration);
    }

    /// Record a credential issued under `role`
    pub fn record_credential_issued(&self, role: &str) {
        let labels = [("role", role.to_string())];
        counter!("credentials_issued_total", &labels).increment(1);
    }

    pub fn record_credential_revoked(&self) {
        counter!("credentials_revoked_total").increment(1);
    }

    pub fn record_credential_renewed(&self, role: &str) {
        let labels = [("role", role.to_string())];
        counter!("credentials_renewed_total", &labels).increment(1);
    }

    /// Record a failed provisioning step
    pub fn record_provisioning_failure(&self, step: ProvisioningStep) {
        let labels = [("step", step.as_str().to_string())];
        counter!("provisioning_failures_total", &labels).increment(1);
    }

    /// Record the outcome of a connection attempt (`success`, `rejected`, `unreachable`)
    pub fn record_connection_attempt(&self, outcome: &str) {
        let labels = [("outcome", outcome.to_string())];
        counter!("thingsdb_connections_total", &labels).increment(1);
    }

    /// Register descriptions so Prometheus exports appear before events occur.
    pub fn register_credential_metrics(&self) {
        describe_counter!(
            "credentials_issued_total",
            Unit::Count,
            "Credentials issued, labelled by role"
        );
        describe_counter!("credentials_revoked_total", Unit::Count, "Credentials revoked");
        describe_counter!(
            "credentials_renewed_total",
            Unit::Count,
            "Lease renewals, labelled by role"
        );
        describe_counter!(
            "provisioning_failures_total",
            Unit::Count,
            "Failed provisioning steps, labelled by step"
        );
        describe_counter!(
            "thingsdb_connections_total",
            Unit::Count,
            "ThingsDB connection attempts grouped by outcome"
        );

        counter!("credentials_revoked_total").absolute(0);
        for step in [ProvisioningStep::CreateUser, ProvisioningStep::Grant, ProvisioningStep::NewToken]
        {
            counter!("provisioning_failures_total", "step" => step.as_str()).absolute(0);
        }
        for outcome in ["success", "rejected", "unreachable"] {
            counter!("thingsdb_connections_total", "outcome" => outcome).absolute(0);
        }
    }
}

lazy_static! {
    static ref METRICS: RwLock<Option<MetricsRecorder>> = RwLock::new(None);
}

/// Install the Prometheus exporter and the global recorder.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.enable_metrics {
        return Ok(());
    }

    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => {
            warn!("Metrics disabled: no bind address configured");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        Error::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| Error::config(format!("Failed to initialize metrics exporter: {}", e)))?;

    let recorder = MetricsRecorder::new();
    recorder.register_credential_metrics();
    if let Ok(mut slot) = METRICS.write() {
        *slot = Some(recorder);
    }

    info!(
        metrics_addr = %metrics_addr,
        service_name = %config.service_name,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

/// Global recorder, if metrics were initialised
pub fn get_metrics() -> Option<MetricsRecorder> {
    METRICS.read().ok().and_then(|slot| slot.clone())
}

/// Record an HTTP request via the global recorder
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    if let Some(metrics) = get_metrics() {
        metrics.record_http_request(method, path, status, duration);
    }
}

/// Record an issued credential via the global recorder
pub fn record_credential_issued(role: &str) {
    if let Some(metrics) = get_metrics() {
        metrics.record_credential_issued(role);
    }
}

/// Record a revocation via the global recorder
pub fn record_credential_revoked() {
    if let Some(metrics) = get_metrics() {
        metrics.record_credential_revoked();
    }
}

/// Record a renewal via the global recorder
pub fn record_credential_renewed(role: &str) {
    if let Some(metrics) = get_metrics() {
        metrics.record_credential_renewed(role);
    }
}

/// Record a failed provisioning step via the global recorder
pub fn record_provisioning_failure(step: ProvisioningStep) {
    if let Some(metrics) = get_metrics() {
        metrics.record_provisioning_failure(step);
    }
}

/// Record a connection attempt via the global recorder
pub fn record_connection_attempt(outcome: &str) {
    if let Some(metrics) = get_metrics() {
        metrics.record_connection_attempt(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let recorder = MetricsRecorder::new();

        recorder.record_http_request("GET", "/v1/creds/:name", 200, 0.012);
        recorder.record_credential_issued("reader");
        recorder.record_credential_revoked();
        recorder.record_credential_renewed("reader");
        recorder.record_provisioning_failure(ProvisioningStep::Grant);
        recorder.record_connection_attempt("success");
        recorder.register_credential_metrics();
    }

    #[test]
    fn test_global_helpers_without_recorder() {
        record_credential_issued("reader");
        record_connection_attempt("rejected");
    }

    #[test]
    fn test_init_metrics_disabled() {
        let config = ObservabilityConfig { enable_metrics: false, ..Default::default() };
        assert!(init_metrics(&config).is_ok());
        assert!(get_metrics().is_none());
    }

    #[test]
    fn test_init_metrics_no_port() {
        let config =
            ObservabilityConfig { enable_metrics: true, metrics_port: 0, ..Default::default() };
        assert!(init_metrics(&config).is_ok());
    }
}
