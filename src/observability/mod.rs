//! # Observability Infrastructure
//!
//! Structured logging, request tracing and metrics for the credential engine.

pub mod http_tracing;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use http_tracing::trace_http_requests;
pub use logging::log_config_info;
pub use metrics::{init_metrics, MetricsRecorder};
pub use tracing::init_tracing;

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use ::tracing::info;

/// Initialize logging and, if enabled, the metrics exporter
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    let installed = init_tracing(config)?;

    if config.enable_metrics {
        init_metrics(config)?;
    }

    info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        subscriber_installed = installed,
        metrics_enabled = %config.enable_metrics,
        "Observability initialized successfully"
    );

    Ok(())
}
