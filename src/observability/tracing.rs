//! # Log Subscriber Setup
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` built from the
//! configured level (overridable through `RUST_LOG`) and either a plain or a
//! JSON formatter.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins, then the configured level.
pub fn build_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.log_level).map_err(|e| {
        Error::config(format!("Invalid log level '{}': {}", config.log_level, e))
    })
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed (for example by
/// a test harness), which is not treated as an error.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<bool> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json_logging {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
            .is_ok()
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init().is_ok()
    };

    Ok(installed)
}
