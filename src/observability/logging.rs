//! # Structured Logging
//!
//! Span macros used across the service. Token values are never recorded as
//! span fields; only user and role names are.

/// Create a tracing span for an API request.
///
/// ```rust,ignore
/// let span = request_span!("GET", "/v1/creds/reader");
/// let span = request_span!("POST", "/v1/role/reader", role = "reader");
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4()
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for a call to the ThingsDB cluster.
///
/// ```rust,ignore
/// let span = remote_span!("new_user", user);
/// ```
#[macro_export]
macro_rules! remote_span {
    ($procedure:expr, $subject:expr) => {
        tracing::info_span!(
            "thingsdb_call",
            procedure = %$procedure,
            subject = %$subject,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($procedure:expr, $subject:expr, $($field:tt)*) => {
        tracing::info_span!(
            "thingsdb_call",
            procedure = %$procedure,
            subject = %$subject,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for storage operations.
#[macro_export]
macro_rules! db_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            $($field)*
        )
    };
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        api_address = %config.api.socket_address(),
        storage = if config.storage.is_memory() { "memory" } else { "sqlite" },
        thingsdb_timeout_secs = config.thingsdb.timeout_seconds,
        metrics_enabled = %config.observability.enable_metrics,
        json_logging = %config.observability.json_logging,
        "ThingsDB secrets engine configuration"
    );
}
