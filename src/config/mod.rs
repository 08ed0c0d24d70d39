//! # Configuration Management
//!
//! Service configuration is read from `THINGSDB_SECRETS_*` environment
//! variables. Unset variables fall back to the defaults in [`settings`];
//! set but unparseable variables are an error.

pub mod settings;

pub use settings::{
    ApiServerConfig, AppConfig, ObservabilityConfig, StorageConfig, ThingsDbClientConfig,
};

use crate::errors::{Error, Result};
use std::str::FromStr;

pub const ENV_PREFIX: &str = "THINGSDB_SECRETS_";

/// Environment-backed configuration loader
pub struct Config;

impl Config {
    /// Build and validate the application configuration from the environment
    pub fn from_env() -> Result<AppConfig> {
        let defaults = AppConfig::default();

        let config = AppConfig {
            api: ApiServerConfig {
                bind_address: env_or("API_BIND_ADDRESS", defaults.api.bind_address)?,
                port: env_or("API_PORT", defaults.api.port)?,
            },
            storage: StorageConfig {
                url: env_or("STORAGE_URL", defaults.storage.url)?,
                max_connections: env_or("STORAGE_MAX_CONNECTIONS", defaults.storage.max_connections)?,
                min_connections: env_or("STORAGE_MIN_CONNECTIONS", defaults.storage.min_connections)?,
                connect_timeout_seconds: env_or(
                    "STORAGE_CONNECT_TIMEOUT_SECONDS",
                    defaults.storage.connect_timeout_seconds,
                )?,
                idle_timeout_seconds: env_or(
                    "STORAGE_IDLE_TIMEOUT_SECONDS",
                    defaults.storage.idle_timeout_seconds,
                )?,
            },
            thingsdb: ThingsDbClientConfig {
                timeout_seconds: env_or("THINGSDB_TIMEOUT_SECONDS", defaults.thingsdb.timeout_seconds)?,
            },
            observability: ObservabilityConfig {
                enable_metrics: env_flag("ENABLE_METRICS", defaults.observability.enable_metrics),
                metrics_port: env_or("METRICS_PORT", defaults.observability.metrics_port)?,
                service_name: env_or("SERVICE_NAME", defaults.observability.service_name)?,
                log_level: env_or("LOG_LEVEL", defaults.observability.log_level)?,
                json_logging: env_flag("JSON_LOGGING", defaults.observability.json_logging),
            },
        };

        config.validate()?;
        Ok(config)
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| {
            Error::config(format!("Invalid value for {ENV_PREFIX}{name} ('{raw}'): {e}"))
        }),
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    var(name).map(|s| s.eq_ignore_ascii_case("true") || s == "1").unwrap_or(default)
}
