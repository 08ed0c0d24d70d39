//! # Configuration Settings
//!
//! Defines the configuration structure for the credential engine service.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Management API configuration
    #[validate(nested)]
    pub api: ApiServerConfig,

    /// Storage backend configuration
    #[validate(nested)]
    pub storage: StorageConfig,

    /// ThingsDB client behaviour
    #[validate(nested)]
    pub thingsdb: ThingsDbClientConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    /// Checks the validator derive cannot express
    fn validate_custom(&self) -> Result<()> {
        if !self.storage.is_memory() && !self.storage.is_sqlite() {
            return Err(Error::validation_field(
                "Storage URL must start with 'memory://' or 'sqlite://'",
                "storage.url",
            ));
        }

        if self.storage.min_connections > self.storage.max_connections {
            return Err(Error::validation(
                "min_connections cannot be greater than max_connections",
            ));
        }

        if self.observability.enable_metrics
            && self.observability.metrics_port != 0
            && self.observability.metrics_port == self.api.port
        {
            return Err(Error::validation("API and metrics ports cannot be the same"));
        }

        Ok(())
    }
}

/// Management API listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiServerConfig {
    /// Bind address
    #[validate(length(min = 1, message = "API bind address cannot be empty"))]
    pub bind_address: String,

    /// Listen port
    #[validate(range(min = 1, max = 65535, message = "API port must be between 1 and 65535"))]
    pub port: u16,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1".to_string(), port: 8200 }
    }
}

impl ApiServerConfig {
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    /// `memory://` or `sqlite://<path>`
    #[validate(length(min = 1, message = "Storage URL cannot be empty"))]
    pub url: String,

    /// Maximum number of SQLite connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of SQLite connections in the pool
    #[validate(range(max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/thingsdb-secrets.db".to_string(),
            max_connections: 5,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
        }
    }
}

impl StorageConfig {
    /// In-memory storage, mostly for tests and throwaway deployments
    pub fn memory() -> Self {
        Self { url: "memory://".to_string(), ..Default::default() }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    pub fn is_memory(&self) -> bool {
        self.url.starts_with("memory://")
    }

    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite://")
    }
}

/// Settings for connections to the ThingsDB cluster
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ThingsDbClientConfig {
    /// Timeout for connect, TLS handshake and each query
    #[validate(range(
        min = 1,
        max = 300,
        message = "ThingsDB timeout must be between 1 and 300 seconds"
    ))]
    pub timeout_seconds: u64,
}

impl Default for ThingsDbClientConfig {
    fn default() -> Self {
        Self { timeout_seconds: 10 }
    }
}

impl ThingsDbClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Observability configuration for logging and metrics
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Prometheus exporter port (0 = recorder only, no listener)
    pub metrics_port: u16,

    /// Service name attached to startup logs
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level or `EnvFilter` directive
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: 9090,
            service_name: "thingsdb-secrets".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl ObservabilityConfig {
    /// Metrics bind address (None if no exporter listener)
    pub fn metrics_bind_address(&self) -> Option<String> {
        if self.metrics_port == 0 {
            None
        } else {
            Some(format!("0.0.0.0:{}", self.metrics_port))
        }
    }
}
