//! # ThingsDB Client
//!
//! Minimal asynchronous client for the ThingsDB binary protocol: framed
//! MessagePack packages over an always-on TLS stream, token authentication and
//! scoped queries with bound variables.
//!
//! The engine talks to ThingsDB through the [`QueryClient`] and [`Connector`]
//! traits so the credential logic can run against a fake node in tests.

pub mod connection;
pub mod error;
pub mod protocol;
pub mod tls;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn, Instrument};

use crate::domain::ConnectionConfig;
use crate::errors::{Error, Result};
use crate::observability::metrics;

pub use connection::{Connection, Transport, DEFAULT_TIMEOUT};
pub use error::ThingsDbError;
pub use protocol::{Package, Proto};

/// Scope all credential procedures run in.
pub const THINGSDB_SCOPE: &str = "@thingsdb";

/// An authenticated session able to run queries.
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Run `code` in `scope` with `vars` bound as query variables.
    async fn query(
        &self,
        scope: &str,
        code: &str,
        vars: Value,
    ) -> std::result::Result<Value, ThingsDbError>;
}

/// Opens authenticated sessions from a stored connection configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn QueryClient>>;
}

/// Connector that dials a real ThingsDB node over TLS.
#[derive(Debug, Clone)]
pub struct ThingsDbConnector {
    timeout: Duration,
}

impl ThingsDbConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ThingsDbConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for ThingsDbConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn QueryClient>> {
        let span = crate::remote_span!("connect", config.hostname, port = config.port);

        async {
            let connection =
                Connection::connect(&config.hostname, config.port, config.insecure, self.timeout)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Failed to reach ThingsDB");
                        metrics::record_connection_attempt("unreachable");
                        Error::connection_with_source(
                            format!("failed to connect to {}:{}", config.hostname, config.port),
                            e,
                        )
                    })?;

            connection
                .authenticate(config.token.expose_secret())
                .await
                .map_err(authentication_failure)?;

            metrics::record_connection_attempt("success");
            info!(peer = %connection.peer(), "Connected to ThingsDB");
            Ok(Arc::new(connection) as Arc<dyn QueryClient>)
        }
        .instrument(span)
        .await
    }
}

/// Map a failed authentication: a server answer means the token was
/// refused, anything else means the node went away mid-handshake.
fn authentication_failure(e: ThingsDbError) -> Error {
    warn!(error = %e, "ThingsDB authentication failed");
    match e {
        ThingsDbError::Server { .. } => {
            metrics::record_connection_attempt("rejected");
            Error::authentication("ThingsDB rejected the configured token", e)
        }
        other => {
            metrics::record_connection_attempt("unreachable");
            Error::connection_with_source("connection lost during authentication", other)
        }
    }
}
