//! # Backend Coordinator
//!
//! [`Backend`] ties storage, the ThingsDB connector and the cached ThingsDB
//! session together. Every API handler shares one `Arc<Backend>`.
//!
//! The cached session is built lazily from the stored configuration on first
//! use and dropped whenever the configuration is written or deleted, so the
//! next caller reconnects with the new settings. A session that fails at
//! the transport level is dropped the same way.
//!
//! Configuration and role writes are read-modify-write cycles against
//! storage and run one at a time under a shared write lock.

pub mod config_store;
pub mod credentials;
pub mod role_store;
pub mod token;

pub use credentials::UsernameGenerator;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{ConnectionConfig, CONFIG_KEY};
use crate::errors::{Error, Result};
use crate::storage::{get_json, Storage};
use crate::thingsdb::{Connector, QueryClient};

/// How a write treats an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create when absent, update when present.
    Upsert,
    /// Update only; an absent record is a not-found error.
    UpdateOnly,
}

pub struct Backend {
    storage: Arc<dyn Storage>,
    connector: Arc<dyn Connector>,
    client: Mutex<Option<Arc<dyn QueryClient>>>,
    writes: Mutex<()>,
    usernames: UsernameGenerator,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

impl Backend {
    pub fn new(storage: Arc<dyn Storage>, connector: Arc<dyn Connector>) -> Self {
        Self {
            storage,
            connector,
            client: Mutex::new(None),
            writes: Mutex::new(()),
            usernames: UsernameGenerator::new(),
        }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Return the cached session, connecting first if there is none.
    ///
    /// The lock is held across the connect so concurrent callers on a cold
    /// cache wait for one connection instead of each building their own.
    pub async fn get_client(&self) -> Result<Arc<dyn QueryClient>> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let config = self.load_connection_config().await?.ok_or(Error::ConfigurationMissing)?;
        debug!(hostname = %config.hostname, port = config.port, "No cached ThingsDB session, connecting");

        let client = self.connector.connect(&config).await?;
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Drop the cached session.
    pub async fn reset(&self) {
        let mut slot = self.client.lock().await;
        if slot.take().is_some() {
            info!("Dropped cached ThingsDB session");
        }
    }

    /// Drop `stale` if it is still the cached session.
    ///
    /// Compared by pointer so a session cached by another caller after a
    /// reconnect is left alone.
    pub(crate) async fn discard_client(&self, stale: &Arc<dyn QueryClient>) {
        let mut slot = self.client.lock().await;
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, stale)) {
            slot.take();
            warn!("Dropped broken ThingsDB session");
        }
    }

    pub(crate) async fn write_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.writes.lock().await
    }

    pub(crate) async fn load_connection_config(&self) -> Result<Option<ConnectionConfig>> {
        get_json(self.storage(), CONFIG_KEY).await
    }

    pub(crate) fn usernames(&self) -> &UsernameGenerator {
        &self.usernames
    }
}
