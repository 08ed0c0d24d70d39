//! # thingsdb-secrets
//!
//! A dynamic credential engine for ThingsDB. Operators store the connection
//! details of a ThingsDB cluster and a set of roles; every credential request
//! creates a short-lived ThingsDB user with the role's access grant and hands
//! back a token for it. An external lease manager calls back to revoke the
//! user when the lease ends, or to renew the lease with the role's current
//! bounds.
//!
//! ## Architecture
//!
//! ```text
//! REST API → Backend (coordinator) → ThingsDB client (TLS + MessagePack)
//!               ↓
//!            Storage (memory / SQLite)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thingsdb_secrets::{
//!     api::start_api_server, backend::Backend, storage::open_storage,
//!     thingsdb::ThingsDbConnector, Config, Result,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_env()?;
//!     let storage = open_storage(&config.storage).await?;
//!     let connector = Arc::new(ThingsDbConnector::new(config.thingsdb.timeout()));
//!     let backend = Arc::new(Backend::new(storage, connector));
//!     start_api_server(config.api, backend).await
//! }
//! ```

pub mod api;
pub mod backend;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod storage;
pub mod thingsdb;

pub use config::Config;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
