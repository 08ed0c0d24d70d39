//! # REST API
//!
//! HTTP surface of the credential engine: configuration and role management,
//! credential issuance, and the revoke/renew hooks used by the lease manager.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use routes::{build_router, ApiState};
pub use server::start_api_server;
