//! # Error Handling
//!
//! Error types for the credential engine, defined with `thiserror`.

pub mod types;

pub use types::{Error, ProvisioningStep, Result};
