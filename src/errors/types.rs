//! # Error Types
//!
//! Error taxonomy for the credential engine using `thiserror`.

use std::fmt;

use crate::thingsdb::ThingsDbError;

/// Custom result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the credential engine
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No connection configuration has been written yet
    #[error("ThingsDB connection is not configured")]
    ConfigurationMissing,

    /// Transport or TLS handshake with ThingsDB failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<ThingsDbError>,
    },

    /// ThingsDB rejected the configured token
    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<ThingsDbError>,
    },

    /// A remote provisioning step failed while issuing a credential
    #[error("Provisioning error during {step} for user '{user}': {message}")]
    Provisioning {
        step: ProvisioningStep,
        user: String,
        message: String,
    },

    /// Deleting the remote user backing a credential failed
    #[error("Revocation error for user '{user}': {message}")]
    Revocation { user: String, message: String },

    /// Lease internal data is missing an expected field or has the wrong type
    #[error("Malformed secret: {field} {reason}")]
    MalformedSecret { field: String, reason: String },

    /// Role referenced by a request or a lease does not exist
    #[error("Role not found: '{name}'")]
    RoleNotFound { name: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Service configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
}

/// Remote steps of the provisioning sequence, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStep {
    CreateUser,
    Grant,
    NewToken,
}

impl ProvisioningStep {
    /// Label used for metrics and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningStep::CreateUser => "new_user",
            ProvisioningStep::Grant => "grant",
            ProvisioningStep::NewToken => "new_token",
        }
    }
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Create a connection error wrapping a ThingsDB client error
    pub fn connection_with_source<S: Into<String>>(message: S, source: ThingsDbError) -> Self {
        Self::Connection { message: message.into(), source: Some(source) }
    }

    /// Create an authentication error wrapping a ThingsDB client error
    pub fn authentication<S: Into<String>>(message: S, source: ThingsDbError) -> Self {
        Self::Authentication { message: message.into(), source: Some(source) }
    }

    /// Create a provisioning error for the given step
    pub fn provisioning<U: Into<String>, S: Into<String>>(
        step: ProvisioningStep,
        user: U,
        message: S,
    ) -> Self {
        Self::Provisioning { step, user: user.into(), message: message.into() }
    }

    /// Create a revocation error
    pub fn revocation<U: Into<String>, S: Into<String>>(user: U, message: S) -> Self {
        Self::Revocation { user: user.into(), message: message.into() }
    }

    /// Create a malformed secret error
    pub fn malformed_secret<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::MalformedSecret { field: field.into(), reason: reason.into() }
    }

    /// Create a role not found error
    pub fn role_not_found<S: Into<String>>(name: S) -> Self {
        Self::RoleNotFound { name: name.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a database error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Create a serialization error with context
    pub fn serialization<S: Into<String>>(source: serde_json::Error, context: S) -> Self {
        Self::Serialization { source, context: context.into() }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::ConfigurationMissing => 412,
            Error::Connection { .. } => 502,
            Error::Authentication { .. } => 502,
            Error::Provisioning { .. } => 502,
            Error::Revocation { .. } => 502,
            Error::MalformedSecret { .. } => 400,
            Error::RoleNotFound { .. } => 404,
            Error::Validation { .. } => 400,
            Error::NotFound { .. } => 404,
            Error::Config { .. } => 500,
            Error::Database { .. } => 500,
            Error::Serialization { .. } => 500,
            Error::Io { .. } => 500,
        }
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
