//! Error types for the ThingsDB client.

use thiserror::Error;

/// Errors raised while talking to a ThingsDB node.
#[derive(Error, Debug)]
pub enum ThingsDbError {
    /// Socket level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup failed before the handshake started.
    #[error("TLS error: {message}")]
    Tls { message: String },

    /// The node sent bytes that do not form a valid package.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// A request payload could not be encoded as MessagePack.
    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// A response payload could not be decoded from MessagePack.
    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The node answered with an error package.
    #[error("ThingsDB error {code}: {message}")]
    Server { code: i64, message: String },

    /// The node closed the connection.
    #[error("Connection closed by ThingsDB")]
    Closed,
}

impl ThingsDbError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol { message: message.into() }
    }

    pub(crate) fn tls(message: impl Into<String>) -> Self {
        Self::Tls { message: message.into() }
    }

    /// Error code reported by the node, if this is a server error.
    pub fn server_code(&self) -> Option<i64> {
        match self {
            ThingsDbError::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the session this error came from can no longer be trusted.
    ///
    /// Server errors and request encoding failures leave the stream aligned;
    /// everything else means the connection should be dropped.
    pub fn is_transport(&self) -> bool {
        !matches!(self, ThingsDbError::Server { .. } | ThingsDbError::Encode(_))
    }
}
