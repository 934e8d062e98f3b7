//! Transport Error Types

use tether_ports::CapabilityError;
use thiserror::Error;

/// Error type for transport operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection closed before the handshake completed
    #[error("connection closed before the handshake completed")]
    Handshake,

    /// Send attempted on a closed connection
    #[error("connection closed")]
    Closed,

    /// Capability missing or socket failure
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Config(err.to_string())
    }
}
