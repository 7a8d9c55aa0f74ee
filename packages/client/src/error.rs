//! Error types for the relay client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The relay refused the handshake (bad token, or host gate closed)
    #[error("Rejected by relay: {0}")]
    AuthRejected(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The relay URL given on the command line cannot be parsed
    #[error("Invalid relay URL: {0}")]
    InvalidUrl(String),
}
