//! Error type for broker sessions.
//!
//! Every fallible operation in this crate returns [`TransferError`]. The
//! variants separate setup problems (bad configuration, unreadable
//! certificates) from runtime failures (refused connection, timeouts, a
//! publish the client could not queue) so callers can report them distinctly.
//! Nothing here retries: a failed session is simply closed.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Endpoint metadata is malformed, e.g. a QoS outside 0..=2.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Client could not be constructed from the configuration.
    #[error("Client setup error: {0}")]
    ClientSetup(String),

    /// Configuration failed `validator` rules.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] validator::ValidationErrors),

    /// Local client could not queue a request (event loop gone, channel closed).
    #[error("Client transfer error: {0}")]
    ClientTransfer(#[from] rumqttc::ClientError),

    /// Network-level failure reported by the event loop.
    ///
    /// Boxed because `rumqttc::ConnectionError` is large.
    #[error("Client connection error: {0}")]
    ClientConnection(#[from] Box<rumqttc::ConnectionError>),

    /// Broker answered CONNECT with a non-success return code.
    #[error("Connection refused by broker: {0}")]
    ConnectionRefused(String),

    /// Broker did not answer within the configured bound.
    #[error("Timed out after {timeout:?} waiting for {operation}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Event loop ended before the expected acknowledgement arrived.
    #[error("Session closed while waiting for {0}")]
    SessionClosed(&'static str),

    /// File I/O, typically TLS certificate loading.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rumqttc::ConnectionError> for TransferError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        TransferError::ClientConnection(Box::new(err))
    }
}

/// Walks the source chain of `e` and returns the innermost message.
pub fn root_cause(e: &dyn std::error::Error) -> String {
    let mut current = e;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string().trim_matches('"').to_string()
}
