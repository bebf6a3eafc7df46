//! Domain layer error definitions.

use std::time::Duration;

use thiserror::Error;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    /// Split index below the "not started" sentinel
    #[error("Split index cannot be lower than -1 (got {0})")]
    SplitIndexOutOfRange(i64),

    /// Port outside of the application-bindable range
    #[error("Port must be within {min}..={max} (got {actual})")]
    PortOutOfRange { min: u16, max: u16, actual: u16 },
}

/// Errors raised while talking to the desktop timer.
///
/// Every variant is handled the same way by callers: the link is torn down
/// and recreated on the next tick.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Desktop timer link is not connected")]
    NotConnected,

    #[error("Desktop timer did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Desktop timer closed the connection")]
    Closed,

    #[error("Desktop timer sent an unexpected response: {0:?}")]
    InvalidResponse(String),

    #[error("Desktop timer I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors for a single inbound line from a browser extension.
///
/// These are logged and the connection stays open.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Inbound line is not valid UTF-8")]
    InvalidUtf8,

    #[error("Inbound line is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Inbound message has no `type` field")]
    MissingType,

    #[error("Unknown inbound message type: {0}")]
    UnknownType(String),

    #[error("Invalid `{kind}` payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("Inbound line exceeds {max} bytes")]
    LineTooLong { max: usize },
}

/// Reasons a browser connection ended.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DisconnectError {
    #[error("Peer closed the connection")]
    PeerClosed,

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Broker is shutting down")]
    Shutdown,
}

/// Errors raised by the connection repository
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Connection capacity exceeded: maximum {capacity} connections allowed")]
    CapacityExceeded { capacity: usize },

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),
}
