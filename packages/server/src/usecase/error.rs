//! UseCase layer error definitions.

use thiserror::Error;

/// Errors when registering a browser connection
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Connection capacity exceeded (maximum {capacity})")]
    CapacityExceeded { capacity: usize },

    #[error("Connection rejected: {0}")]
    Rejected(String),
}

/// Errors when broadcasting a snapshot
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}
