//! Probe error types.

use std::{io, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Bridge closed the connection")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Unexpected message from bridge: {0}")]
    UnexpectedMessage(String),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
