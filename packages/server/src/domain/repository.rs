//! Repository trait for the live browser-connection set.
//!
//! The accept loop adds, per-connection tasks remove, broadcast iterates and
//! prunes. Implementations must serialize all of these.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use super::{BrowserConnection, ConnectionId, RepositoryError};

/// Outcome of sending one line to every registered connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Connections the line was queued for
    pub delivered: usize,
    /// Connections dropped because their writer is gone
    pub removed: Vec<ConnectionId>,
}

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Register a connection together with its outbound line channel.
    async fn add_connection(
        &self,
        connection: BrowserConnection,
        sender: UnboundedSender<String>,
    ) -> Result<(), RepositoryError>;

    async fn remove_connection(
        &self,
        id: &ConnectionId,
    ) -> Result<BrowserConnection, RepositoryError>;

    async fn get_connections(&self) -> Vec<BrowserConnection>;

    async fn count_connections(&self) -> usize;

    /// Queue `line` for every connection, removing those whose writer has ended.
    async fn send_to_all(&self, line: &str) -> SendReport;

    /// Queue `line` for one connection.
    async fn send_to(&self, id: &ConnectionId, line: &str) -> Result<(), RepositoryError>;

    /// Drop every connection; returns how many were registered.
    async fn clear(&self) -> usize;
}
