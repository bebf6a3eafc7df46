//! InMemory connection repository
//!
//! A HashMap guarded by one tokio mutex holds every live browser connection
//! together with the sender half of its outbound line channel.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc::UnboundedSender};

use crate::domain::{
    BrowserConnection, ConnectionId, ConnectionRepository, RepositoryError, SendReport,
};

/// Default maximum number of concurrent browser connections
pub const DEFAULT_CONNECTION_CAPACITY: usize = 10;

struct ConnectionEntry {
    connection: BrowserConnection,
    sender: UnboundedSender<String>,
}

pub struct InMemoryConnectionRepository {
    connections: Mutex<HashMap<ConnectionId, ConnectionEntry>>,
    capacity: usize,
}

impl InMemoryConnectionRepository {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CONNECTION_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryConnectionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionRepository for InMemoryConnectionRepository {
    async fn add_connection(
        &self,
        connection: BrowserConnection,
        sender: UnboundedSender<String>,
    ) -> Result<(), RepositoryError> {
        let mut connections = self.connections.lock().await;
        if connections.len() >= self.capacity {
            return Err(RepositoryError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        connections.insert(connection.id, ConnectionEntry { connection, sender });
        Ok(())
    }

    async fn remove_connection(
        &self,
        id: &ConnectionId,
    ) -> Result<BrowserConnection, RepositoryError> {
        let mut connections = self.connections.lock().await;
        connections
            .remove(id)
            .map(|entry| entry.connection)
            .ok_or_else(|| RepositoryError::ConnectionNotFound(id.to_string()))
    }

    async fn get_connections(&self) -> Vec<BrowserConnection> {
        let connections = self.connections.lock().await;
        let mut list: Vec<BrowserConnection> = connections
            .values()
            .map(|entry| entry.connection.clone())
            .collect();
        list.sort_by_key(|c| c.connected_at);
        list
    }

    async fn count_connections(&self) -> usize {
        self.connections.lock().await.len()
    }

    async fn send_to_all(&self, line: &str) -> SendReport {
        let mut connections = self.connections.lock().await;
        let mut report = SendReport::default();

        connections.retain(|id, entry| {
            if entry.sender.send(line.to_string()).is_ok() {
                report.delivered += 1;
                true
            } else {
                report.removed.push(*id);
                false
            }
        });

        report
    }

    async fn send_to(&self, id: &ConnectionId, line: &str) -> Result<(), RepositoryError> {
        let mut connections = self.connections.lock().await;
        let sent = connections
            .get(id)
            .map(|entry| entry.sender.send(line.to_string()).is_ok());

        match sent {
            Some(true) => Ok(()),
            Some(false) => {
                connections.remove(id);
                Err(RepositoryError::ConnectionNotFound(id.to_string()))
            }
            None => Err(RepositoryError::ConnectionNotFound(id.to_string())),
        }
    }

    async fn clear(&self) -> usize {
        let mut connections = self.connections.lock().await;
        let count = connections.len();
        connections.clear();
        count
    }
}
