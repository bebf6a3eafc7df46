//! UseCase: ブラウザ接続の登録
//!
//! Registers an accepted browser connection together with its outbound
//! channel, enforcing the connection cap.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::domain::{BrowserConnection, ConnectionRepository, RepositoryError};

use super::error::ConnectError;

pub struct ConnectBrowserUseCase {
    repository: Arc<dyn ConnectionRepository>,
}

impl ConnectBrowserUseCase {
    pub fn new(repository: Arc<dyn ConnectionRepository>) -> Self {
        Self { repository }
    }

    /// Register `connection`.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of live connections after registering
    /// * `Err(ConnectError)` - The connection cap is reached
    pub async fn execute(
        &self,
        connection: BrowserConnection,
        sender: UnboundedSender<String>,
    ) -> Result<usize, ConnectError> {
        self.repository
            .add_connection(connection, sender)
            .await
            .map_err(|e| match e {
                RepositoryError::CapacityExceeded { capacity } => {
                    ConnectError::CapacityExceeded { capacity }
                }
                other => ConnectError::Rejected(other.to_string()),
            })?;

        Ok(self.repository.count_connections().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ConnectionId, Timestamp},
        infrastructure::repository::InMemoryConnectionRepository,
    };
    use tokio::sync::mpsc;

    fn connection() -> BrowserConnection {
        BrowserConnection::new(
            ConnectionId::generate(),
            "127.0.0.1:40000".parse().unwrap(),
            Timestamp::now(),
        )
    }

    #[tokio::test]
    async fn test_connect_success() {
        // テスト項目: 新しい接続が登録される
        // given (前提条件):
        let repository = Arc::new(InMemoryConnectionRepository::new());
        let usecase = ConnectBrowserUseCase::new(repository.clone());
        let (tx, _rx) = mpsc::unbounded_channel();

        // when (操作):
        let result = usecase.execute(connection(), tx).await;

        // then (期待する結果):
        assert_eq!(result, Ok(1));
        assert_eq!(repository.count_connections().await, 1);
    }

    #[tokio::test]
    async fn test_connect_capacity_exceeded() {
        // テスト項目: 上限を超える接続は拒否される
        // given (前提条件):
        let repository = Arc::new(InMemoryConnectionRepository::with_capacity(2));
        let usecase = ConnectBrowserUseCase::new(repository.clone());
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let (tx3, _rx3) = mpsc::unbounded_channel();
        usecase.execute(connection(), tx1).await.unwrap();
        usecase.execute(connection(), tx2).await.unwrap();

        // when (操作):
        let result = usecase.execute(connection(), tx3).await;

        // then (期待する結果):
        assert_eq!(result, Err(ConnectError::CapacityExceeded { capacity: 2 }));
        assert_eq!(repository.count_connections().await, 2);
    }
}
