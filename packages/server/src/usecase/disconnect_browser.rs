//! UseCase: ブラウザ接続の解除
//!
//! Removes a browser connection from the live set. Dropping its channel
//! sender lets the connection's writer task finish.

use std::sync::Arc;

use crate::domain::{ConnectionId, ConnectionRepository, RepositoryError};

pub struct DisconnectBrowserUseCase {
    repository: Arc<dyn ConnectionRepository>,
}

impl DisconnectBrowserUseCase {
    pub fn new(repository: Arc<dyn ConnectionRepository>) -> Self {
        Self { repository }
    }

    /// Remove `id`.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of connections still live
    /// * `Err(RepositoryError)` - Already removed (e.g. pruned by a failed broadcast)
    pub async fn execute(&self, id: &ConnectionId) -> Result<usize, RepositoryError> {
        self.repository.remove_connection(id).await?;
        Ok(self.repository.count_connections().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{BrowserConnection, Timestamp},
        infrastructure::repository::InMemoryConnectionRepository,
    };
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_disconnect_last_connection() {
        // テスト項目: 最後の接続を解除すると残りは 0 になる
        // given (前提条件):
        let repository = Arc::new(InMemoryConnectionRepository::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = BrowserConnection::new(
            ConnectionId::generate(),
            "127.0.0.1:40001".parse().unwrap(),
            Timestamp::now(),
        );
        repository
            .add_connection(connection.clone(), tx)
            .await
            .unwrap();
        let usecase = DisconnectBrowserUseCase::new(repository.clone());

        // when (操作):
        let result = usecase.execute(&connection.id).await;

        // then (期待する結果):
        assert_eq!(result, Ok(0));
    }

    #[tokio::test]
    async fn test_disconnect_unknown_connection() {
        // テスト項目: 存在しない接続の解除はエラー
        // given (前提条件):
        let repository = Arc::new(InMemoryConnectionRepository::new());
        let usecase = DisconnectBrowserUseCase::new(repository);
        let id = ConnectionId::generate();

        // when (操作):
        let result = usecase.execute(&id).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RepositoryError::ConnectionNotFound(id.to_string()))
        );
    }
}
