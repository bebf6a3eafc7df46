//! UseCase: 状態スナップショットのブロードキャスト
//!
//! Encodes one `state_update` line and queues it for every live browser
//! connection. Connections whose writer is gone are removed, not retried.

use std::sync::Arc;

use crate::{
    domain::{ConnectionRepository, SendReport},
    infrastructure::dto::wire::{OutboundSnapshot, encode_line},
};

use super::error::BroadcastError;

pub struct BroadcastSnapshotUseCase {
    repository: Arc<dyn ConnectionRepository>,
}

impl BroadcastSnapshotUseCase {
    pub fn new(repository: Arc<dyn ConnectionRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, snapshot: &OutboundSnapshot) -> Result<SendReport, BroadcastError> {
        let line = encode_line(snapshot)?;
        let report = self.repository.send_to_all(&line).await;

        for id in &report.removed {
            tracing::info!("Removed connection '{}' after failed write", id);
        }
        tracing::debug!(
            "Broadcast state_update (split {}, running {}) to {} connection(s)",
            snapshot.current_split,
            snapshot.timer_running,
            report.delivered
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{BrowserConnection, ConnectionId, RuntimeState, Timestamp},
        infrastructure::{
            dto::wire::OutboundType, repository::InMemoryConnectionRepository,
        },
    };
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_broadcast_reaches_every_connection() {
        // テスト項目: 全接続にスナップショットが 1 行ずつ届き、受信側でデコードできる
        // given (前提条件):
        let repository = Arc::new(InMemoryConnectionRepository::new());
        let mut receivers = Vec::new();
        for port in [40010, 40011] {
            let (tx, rx) = mpsc::unbounded_channel();
            repository
                .add_connection(
                    BrowserConnection::new(
                        ConnectionId::generate(),
                        format!("127.0.0.1:{port}").parse().unwrap(),
                        Timestamp::now(),
                    ),
                    tx,
                )
                .await
                .unwrap();
            receivers.push(rx);
        }
        let usecase = BroadcastSnapshotUseCase::new(repository);
        let mut state = RuntimeState::new();
        state.timer_running = true;
        state.split_names = vec!["A".into(), "B".into(), "C".into(), "D".into()];
        let snapshot = OutboundSnapshot::from_state(&state, Timestamp::new(99));

        // when (操作):
        let report = usecase.execute(&snapshot).await.unwrap();

        // then (期待する結果):
        assert_eq!(report.delivered, 2);
        for rx in receivers.iter_mut() {
            let line = rx.recv().await.unwrap();
            let decoded: OutboundSnapshot = serde_json::from_str(line.trim_end()).unwrap();
            assert_eq!(decoded.r#type, OutboundType::StateUpdate);
            assert_eq!(decoded.current_split, -1);
            assert!(decoded.timer_running);
            assert_eq!(decoded.total_splits, 4);
            assert!(rx.try_recv().is_err());
        }
    }
}
