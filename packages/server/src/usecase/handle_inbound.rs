//! UseCase: ブラウザからの受信メッセージ処理
//!
//! Dispatches one parsed inbound message to the reconciler and tells the
//! caller what kind of reply, if any, the message calls for.

use std::sync::Arc;

use crate::{
    domain::{MergeOutcome, ProtocolError, SplitIndex, Timestamp},
    infrastructure::dto::wire::InboundMessage,
};

use super::reconciler::StateReconciler;

/// Effect of one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEffect {
    /// `timer_state` merged (or ignored by precedence)
    TimerState(MergeOutcome),
    /// `splits_updated` applied to the split-name cache
    SplitsUpdated { changed: bool },
    /// `connection_test`; state untouched, must be answered
    ConnectionTest { echo: Option<f64> },
}

pub struct HandleInboundUseCase {
    reconciler: Arc<StateReconciler>,
}

impl HandleInboundUseCase {
    pub fn new(reconciler: Arc<StateReconciler>) -> Self {
        Self { reconciler }
    }

    /// Apply `message`, received at `now`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidPayload` when `currentSplit` is below -1
    pub async fn execute(
        &self,
        message: InboundMessage,
        now: Timestamp,
    ) -> Result<InboundEffect, ProtocolError> {
        match message {
            InboundMessage::TimerState(payload) => {
                let index = SplitIndex::new(payload.current_split).map_err(|e| {
                    ProtocolError::InvalidPayload {
                        kind: "timer_state".to_string(),
                        reason: e.to_string(),
                    }
                })?;
                let outcome = self
                    .reconciler
                    .apply_browser_state(payload.running, index, payload.split_name, now)
                    .await;
                if outcome == MergeOutcome::Ignored {
                    tracing::debug!("Browser timer_state ignored: desktop timer is authoritative");
                }
                Ok(InboundEffect::TimerState(outcome))
            }
            InboundMessage::SplitsUpdated(payload) => {
                let count = payload.splits.len();
                let changed = self.reconciler.apply_split_names(payload.splits).await;
                tracing::debug!("Split list updated ({} splits, changed: {})", count, changed);
                Ok(InboundEffect::SplitsUpdated { changed })
            }
            InboundMessage::ConnectionTest(payload) => {
                tracing::info!(
                    "Connection test from '{}'",
                    payload.source.as_deref().unwrap_or("unknown")
                );
                Ok(InboundEffect::ConnectionTest {
                    echo: payload.timestamp,
                })
            }
        }
    }
}
