//! UseCase: 同期ティック
//!
//! One tick of the desktop polling timeline:
//!
//! 1. forced reset requested → tear down the link, mark desktop lost
//! 2. not connected → try to connect
//! 3. connected → poll the split index and merge it; on failure probe the
//!    link and tear it down if it is dead
//!
//! Link errors never escape a tick; they degrade to "not connected".

use std::sync::Arc;

use crate::domain::{DesktopEndpoint, MergeOutcome, TimerLink};

use super::reconciler::StateReconciler;

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Forced reset: link closed, desktop marked lost
    Reset,
    /// Connect attempt succeeded
    Connected,
    /// Connect attempt failed; retried next tick
    StillDisconnected,
    /// Index polled and merged
    Polled(MergeOutcome),
    /// Poll failed but the liveness probe passed
    PollFailedLinkAlive,
    /// Poll failed and the link was torn down
    LinkLost,
}

pub struct SyncTickUseCase {
    reconciler: Arc<StateReconciler>,
}

impl SyncTickUseCase {
    pub fn new(reconciler: Arc<StateReconciler>) -> Self {
        Self { reconciler }
    }

    /// Run one tick.
    ///
    /// # Arguments
    ///
    /// * `link` - Desktop timer link owned by the scheduler
    /// * `endpoint` - Where to connect when not connected
    /// * `force_reset` - Tear the link down instead of polling
    pub async fn execute(
        &self,
        link: &mut dyn TimerLink,
        endpoint: &DesktopEndpoint,
        force_reset: bool,
    ) -> TickOutcome {
        if force_reset {
            tracing::info!("Forced reset of desktop link (target {})", endpoint);
            self.tear_down(link).await;
            return TickOutcome::Reset;
        }

        if !self.reconciler.is_desktop_connected().await {
            return match link.connect(endpoint).await {
                Ok(()) => {
                    tracing::info!("Connected to desktop timer at {}", endpoint);
                    self.reconciler.desktop_connected().await;
                    TickOutcome::Connected
                }
                Err(e) => {
                    tracing::debug!("Desktop timer at {} not reachable: {}", endpoint, e);
                    TickOutcome::StillDisconnected
                }
            };
        }

        match link.poll_split_index().await {
            Ok(index) => {
                let outcome = self.reconciler.apply_desktop_index(index).await;
                if let MergeOutcome::Changed(change) = outcome {
                    // name lookup is best-effort and never fails the link
                    let name = if change.timer_running {
                        match link.poll_split_name().await {
                            Ok(name) => Some(name).filter(|n| !n.is_empty()),
                            Err(e) => {
                                tracing::debug!("Split name lookup failed: {}", e);
                                None
                            }
                        }
                    } else {
                        None
                    };
                    self.reconciler.set_current_split_name(name).await;
                }
                TickOutcome::Polled(outcome)
            }
            Err(e) => {
                tracing::warn!("Split index poll failed: {}", e);
                if link.check_connection().await {
                    TickOutcome::PollFailedLinkAlive
                } else {
                    self.tear_down(link).await;
                    TickOutcome::LinkLost
                }
            }
        }
    }

    async fn tear_down(&self, link: &mut dyn TimerLink) {
        link.close().await;
        self.reconciler.desktop_lost().await;
    }
}
