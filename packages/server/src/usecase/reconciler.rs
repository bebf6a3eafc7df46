//! UseCase: ランタイム状態の統合
//!
//! Owns the single `RuntimeState`. Desktop poll results and browser messages
//! are merged here under one lock, and every real change of
//! `timer_running` / `active_split_index` is published to subscribers
//! (the extension broker) exactly once.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, broadcast};

use crate::domain::{
    Freshness, MergeOutcome, RuntimeState, SplitIndex, StateChange, Timestamp,
};

/// Buffered notifications per subscriber before it starts lagging
pub const NOTIFICATION_CAPACITY: usize = 64;

/// Published after every transition that changed running/index
#[derive(Debug, Clone)]
pub struct StateNotification {
    pub change: StateChange,
    /// State right after the transition
    pub state: RuntimeState,
}

/// Read-only view for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct StateView {
    pub state: RuntimeState,
    pub freshness: Freshness,
}

pub struct StateReconciler {
    state: Mutex<RuntimeState>,
    notifier: broadcast::Sender<StateNotification>,
    /// Liveness as of the last `check_liveness` call
    last_live: AtomicBool,
}

impl StateReconciler {
    pub fn new() -> Self {
        let (notifier, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            state: Mutex::new(RuntimeState::new()),
            notifier,
            last_live: AtomicBool::new(false),
        }
    }

    /// Receive a notification for every future state change.
    pub fn subscribe(&self) -> broadcast::Receiver<StateNotification> {
        self.notifier.subscribe()
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> RuntimeState {
        self.state.lock().await.clone()
    }

    /// Copy of the current state plus its staleness evaluation at `now`.
    pub async fn view(&self, now: Timestamp) -> StateView {
        let state = self.state.lock().await;
        StateView {
            freshness: state.freshness(now),
            state: state.clone(),
        }
    }

    pub async fn is_desktop_connected(&self) -> bool {
        self.state.lock().await.desktop_connected
    }

    /// Merge a desktop poll result.
    pub async fn apply_desktop_index(&self, index: SplitIndex) -> MergeOutcome {
        let mut state = self.state.lock().await;
        let outcome = state.apply_desktop_index(index);
        self.publish(outcome, &state);
        outcome
    }

    /// Merge a browser `timer_state` message received at `now`.
    pub async fn apply_browser_state(
        &self,
        running: bool,
        index: SplitIndex,
        split_name: Option<String>,
        now: Timestamp,
    ) -> MergeOutcome {
        let mut state = self.state.lock().await;
        let outcome = state.apply_browser_state(running, index, split_name, now);
        self.publish(outcome, &state);
        outcome
    }

    /// Replace the cached split names. Never publishes.
    pub async fn apply_split_names(&self, names: Vec<String>) -> bool {
        self.state.lock().await.replace_split_names(names)
    }

    /// Cache the name of the active split.
    pub async fn set_current_split_name(&self, name: Option<String>) {
        self.state.lock().await.current_split_name = name;
    }

    /// Mark the desktop link as up. Returns whether it was down before.
    pub async fn desktop_connected(&self) -> bool {
        let flipped = self.state.lock().await.mark_desktop_connected();
        if flipped {
            tracing::info!("Desktop timer connected; desktop state is now authoritative");
        }
        flipped
    }

    /// Mark the desktop link as torn down.
    pub async fn desktop_lost(&self) -> MergeOutcome {
        let mut state = self.state.lock().await;
        let was_connected = state.desktop_connected;
        let outcome = state.mark_desktop_lost();
        if was_connected {
            tracing::info!("Desktop timer disconnected; accepting browser state as fallback");
        }
        self.publish(outcome, &state);
        outcome
    }

    /// Re-evaluate the liveness window at `now`.
    ///
    /// Returns the new liveness when it flipped since the previous call.
    pub async fn check_liveness(&self, now: Timestamp) -> Option<bool> {
        let live = self.state.lock().await.freshness(now).live;
        let previous = self.last_live.swap(live, Ordering::SeqCst);
        if previous == live {
            return None;
        }
        if live {
            tracing::info!("Timer state source is live");
        } else {
            tracing::info!("Timer state source went stale");
        }
        Some(live)
    }

    // Called with the state lock held so notifications keep the write order.
    fn publish(&self, outcome: MergeOutcome, state: &RuntimeState) {
        let MergeOutcome::Changed(change) = outcome else {
            return;
        };
        tracing::debug!(
            "State changed: running {} -> {}, split {} -> {} (source: {:?})",
            change.previous_running,
            change.timer_running,
            change.previous_index,
            change.active_split_index,
            state.source
        );
        let notification = StateNotification {
            change,
            state: state.clone(),
        };
        if self.notifier.send(notification).is_err() {
            tracing::trace!("No subscribers for state change");
        }
    }
}

impl Default for StateReconciler {
    fn default() -> Self {
        Self::new()
    }
}
