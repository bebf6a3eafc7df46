//! Core domain models for the synchronization bridge.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use super::value_object::{ConnectionId, SplitIndex, Timestamp};

/// Browser state older than this is no longer usable as display state.
pub const DISPLAY_STALENESS_WINDOW_MS: i64 = 5_000;

/// Browser state older than this no longer counts as a liveness signal.
pub const LIVENESS_STALENESS_WINDOW_MS: i64 = 10_000;

/// Who last wrote the runtime state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSource {
    Desktop,
    Browser,
    #[default]
    None,
}

/// The canonical "current split / timer running" record.
///
/// Only the reconciler mutates it, always under its lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeState {
    pub timer_running: bool,
    pub active_split_index: SplitIndex,
    /// Cached split names, possibly empty
    pub split_names: Vec<String>,
    /// Best-effort name of the active split
    pub current_split_name: Option<String>,
    pub source: StateSource,
    pub last_browser_update_at: Option<Timestamp>,
    pub desktop_connected: bool,
}

/// Before/after values of a transition that changed `timer_running` or `active_split_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub previous_running: bool,
    /// Index the transition started from, after the start-of-run correction
    pub previous_index: SplitIndex,
    pub timer_running: bool,
    pub active_split_index: SplitIndex,
}

impl StateChange {
    pub fn running_changed(&self) -> bool {
        self.previous_running != self.timer_running
    }

    pub fn index_changed(&self) -> bool {
        self.previous_index != self.active_split_index
    }
}

/// Result of merging one event into the runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// `timer_running` or `active_split_index` changed
    Changed(StateChange),
    /// Accepted, but nothing observable changed
    Unchanged,
    /// Rejected by precedence rules (Browser while Desktop is connected)
    Ignored,
}

impl MergeOutcome {
    pub fn change(&self) -> Option<StateChange> {
        match self {
            MergeOutcome::Changed(change) => Some(*change),
            _ => None,
        }
    }
}

/// Whether downstream consumers may act on the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Freshness {
    /// Usable as display state
    pub display_current: bool,
    /// Usable as a liveness/icon signal
    pub live: bool,
}

impl RuntimeState {
    /// Create the startup state: not running, no split, no source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a desktop poll result.
    ///
    /// Desktop is authoritative while connected and overwrites unconditionally.
    /// `-1` is the desktop's own reset and maps to "not running, no split".
    pub fn apply_desktop_index(&mut self, index: SplitIndex) -> MergeOutcome {
        if !self.desktop_connected {
            return MergeOutcome::Ignored;
        }
        self.source = StateSource::Desktop;
        self.observe(index.is_started(), index)
    }

    /// Merge a browser `timer_state` message received at `now`.
    ///
    /// Only accepted as a fallback while the desktop timer is not connected.
    pub fn apply_browser_state(
        &mut self,
        running: bool,
        index: SplitIndex,
        split_name: Option<String>,
        now: Timestamp,
    ) -> MergeOutcome {
        if self.desktop_connected {
            return MergeOutcome::Ignored;
        }
        self.source = StateSource::Browser;
        self.last_browser_update_at = Some(now);
        self.current_split_name = split_name.filter(|name| !name.is_empty());
        self.observe(running, index)
    }

    /// Replace the cached split names. Never touches running/index.
    ///
    /// Returns whether the cache changed.
    pub fn replace_split_names(&mut self, names: Vec<String>) -> bool {
        if self.split_names == names {
            return false;
        }
        self.split_names = names;
        true
    }

    /// Record that the desktop link came up. Returns whether the flag flipped.
    pub fn mark_desktop_connected(&mut self) -> bool {
        let flipped = !self.desktop_connected;
        self.desktop_connected = true;
        flipped
    }

    /// Record that the desktop link was torn down.
    ///
    /// A running timer view is stopped and its index cleared, since nothing
    /// is observing the run anymore.
    pub fn mark_desktop_lost(&mut self) -> MergeOutcome {
        self.desktop_connected = false;
        if !self.timer_running {
            return MergeOutcome::Unchanged;
        }
        let change = StateChange {
            previous_running: true,
            previous_index: self.active_split_index,
            timer_running: false,
            active_split_index: SplitIndex::NOT_STARTED,
        };
        self.timer_running = false;
        self.active_split_index = SplitIndex::NOT_STARTED;
        self.current_split_name = None;
        MergeOutcome::Changed(change)
    }

    /// Milliseconds since the last accepted browser update, if any.
    pub fn browser_age_millis(&self, now: Timestamp) -> Option<i64> {
        self.last_browser_update_at
            .map(|updated_at| now.millis_since(updated_at))
    }

    /// Evaluate the staleness windows at `now`.
    ///
    /// Staleness never clears fields; it only gates whether consumers act on them.
    pub fn freshness(&self, now: Timestamp) -> Freshness {
        if self.desktop_connected {
            return Freshness {
                display_current: true,
                live: true,
            };
        }
        match (self.source, self.browser_age_millis(now)) {
            (StateSource::Browser, Some(age)) => Freshness {
                display_current: age <= DISPLAY_STALENESS_WINDOW_MS,
                live: age <= LIVENESS_STALENESS_WINDOW_MS,
            },
            _ => Freshness {
                display_current: false,
                live: false,
            },
        }
    }

    /// Number of cached splits.
    pub fn total_splits(&self) -> usize {
        self.split_names.len()
    }

    fn observe(&mut self, running: bool, index: SplitIndex) -> MergeOutcome {
        let previous_running = self.timer_running;

        if running && !self.timer_running {
            self.timer_running = true;
            // start-of-run artifact: a remembered 0 counts as "before the first split"
            if self.active_split_index == SplitIndex::FIRST {
                self.active_split_index = SplitIndex::NOT_STARTED;
            }
        } else if !running {
            self.timer_running = false;
        }

        let previous_index = self.active_split_index;
        self.active_split_index = index;

        if previous_running == self.timer_running && previous_index == index {
            return MergeOutcome::Unchanged;
        }
        MergeOutcome::Changed(StateChange {
            previous_running,
            previous_index,
            timer_running: self.timer_running,
            active_split_index: index,
        })
    }
}

/// One accepted browser-extension connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConnection {
    pub id: ConnectionId,
    pub remote_address: SocketAddr,
    pub connected_at: Timestamp,
}

impl BrowserConnection {
    pub fn new(id: ConnectionId, remote_address: SocketAddr, connected_at: Timestamp) -> Self {
        Self {
            id,
            remote_address,
            connected_at,
        }
    }
}
