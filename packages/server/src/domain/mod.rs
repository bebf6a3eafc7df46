//! Domain layer for the synchronization bridge.
//!
//! This module contains the runtime state and its merge rules, which are
//! independent of wire formats and socket handling.

pub mod entity;
pub mod error;
pub mod repository;
pub mod timer_link;
pub mod value_object;

pub use entity::{
    BrowserConnection, DISPLAY_STALENESS_WINDOW_MS, Freshness, LIVENESS_STALENESS_WINDOW_MS,
    MergeOutcome, RuntimeState, StateChange, StateSource,
};
pub use error::{DisconnectError, LinkError, ProtocolError, RepositoryError, ValueObjectError};
pub use repository::{ConnectionRepository, SendReport};
pub use timer_link::{DesktopEndpoint, TimerLink};
pub use value_object::{ConnectionId, Port, SplitIndex, Timestamp};

#[cfg(test)]
pub use timer_link::MockTimerLink;
