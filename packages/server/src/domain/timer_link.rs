//! Desktop timer abstraction.
//!
//! The desktop timer exposes a line-oriented command socket. The domain only
//! needs the handful of queries below; the TCP implementation lives in
//! `infrastructure::desktop`.

use std::fmt;

use async_trait::async_trait;

use super::{
    error::LinkError,
    value_object::{Port, SplitIndex},
};

/// Host/port of the desktop timer's command server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopEndpoint {
    pub host: String,
    pub port: Port,
}

impl DesktopEndpoint {
    pub fn new(host: impl Into<String>, port: Port) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for DesktopEndpoint {
    fn default() -> Self {
        Self::new("localhost", Port::DESKTOP_DEFAULT)
    }
}

impl fmt::Display for DesktopEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Best-effort link to the desktop timer.
///
/// Every call is bounded by one fixed timeout. Implementations never retry;
/// callers tear the link down and reconnect on the next tick instead.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimerLink: Send {
    /// Open a fresh connection, replacing any previous one.
    async fn connect(&mut self, endpoint: &DesktopEndpoint) -> Result<(), LinkError>;

    /// Current split index; `-1` while the timer is not running.
    async fn poll_split_index(&mut self) -> Result<SplitIndex, LinkError>;

    /// Name of the current split. Only meaningful while running.
    async fn poll_split_name(&mut self) -> Result<String, LinkError>;

    /// Best possible time as reported by the timer (not used by reconciliation).
    async fn poll_best_possible_time(&mut self) -> Result<String, LinkError>;

    /// Cheap liveness probe used before declaring the link dead.
    async fn check_connection(&mut self) -> bool;

    /// Release the socket. Idempotent.
    async fn close(&mut self);
}
