//! Command-line probe for the SplitNotes bridge.
//!
//! Speaks the browser-extension side of the protocol so the bridge can be
//! exercised without a browser.

pub mod client;
pub mod error;
pub mod message;

pub use client::ProbeClient;
pub use error::ProbeError;
pub use message::ServerMessage;
