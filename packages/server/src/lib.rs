//! State-synchronization bridge for the SplitNotes note viewer.
//!
//! Polls a desktop speedrun timer, accepts timer state from browser
//! extensions as a fallback, and pushes every change of the active split to
//! connected extensions as newline-delimited JSON.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub use config::BridgeConfig;
pub use ui::{run, run_until};
