//! Shared utilities for the SplitNotes bridge workspace.

pub mod logger;
pub mod time;
