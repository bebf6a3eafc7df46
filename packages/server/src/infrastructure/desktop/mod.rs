//! Desktop timer link implementations.

mod livesplit;

pub use livesplit::{DEFAULT_LINK_TIMEOUT, LiveSplitLink, commands};
