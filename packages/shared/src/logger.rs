//! Logger setup shared by every binary in the workspace.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence. Without it, `default_level` applies to the
/// calling binary and to the workspace crates, and everything else stays at `warn`.
pub fn setup_logger(bin_name: &str, default_level: &str) {
    let crate_name = bin_name.replace('-', "_");
    let default_directive = format!(
        "warn,{crate_name}={default_level},splitnotes_bridge={default_level},splitnotes_probe={default_level},tower_http={default_level}"
    );

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // may be called more than once in tests
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
