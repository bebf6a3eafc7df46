//! SplitNotes bridge server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin splitnotes-bridge -- --bridge-enabled
//! ```

use clap::Parser;
use splitnotes_bridge::BridgeConfig;
use splitnotes_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    let config = BridgeConfig::parse();
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    if let Err(e) = splitnotes_bridge::run(config).await {
        tracing::error!("Bridge error: {}", e);
        std::process::exit(1);
    }
}
