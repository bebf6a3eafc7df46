//! Command-line configuration of the bridge.

use std::time::Duration;

use clap::Parser;

use crate::{
    domain::{DesktopEndpoint, Port},
    infrastructure::repository::inmemory::DEFAULT_CONNECTION_CAPACITY,
    ui::broker::BrokerOptions,
};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "splitnotes-bridge",
    version,
    about = "Synchronizes desktop timer state with SplitNotes browser extensions"
)]
pub struct BridgeConfig {
    /// Host of the desktop timer's command server
    #[arg(long, default_value = "localhost")]
    pub desktop_host: String,

    /// Port of the desktop timer's command server
    #[arg(long, default_value = "16834", value_parser = parse_port)]
    pub desktop_port: Port,

    /// Accept browser-extension connections
    #[arg(long)]
    pub bridge_enabled: bool,

    /// Port the browser-extension bridge listens on
    #[arg(long, default_value = "16835", value_parser = parse_port)]
    pub bridge_port: Port,

    /// Timeout of every desktop request, in milliseconds
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: u64,

    /// Desktop polling period, in milliseconds
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Maximum simultaneous browser connections
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECTION_CAPACITY,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_connections: usize,

    /// Acknowledge every browser state message with `{"status":"ok"}`
    #[arg(long)]
    pub ack: bool,

    /// Serve the HTTP status API on this port
    #[arg(long, value_parser = parse_port)]
    pub status_port: Option<Port>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

fn parse_port(value: &str) -> Result<Port, String> {
    let port: u16 = value
        .parse()
        .map_err(|e| format!("invalid port '{value}': {e}"))?;
    Port::new(port).map_err(|e| e.to_string())
}

impl BridgeConfig {
    pub fn desktop_endpoint(&self) -> DesktopEndpoint {
        DesktopEndpoint::new(self.desktop_host.clone(), self.desktop_port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn broker_options(&self) -> BrokerOptions {
        BrokerOptions {
            send_ack: self.ack,
            max_connections: self.max_connections,
            ..BrokerOptions::default()
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            desktop_host: "localhost".to_string(),
            desktop_port: Port::DESKTOP_DEFAULT,
            bridge_enabled: false,
            bridge_port: Port::BRIDGE_DEFAULT,
            timeout_ms: 500,
            poll_interval_ms: 500,
            max_connections: DEFAULT_CONNECTION_CAPACITY,
            ack: false,
            status_port: None,
            log_level: "info".to_string(),
        }
    }
}
