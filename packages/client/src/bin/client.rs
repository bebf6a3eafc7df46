//! SplitNotes bridge probe.
//!
//! Connects to the bridge as a browser extension would.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin splitnotes-probe -- test
//! cargo run --bin splitnotes-probe -- push --running --split 2
//! cargo run --bin splitnotes-probe -- watch
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};
use splitnotes_probe::{ProbeClient, ProbeError, ServerMessage};
use splitnotes_shared::{logger::setup_logger, time::timestamp_to_rfc3339};

#[derive(Debug, Parser)]
#[command(name = "splitnotes-probe", version, about = "Talk to a SplitNotes bridge like a browser extension")]
struct Cli {
    /// Bridge host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Bridge port
    #[arg(long, default_value_t = 16835)]
    port: u16,

    /// Network timeout, in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send connection_test and print the round trip
    Test,
    /// Send a timer_state message
    Push {
        #[arg(long)]
        running: bool,
        #[arg(long, allow_negative_numbers = true)]
        split: i64,
        #[arg(long)]
        name: Option<String>,
    },
    /// Send a splits_updated message
    Splits { names: Vec<String> },
    /// Print every message from the bridge until Ctrl+C
    Watch,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logger(env!("CARGO_BIN_NAME"), &cli.log_level);

    if let Err(e) = run(cli).await {
        tracing::error!("Probe error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ProbeError> {
    let limit = Duration::from_millis(cli.timeout_ms);
    let mut client = ProbeClient::connect(&cli.host, cli.port, limit).await?;

    match cli.command {
        Command::Test => {
            let rtt = client.connection_test().await?;
            println!("Bridge at {}:{} answered in {:?}", cli.host, cli.port, rtt);
        }
        Command::Push {
            running,
            split,
            name,
        } => {
            client.send_timer_state(running, split, name).await?;
            print_replies(&mut client, limit).await?;
        }
        Command::Splits { names } => {
            client.send_splits(names).await?;
            print_replies(&mut client, limit).await?;
        }
        Command::Watch => loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                message = client.next_message(Duration::from_secs(60)) => {
                    if let Some(message) = message? {
                        print_message(&message);
                    }
                }
            }
        },
    }
    Ok(())
}

/// Print whatever the bridge sends within `limit`.
async fn print_replies(client: &mut ProbeClient, limit: Duration) -> Result<(), ProbeError> {
    while let Some(message) = client.next_message(limit).await? {
        print_message(&message);
    }
    Ok(())
}

fn print_message(message: &ServerMessage) {
    match message {
        ServerMessage::StateUpdate(snapshot) => println!(
            "[{}] state_update: running={} split={} total={}",
            timestamp_to_rfc3339(snapshot.timestamp).unwrap_or_default(),
            snapshot.timer_running,
            snapshot.current_split,
            snapshot.total_splits
        ),
        ServerMessage::ConnectionTest(reply) => println!(
            "[{}] connection_test: {:?}",
            timestamp_to_rfc3339(reply.timestamp).unwrap_or_default(),
            reply.status
        ),
        ServerMessage::Ack(ack) => println!(
            "[{}] ack: {:?}",
            timestamp_to_rfc3339(ack.timestamp).unwrap_or_default(),
            ack.status
        ),
    }
}
