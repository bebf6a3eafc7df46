//! TCP client speaking the browser-extension protocol.

use std::time::{Duration, Instant};

use splitnotes_bridge::infrastructure::dto::wire::{
    ConnectionTestPayload, InboundMessage, SplitsUpdatedPayload, TimerStatePayload, encode_line,
};
use splitnotes_shared::time::get_unix_timestamp_millis;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time::timeout,
};

use crate::{error::ProbeError, message::ServerMessage};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ProbeClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Duration,
}

impl ProbeClient {
    pub async fn connect(host: &str, port: u16, limit: Duration) -> Result<Self, ProbeError> {
        let addr = format!("{host}:{port}");
        let stream = match timeout(limit, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ProbeError::Connect { addr, source }),
            Err(_) => return Err(ProbeError::Timeout(limit)),
        };
        tracing::debug!("Connected to bridge at {}", addr);

        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
            timeout: limit,
        })
    }

    pub async fn send(&mut self, message: &InboundMessage) -> Result<(), ProbeError> {
        let line = encode_line(message)?;
        tracing::debug!("Sending '{}'", message.kind());
        timeout(self.timeout, self.writer.write_all(line.as_bytes()))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;
        Ok(())
    }

    pub async fn send_timer_state(
        &mut self,
        running: bool,
        current_split: i64,
        split_name: Option<String>,
    ) -> Result<(), ProbeError> {
        self.send(&InboundMessage::TimerState(TimerStatePayload {
            running,
            current_split,
            split_name,
        }))
        .await
    }

    pub async fn send_splits(&mut self, splits: Vec<String>) -> Result<(), ProbeError> {
        self.send(&InboundMessage::SplitsUpdated(SplitsUpdatedPayload { splits }))
            .await
    }

    /// Wait up to `limit` for the next line.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. Lines that are not
    /// valid bridge messages are logged and skipped.
    pub async fn next_message(&mut self, limit: Duration) -> Result<Option<ServerMessage>, ProbeError> {
        let deadline = Instant::now() + limit;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let mut line = String::new();
            let read = match timeout(remaining, self.reader.read_line(&mut line)).await {
                Ok(read) => read?,
                Err(_) => return Ok(None),
            };
            if read == 0 {
                return Err(ProbeError::Closed);
            }
            match ServerMessage::parse(line.trim_end()) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => tracing::warn!("Skipping unrecognized line '{}': {}", line.trim_end(), e),
            }
        }
    }

    /// Send `connection_test` and wait for its reply.
    ///
    /// Returns the round-trip time. Other messages received meanwhile are dropped.
    pub async fn connection_test(&mut self) -> Result<Duration, ProbeError> {
        let sent_at = get_unix_timestamp_millis() as f64;
        let started = Instant::now();
        self.send(&InboundMessage::ConnectionTest(ConnectionTestPayload {
            timestamp: Some(sent_at),
            source: Some("splitnotes-probe".to_string()),
        }))
        .await?;

        loop {
            let remaining = self.timeout.saturating_sub(started.elapsed());
            match self.next_message(remaining).await? {
                Some(ServerMessage::ConnectionTest(reply)) => {
                    if reply.echo.is_some_and(|echo| echo != sent_at) {
                        return Err(ProbeError::UnexpectedMessage(format!(
                            "echo {:?} does not match {}",
                            reply.echo, sent_at
                        )));
                    }
                    return Ok(started.elapsed());
                }
                Some(other) => tracing::debug!("Ignoring {:?} while waiting for reply", other),
                None => return Err(ProbeError::Timeout(self.timeout)),
            }
        }
    }
}
