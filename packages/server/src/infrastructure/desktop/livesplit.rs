//! TCP link to the desktop timer's command server.
//!
//! The protocol is one `\r\n`-terminated command per request and one
//! newline-terminated response line.

use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};

use crate::domain::{DesktopEndpoint, LinkError, SplitIndex, TimerLink};

/// Timeout applied to every network call on the link
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_millis(500);

/// Commands understood by the desktop timer
pub mod commands {
    pub const CURRENT_SPLIT_INDEX: &str = "getsplitindex\r\n";
    pub const CURRENT_SPLIT_NAME: &str = "getcurrentsplitname\r\n";
    pub const BEST_POSSIBLE_TIME: &str = "getbestpossibletime\r\n";
}

pub struct LiveSplitLink {
    timeout: Duration,
    stream: Option<BufReader<TcpStream>>,
    /// Endpoint of the last successful connect, cleared by `close`
    endpoint: Option<DesktopEndpoint>,
}

impl LiveSplitLink {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            stream: None,
            endpoint: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Send one command and read one response line.
    ///
    /// A timeout or I/O failure drops the socket, since a late reply would
    /// otherwise be read as the answer to the next command.
    async fn request(&mut self, command: &str) -> Result<String, LinkError> {
        let limit = self.timeout;
        let stream = self.stream.as_mut().ok_or(LinkError::NotConnected)?;

        let exchange = async {
            stream.get_mut().write_all(command.as_bytes()).await?;
            let mut line = String::new();
            let read = stream.read_line(&mut line).await?;
            if read == 0 {
                return Err(LinkError::Closed);
            }
            Ok::<String, LinkError>(line.trim_end_matches(['\r', '\n']).to_string())
        };

        let result = match timeout(limit, exchange).await {
            Ok(result) => result,
            Err(_) => Err(LinkError::Timeout(limit)),
        };

        if matches!(
            result,
            Err(LinkError::Timeout(_) | LinkError::Io(_) | LinkError::Closed)
        ) {
            self.stream = None;
        }
        result
    }

    async fn open(&mut self, endpoint: &DesktopEndpoint) -> Result<(), LinkError> {
        let address = format!("{}:{}", endpoint.host, endpoint.port);
        let stream = timeout(self.timeout, TcpStream::connect(address))
            .await
            .map_err(|_| LinkError::Timeout(self.timeout))??;
        stream.set_nodelay(true)?;

        self.stream = Some(BufReader::new(stream));
        Ok(())
    }

    /// Send a best-effort command.
    ///
    /// If the exchange cost the socket, a fresh one is opened to the same
    /// endpoint so the next index poll does not see a dead link. A failed
    /// reopen leaves the link closed for the next poll to report.
    async fn request_best_effort(&mut self, command: &str) -> Result<String, LinkError> {
        let result = self.request(command).await;
        if result.is_err() && self.stream.is_none() {
            if let Some(endpoint) = self.endpoint.clone() {
                match self.open(&endpoint).await {
                    Ok(()) => tracing::debug!("Reopened desktop link to {}", endpoint),
                    Err(e) => tracing::debug!("Reopening desktop link to {} failed: {}", endpoint, e),
                }
            }
        }
        result
    }
}

impl Default for LiveSplitLink {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_TIMEOUT)
    }
}

#[async_trait]
impl TimerLink for LiveSplitLink {
    async fn connect(&mut self, endpoint: &DesktopEndpoint) -> Result<(), LinkError> {
        self.close().await;
        self.open(endpoint).await?;
        self.endpoint = Some(endpoint.clone());
        Ok(())
    }

    async fn poll_split_index(&mut self) -> Result<SplitIndex, LinkError> {
        let response = self.request(commands::CURRENT_SPLIT_INDEX).await?;
        response
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|value| SplitIndex::new(value).ok())
            .ok_or(LinkError::InvalidResponse(response))
    }

    async fn poll_split_name(&mut self) -> Result<String, LinkError> {
        self.request_best_effort(commands::CURRENT_SPLIT_NAME).await
    }

    async fn poll_best_possible_time(&mut self) -> Result<String, LinkError> {
        self.request_best_effort(commands::BEST_POSSIBLE_TIME).await
    }

    async fn check_connection(&mut self) -> bool {
        self.request(commands::CURRENT_SPLIT_INDEX).await.is_ok()
    }

    async fn close(&mut self) {
        self.endpoint = None;
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.get_mut().shutdown().await;
        }
    }
}
