//! Per-connection task of the extension broker.

use std::{io, net::SocketAddr, sync::Arc};

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Duration, timeout},
};

use crate::{
    domain::{BrowserConnection, ConnectionId, DisconnectError, ProtocolError, Timestamp},
    infrastructure::dto::wire::{AckMessage, ConnectionTestReply, InboundMessage, encode_line},
    usecase::{
        ConnectBrowserUseCase, DisconnectBrowserUseCase, HandleInboundUseCase, InboundEffect,
    },
};

use super::{BrokerContext, MAX_LINE_BYTES};

/// Result of one bounded line read
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    /// A full line, including its `\n`, is in the buffer
    Line,
    /// Peer closed the stream
    Eof,
    /// The buffer exceeded the limit. `complete` is set when the newline was seen.
    TooLong { complete: bool },
}

pub(super) async fn handle_connection(
    context: Arc<BrokerContext>,
    stream: TcpStream,
    remote: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) {
    if *shutdown.borrow() {
        return;
    }

    let id = ConnectionId::generate();
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    let connect_usecase = ConnectBrowserUseCase::new(context.repository.clone());
    match connect_usecase
        .execute(BrowserConnection::new(id, remote, Timestamp::now()), tx)
        .await
    {
        Ok(count) => {
            tracing::info!(
                "Browser connection '{}' from {} accepted ({} connected)",
                id,
                remote,
                count
            );
        }
        Err(e) => {
            tracing::warn!("Rejecting browser connection from {}: {}", remote, e);
            return;
        }
    }

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Failed to set TCP_NODELAY for '{}': {}", id, e);
    }
    let (read_half, write_half) = stream.into_split();

    let mut send_task = tokio::spawn(write_loop(write_half, rx, context.options.write_timeout));

    let reason = read_loop(&context, id, read_half, &mut send_task, &mut shutdown).await;
    send_task.abort();

    let disconnect_usecase = DisconnectBrowserUseCase::new(context.repository.clone());
    match disconnect_usecase.execute(&id).await {
        Ok(remaining) => {
            tracing::info!(
                "Browser connection '{}' closed: {} ({} remaining)",
                id,
                reason,
                remaining
            );
        }
        Err(_) => {
            tracing::debug!("Browser connection '{}' closed: {} (already removed)", id, reason);
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<String>,
    write_timeout: Duration,
) -> Result<(), DisconnectError> {
    while let Some(line) = rx.recv().await {
        match timeout(write_timeout, writer.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(DisconnectError::WriteFailed(e.to_string())),
            Err(_) => {
                return Err(DisconnectError::WriteFailed(format!(
                    "write timed out after {:?}",
                    write_timeout
                )));
            }
        }
    }
    // registry dropped the sender: the connection was removed
    let _ = writer.shutdown().await;
    Ok(())
}

async fn read_loop(
    context: &BrokerContext,
    id: ConnectionId,
    read_half: OwnedReadHalf,
    send_task: &mut JoinHandle<Result<(), DisconnectError>>,
    shutdown: &mut watch::Receiver<bool>,
) -> DisconnectError {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();
    // skipping the rest of an oversized line
    let mut discarding = false;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return DisconnectError::Shutdown;
                }
            }
            finished = &mut *send_task => {
                return match finished {
                    Ok(Err(e)) => e,
                    Ok(Ok(())) => DisconnectError::Shutdown,
                    Err(e) => DisconnectError::WriteFailed(e.to_string()),
                };
            }
            read = timeout(
                context.options.read_timeout,
                read_line_bounded(&mut reader, &mut buf, MAX_LINE_BYTES),
            ) => {
                match read {
                    // idle peer; bytes read so far stay in `buf`
                    Err(_) => continue,
                    Ok(Err(e)) => return DisconnectError::ReadFailed(e.to_string()),
                    Ok(Ok(LineRead::Eof)) => {
                        if !buf.is_empty() && !discarding {
                            process_line(context, id, &buf).await;
                        }
                        return DisconnectError::PeerClosed;
                    }
                    Ok(Ok(LineRead::TooLong { complete })) => {
                        if !discarding {
                            tracing::warn!(
                                "Discarding line from '{}': {}",
                                id,
                                ProtocolError::LineTooLong { max: MAX_LINE_BYTES }
                            );
                        }
                        buf.clear();
                        discarding = !complete;
                    }
                    Ok(Ok(LineRead::Line)) => {
                        if discarding {
                            discarding = false;
                        } else {
                            process_line(context, id, &buf).await;
                        }
                        buf.clear();
                    }
                }
            }
        }
    }
}

/// Read up to and including the next `\n` into `buf`.
///
/// Bytes are moved into `buf` as soon as they are consumed from `reader`, so
/// dropping the future mid-read loses nothing.
async fn read_line_bounded<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(LineRead::Eof);
        }

        if let Some(pos) = available.iter().position(|b| *b == b'\n') {
            buf.extend_from_slice(&available[..=pos]);
            reader.consume(pos + 1);
            if buf.len() > max + 1 {
                return Ok(LineRead::TooLong { complete: true });
            }
            return Ok(LineRead::Line);
        }

        let len = available.len();
        buf.extend_from_slice(available);
        reader.consume(len);
        if buf.len() > max {
            return Ok(LineRead::TooLong { complete: false });
        }
    }
}

async fn process_line(context: &BrokerContext, id: ConnectionId, raw: &[u8]) {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim_end_matches(['\r', '\n']),
        Err(_) => {
            tracing::warn!("Discarding line from '{}': {}", id, ProtocolError::InvalidUtf8);
            return;
        }
    };
    if line.trim().is_empty() {
        return;
    }

    let message = match InboundMessage::parse(line) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Discarding line from '{}': {}", id, e);
            return;
        }
    };
    tracing::debug!("Received '{}' from '{}'", message.kind(), id);

    let now = Timestamp::now();
    let usecase = HandleInboundUseCase::new(context.reconciler.clone());
    let effect = match usecase.execute(message, now).await {
        Ok(effect) => effect,
        Err(e) => {
            tracing::warn!("Discarding message from '{}': {}", id, e);
            return;
        }
    };

    let reply = match effect {
        InboundEffect::ConnectionTest { echo } => Some(encode_line(&ConnectionTestReply::ok(now, echo))),
        _ if context.options.send_ack => Some(encode_line(&AckMessage::ok(now))),
        _ => None,
    };

    match reply {
        Some(Ok(line)) => {
            if let Err(e) = context.repository.send_to(&id, &line).await {
                tracing::debug!("Reply to '{}' not queued: {}", id, e);
            }
        }
        Some(Err(e)) => tracing::error!("Failed to encode reply for '{}': {}", id, e),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_line_bounded_splits_lines() {
        // テスト項目: 改行ごとに 1 行ずつ読み出される
        // given (前提条件):
        let mut reader = BufReader::new(&b"{\"a\":1}\n{\"b\":2}\n"[..]);
        let mut buf = Vec::new();

        // when (操作):
        let first = read_line_bounded(&mut reader, &mut buf, 64).await.unwrap();
        let first_line = buf.clone();
        buf.clear();
        let second = read_line_bounded(&mut reader, &mut buf, 64).await.unwrap();

        // then (期待する結果):
        assert_eq!(first, LineRead::Line);
        assert_eq!(first_line, b"{\"a\":1}\n");
        assert_eq!(second, LineRead::Line);
        assert_eq!(buf, b"{\"b\":2}\n");
    }

    #[tokio::test]
    async fn test_read_line_bounded_reports_eof_with_partial_line() {
        // テスト項目: 改行なしで切断された場合は EOF と途中までのデータが残る
        // given (前提条件):
        let mut reader = BufReader::new(&b"partial"[..]);
        let mut buf = Vec::new();

        // when (操作):
        let result = read_line_bounded(&mut reader, &mut buf, 64).await.unwrap();

        // then (期待する結果):
        assert_eq!(result, LineRead::Eof);
        assert_eq!(buf, b"partial");
    }

    #[tokio::test]
    async fn test_read_line_bounded_rejects_oversized_line() {
        // テスト項目: 上限を超えた時点で TooLong が返り、その後の行は通常通り読める
        // given (前提条件): 上限 8 バイトに対して 20 バイトの行
        let data = [vec![b'x'; 20], b"\nok\n".to_vec()].concat();
        let mut reader = BufReader::with_capacity(4, &data[..]);
        let mut buf = Vec::new();

        // when (操作):
        let first = read_line_bounded(&mut reader, &mut buf, 8).await.unwrap();
        buf.clear();
        // 残りの 8 バイトと改行は呼び出し側が読み捨てる
        let tail = read_line_bounded(&mut reader, &mut buf, 8).await.unwrap();
        let tail_line = buf.clone();
        buf.clear();
        let next = read_line_bounded(&mut reader, &mut buf, 8).await.unwrap();

        // then (期待する結果):
        assert_eq!(first, LineRead::TooLong { complete: false });
        assert_eq!(tail, LineRead::Line);
        assert_eq!(tail_line, [vec![b'x'; 8], b"\n".to_vec()].concat());
        assert_eq!(next, LineRead::Line);
        assert_eq!(buf, b"ok\n");
    }

    #[tokio::test]
    async fn test_read_line_bounded_complete_oversized_line() {
        // テスト項目: 改行まで一度に届いた長すぎる行は complete 付きで報告される
        // given (前提条件):
        let data = [vec![b'y'; 12], b"\n".to_vec()].concat();
        let mut reader = BufReader::new(&data[..]);
        let mut buf = Vec::new();

        // when (操作):
        let result = read_line_bounded(&mut reader, &mut buf, 8).await.unwrap();

        // then (期待する結果):
        assert_eq!(result, LineRead::TooLong { complete: true });
    }
}
