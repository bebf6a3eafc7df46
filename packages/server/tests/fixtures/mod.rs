//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use serde_json::Value;
use splitnotes_bridge::{
    domain::Port,
    ui::{BrokerOptions, ExtensionBroker},
    usecase::StateReconciler,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    task::JoinHandle,
    time::timeout,
};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Broker running in-process on a fixed port
pub struct TestBroker {
    pub broker: Arc<ExtensionBroker>,
    pub reconciler: Arc<StateReconciler>,
    pub addr: SocketAddr,
}

impl TestBroker {
    pub async fn start(port: u16) -> Self {
        Self::start_with(port, BrokerOptions::default()).await
    }

    pub async fn start_with(port: u16, options: BrokerOptions) -> Self {
        let reconciler = Arc::new(StateReconciler::new());
        let broker = Arc::new(ExtensionBroker::new(reconciler.clone(), options));
        let addr = broker
            .start(Port::new(port).expect("test port out of range"))
            .await
            .expect("Failed to start broker");
        Self {
            broker,
            reconciler,
            addr,
        }
    }

    /// Wait until the broker has registered `count` connections.
    pub async fn wait_for_clients(&self, count: usize) {
        let broker = self.broker.clone();
        wait_until(move || {
            let broker = broker.clone();
            async move { broker.status().await.client_count == count }
        })
        .await;
    }
}

/// Browser-extension stand-in speaking newline-delimited JSON
pub struct TestClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        Self::try_connect(addr)
            .await
            .expect("Failed to connect to broker")
    }

    pub async fn try_connect(addr: SocketAddr) -> Option<Self> {
        let stream = TcpStream::connect(addr).await.ok()?;
        let (read_half, writer) = stream.into_split();
        Some(Self {
            reader: BufReader::new(read_half),
            writer,
        })
    }

    pub async fn send_raw(&mut self, data: &[u8]) {
        self.writer
            .write_all(data)
            .await
            .expect("Failed to write to broker");
    }

    pub async fn send_json(&mut self, value: Value) {
        let line = format!("{value}\n");
        self.send_raw(line.as_bytes()).await;
    }

    /// Next JSON line, or `None` on timeout or EOF.
    pub async fn recv_within(&mut self, limit: Duration) -> Option<Value> {
        let mut line = String::new();
        match timeout(limit, self.reader.read_line(&mut line)).await {
            Ok(Ok(0)) | Err(_) => None,
            Ok(Ok(_)) => Some(serde_json::from_str(&line).expect("Broker sent invalid JSON")),
            Ok(Err(_)) => None,
        }
    }

    pub async fn recv(&mut self) -> Value {
        self.recv_within(RECV_TIMEOUT)
            .await
            .expect("Timed out waiting for a message")
    }

    /// Skip lines until one with `"type": kind` arrives.
    pub async fn recv_type(&mut self, kind: &str) -> Value {
        loop {
            let message = self.recv().await;
            if message["type"] == kind {
                return message;
            }
        }
    }

    /// Whether the broker closed the connection within `limit`.
    pub async fn is_closed_within(&mut self, limit: Duration) -> bool {
        let mut line = String::new();
        loop {
            match timeout(limit, self.reader.read_line(&mut line)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(_)) => line.clear(),
                Err(_) => return false,
            }
        }
    }
}

pub fn timer_state(running: bool, current_split: i64) -> Value {
    serde_json::json!({
        "type": "timer_state",
        "running": running,
        "currentSplit": current_split,
    })
}

/// Desktop timer stand-in answering the command protocol
pub struct FakeDesktop {
    index: Arc<AtomicI64>,
    answer_names: Arc<AtomicBool>,
    pub requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeDesktop {
    pub async fn start(port: u16, initial_index: i64) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("Failed to bind fake desktop timer");
        let index = Arc::new(AtomicI64::new(initial_index));
        let requests = Arc::new(AtomicUsize::new(0));
        let answer_names = Arc::new(AtomicBool::new(true));

        let task = {
            let index = index.clone();
            let requests = requests.clone();
            let answer_names = answer_names.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let index = index.clone();
                    let requests = requests.clone();
                    let answer_names = answer_names.clone();
                    tokio::spawn(async move {
                        let (read_half, mut writer) = stream.into_split();
                        let mut lines = BufReader::new(read_half).lines();
                        while let Ok(Some(command)) = lines.next_line().await {
                            requests.fetch_add(1, Ordering::SeqCst);
                            let current = index.load(Ordering::SeqCst);
                            let reply = match command.trim() {
                                "getsplitindex" => current.to_string(),
                                "getcurrentsplitname" if !answer_names.load(Ordering::SeqCst) => {
                                    continue;
                                }
                                "getcurrentsplitname" => format!("Split {current}"),
                                "getbestpossibletime" => "1:23:45.67".to_string(),
                                _ => "-".to_string(),
                            };
                            if writer.write_all(format!("{reply}\r\n").as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
            })
        };

        Self {
            index,
            answer_names,
            requests,
            task,
        }
    }

    pub fn set_index(&self, value: i64) {
        self.index.store(value, Ordering::SeqCst);
    }

    /// Stop answering `getcurrentsplitname`; the request is read and ignored.
    pub fn mute_split_names(&self) {
        self.answer_names.store(false, Ordering::SeqCst);
    }
}

impl Drop for FakeDesktop {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Poll `condition` every 20ms for up to two seconds.
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let result = timeout(RECV_TIMEOUT, async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "Condition not met within {:?}", RECV_TIMEOUT);
}
