//! TCP broker for browser-extension connections.
//!
//! Accepts connections on the bridge port, runs one task per connection,
//! relays inbound JSON lines into the reconciler, and broadcasts a
//! `state_update` line to every live connection whenever the reconciler
//! reports a real change.

mod connection;

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use thiserror::Error;
use tokio::{
    net::TcpListener,
    sync::{Mutex, broadcast, watch},
    task::{JoinHandle, JoinSet},
    time::timeout,
};

use crate::{
    domain::{BrowserConnection, ConnectionRepository, Port, Timestamp},
    infrastructure::{
        dto::wire::OutboundSnapshot,
        repository::{InMemoryConnectionRepository, inmemory::DEFAULT_CONNECTION_CAPACITY},
    },
    usecase::{BroadcastSnapshotUseCase, StateNotification, StateReconciler},
};

/// A read that times out just loops again
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// A write that takes longer than this drops the connection
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `stop()` waits for connection tasks before force-closing them
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);

/// Longest accepted inbound line
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Address the bridge listens on
pub const BIND_ADDRESS: Ipv4Addr = Ipv4Addr::LOCALHOST;

#[derive(Debug, Clone)]
pub struct BrokerOptions {
    /// Reply `{"status":"ok"}` to every state message
    pub send_ack: bool,
    pub max_connections: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub stop_grace: Duration,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            send_ack: false,
            max_connections: DEFAULT_CONNECTION_CAPACITY,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

/// The bridge port could not be bound
#[derive(Debug, Error)]
pub enum BindError {
    #[error("Bridge port {port} is already in use")]
    AddrInUse {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied binding bridge port {port}")]
    PermissionDenied {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind bridge port {port}: {source}")]
    Io {
        port: u16,
        #[source]
        source: io::Error,
    },
}

impl BindError {
    fn from_io(port: Port, source: io::Error) -> Self {
        let port = port.value();
        match source.kind() {
            io::ErrorKind::AddrInUse => BindError::AddrInUse { port, source },
            io::ErrorKind::PermissionDenied => BindError::PermissionDenied { port, source },
            _ => BindError::Io { port, source },
        }
    }
}

/// Read-only broker status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerStatus {
    pub running: bool,
    pub port: Option<Port>,
    pub client_count: usize,
    /// Registered connections, oldest first
    pub connections: Vec<BrowserConnection>,
    /// Last snapshot broadcast, if any
    pub last_state: Option<OutboundSnapshot>,
}

/// State shared by the accept loop, the fan-out task and every connection task
pub(crate) struct BrokerContext {
    reconciler: Arc<StateReconciler>,
    repository: Arc<dyn ConnectionRepository>,
    options: BrokerOptions,
    last_state: Mutex<Option<OutboundSnapshot>>,
}

impl BrokerContext {
    async fn broadcast(&self, snapshot: &OutboundSnapshot) -> usize {
        let usecase = BroadcastSnapshotUseCase::new(self.repository.clone());
        match usecase.execute(snapshot).await {
            Ok(report) => {
                *self.last_state.lock().await = Some(snapshot.clone());
                report.delivered
            }
            Err(e) => {
                tracing::error!("Broadcast failed: {}", e);
                0
            }
        }
    }
}

struct RunningBroker {
    port: Port,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
    fanout_task: JoinHandle<()>,
}

pub struct ExtensionBroker {
    context: Arc<BrokerContext>,
    /// Serializes `start` and `stop` end to end
    lifecycle: Mutex<()>,
    /// Only held briefly, so `status` never waits on a shutdown
    running: Mutex<Option<RunningBroker>>,
}

impl ExtensionBroker {
    pub fn new(reconciler: Arc<StateReconciler>, options: BrokerOptions) -> Self {
        let repository = Arc::new(InMemoryConnectionRepository::with_capacity(
            options.max_connections,
        ));
        Self::with_repository(reconciler, repository, options)
    }

    pub fn with_repository(
        reconciler: Arc<StateReconciler>,
        repository: Arc<dyn ConnectionRepository>,
        options: BrokerOptions,
    ) -> Self {
        Self {
            context: Arc::new(BrokerContext {
                reconciler,
                repository,
                options,
                last_state: Mutex::new(None),
            }),
            lifecycle: Mutex::new(()),
            running: Mutex::new(None),
        }
    }

    /// Bind `port` and start accepting connections.
    ///
    /// A no-op returning the current address when already running.
    pub async fn start(&self, port: Port) -> Result<SocketAddr, BindError> {
        let _lifecycle = self.lifecycle.lock().await;
        if let Some(current) = self.running.lock().await.as_ref() {
            if current.port != port {
                tracing::warn!(
                    "Bridge already running on port {}; ignoring start on port {}",
                    current.port,
                    port
                );
            }
            return Ok(current.local_addr);
        }

        let listener = TcpListener::bind((BIND_ADDRESS, port.value()))
            .await
            .map_err(|e| BindError::from_io(port, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| BindError::from_io(port, e))?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        // subscribe before accepting so no change after start() is missed
        let notifications = self.context.reconciler.subscribe();

        let accept_task = tokio::spawn(accept_loop(
            self.context.clone(),
            listener,
            shutdown_rx.clone(),
        ));
        let fanout_task = tokio::spawn(fanout_loop(
            self.context.clone(),
            notifications,
            shutdown_rx,
        ));

        *self.running.lock().await = Some(RunningBroker {
            port,
            local_addr,
            shutdown,
            accept_task,
            fanout_task,
        });

        tracing::info!("Bridge server listening on {}", local_addr);
        Ok(local_addr)
    }

    /// Stop accepting, close every connection and wait for the accept loop to exit.
    ///
    /// Safe to call when not running. `start()` may be called again afterwards.
    pub async fn stop(&self) {
        // a concurrent start() waits here until the port is released
        let _lifecycle = self.lifecycle.lock().await;
        let Some(broker) = self.running.lock().await.take() else {
            return;
        };

        let _ = broker.shutdown.send(true);

        let limit = self.context.options.stop_grace + Duration::from_millis(500);
        let mut accept_task = broker.accept_task;
        if timeout(limit, &mut accept_task).await.is_err() {
            tracing::warn!("Accept loop did not exit within {:?}; aborting", limit);
            accept_task.abort();
            let _ = accept_task.await;
        }

        let mut fanout_task = broker.fanout_task;
        if timeout(limit, &mut fanout_task).await.is_err() {
            fanout_task.abort();
            let _ = fanout_task.await;
        }

        let dropped = self.context.repository.clear().await;
        tracing::info!(
            "Bridge server on port {} stopped ({} connection(s) dropped at shutdown)",
            broker.port,
            dropped
        );
    }

    /// Send `snapshot` to every registered connection.
    ///
    /// Returns how many connections it was queued for.
    pub async fn broadcast(&self, snapshot: &OutboundSnapshot) -> usize {
        self.context.broadcast(snapshot).await
    }

    pub async fn status(&self) -> BrokerStatus {
        let (running, port) = {
            let running = self.running.lock().await;
            (running.is_some(), running.as_ref().map(|r| r.port))
        };
        let connections = self.context.repository.get_connections().await;
        BrokerStatus {
            running,
            port,
            client_count: connections.len(),
            connections,
            last_state: self.context.last_state.lock().await.clone(),
        }
    }

    /// Address the listener is bound to, while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.local_addr)
    }
}

async fn accept_loop(
    context: Arc<BrokerContext>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, remote)) => {
                        tracing::debug!("Accepted TCP connection from {}", remote);
                        connections.spawn(connection::handle_connection(
                            context.clone(),
                            stream,
                            remote,
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!("Accept failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    // release the port before waiting on connection tasks
    drop(listener);

    let grace = context.options.stop_grace;
    let drained = timeout(grace, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            "{} connection task(s) still running after {:?}; force-closing",
            connections.len(),
            grace
        );
        connections.abort_all();
        while connections.join_next().await.is_some() {}
    }
}

async fn fanout_loop(
    context: Arc<BrokerContext>,
    mut notifications: broadcast::Receiver<StateNotification>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            received = notifications.recv() => {
                match received {
                    Ok(notification) => {
                        let snapshot =
                            OutboundSnapshot::from_state(&notification.state, Timestamp::now());
                        context.broadcast(&snapshot).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // intermediate states are gone; send where we are now
                        tracing::warn!("Broadcast fell behind by {} change(s)", skipped);
                        let state = context.reconciler.snapshot().await;
                        let snapshot = OutboundSnapshot::from_state(&state, Timestamp::now());
                        context.broadcast(&snapshot).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
