//! Process wiring: reconciler, broker, scheduler and optional status API.

use std::{future::Future, io, net::Ipv4Addr, sync::Arc};

use thiserror::Error;
use tokio::{net::TcpListener, sync::watch};

use crate::{
    config::BridgeConfig,
    infrastructure::desktop::LiveSplitLink,
    ui::{
        broker::ExtensionBroker, handler::create_router, scheduler::SyncScheduler, signal,
        state::AppState,
    },
    usecase::StateReconciler,
};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to bind status API on port {port}: {source}")]
    StatusBind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Status API failed: {0}")]
    StatusServe(#[source] io::Error),
}

/// Run until Ctrl+C or SIGTERM.
pub async fn run(config: BridgeConfig) -> Result<(), RunError> {
    run_until(config, signal::shutdown_signal()).await
}

/// Run until `shutdown` resolves.
///
/// A bridge port that cannot be bound is logged and the process keeps
/// polling the desktop timer without the bridge.
pub async fn run_until<F>(config: BridgeConfig, shutdown: F) -> Result<(), RunError>
where
    F: Future<Output = ()> + Send,
{
    let reconciler = Arc::new(StateReconciler::new());
    let broker = Arc::new(ExtensionBroker::new(
        reconciler.clone(),
        config.broker_options(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let link = Box::new(LiveSplitLink::new(config.timeout()));
    let (scheduler, control) = SyncScheduler::new(
        link,
        reconciler.clone(),
        config.desktop_endpoint(),
        config.poll_interval(),
    );

    let status_task = match config.status_port {
        Some(port) => {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port.value()))
                .await
                .map_err(|source| RunError::StatusBind {
                    port: port.value(),
                    source,
                })?;
            tracing::info!("Status API listening on {}", port);

            let app = create_router(Arc::new(AppState {
                broker: broker.clone(),
                reconciler: reconciler.clone(),
                scheduler: control,
            }));
            let mut stop = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = stop.wait_for(|stopping| *stopping).await;
                    })
                    .await
            }))
        }
        None => None,
    };

    if config.bridge_enabled {
        if let Err(e) = broker.start(config.bridge_port).await {
            tracing::error!("Bridge server disabled: {}", e);
        }
    } else {
        tracing::info!("Bridge server disabled by configuration");
    }

    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx));

    shutdown.await;
    tracing::info!("Shutting down");

    let _ = shutdown_tx.send(true);
    broker.stop().await;
    if let Err(e) = scheduler_task.await {
        tracing::warn!("Scheduler task ended abnormally: {}", e);
    }

    if let Some(task) = status_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(RunError::StatusServe(e)),
            Err(e) => tracing::warn!("Status API task ended abnormally: {}", e),
        }
    }

    tracing::info!("Bridge stopped");
    Ok(())
}
