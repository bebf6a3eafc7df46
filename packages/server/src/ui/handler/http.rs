//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use splitnotes_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::{DesktopEndpoint, Port, StateSource, Timestamp},
    infrastructure::dto::http::{
        BrokerStatusDto, ConnectionDto, DesktopTargetDto, RuntimeStateDto, StatusDto,
    },
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Broker status and runtime state
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusDto> {
    let broker = state.broker.status().await;
    let view = state.reconciler.view(Timestamp::now()).await;
    let target = state.scheduler.endpoint();

    let source = match view.state.source {
        StateSource::Desktop => "desktop",
        StateSource::Browser => "browser",
        StateSource::None => "none",
    };

    Json(StatusDto {
        broker: BrokerStatusDto {
            running: broker.running,
            port: broker.port.map(|p| p.value()),
            client_count: broker.client_count,
            connections: broker
                .connections
                .into_iter()
                .map(|c| ConnectionDto {
                    id: c.id.to_string(),
                    remote_address: c.remote_address.to_string(),
                    connected_at: timestamp_to_rfc3339(c.connected_at.value()),
                })
                .collect(),
            last_state: broker.last_state,
        },
        desktop: DesktopTargetDto {
            host: target.host,
            port: target.port.value(),
        },
        state: RuntimeStateDto {
            timer_running: view.state.timer_running,
            active_split_index: view.state.active_split_index.value(),
            total_splits: view.state.total_splits(),
            current_split_name: view.state.current_split_name,
            source: source.to_string(),
            desktop_connected: view.state.desktop_connected,
            display_current: view.freshness.display_current,
            live: view.freshness.live,
            last_browser_update_at: view
                .state
                .last_browser_update_at
                .and_then(|t| timestamp_to_rfc3339(t.value())),
        },
    })
}

/// Drop the desktop link and reconnect on the next tick
pub async fn reset_desktop_link(State(state): State<Arc<AppState>>) -> StatusCode {
    state.scheduler.force_reset();
    StatusCode::ACCEPTED
}

/// Point the scheduler at another desktop timer
pub async fn set_desktop_target(
    State(state): State<Arc<AppState>>,
    Json(target): Json<DesktopTargetDto>,
) -> Result<StatusCode, StatusCode> {
    let host = target.host.trim();
    if host.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let port = Port::new(target.port).map_err(|_| StatusCode::BAD_REQUEST)?;

    state.scheduler.retarget(DesktopEndpoint::new(host, port));
    Ok(StatusCode::ACCEPTED)
}
