//! HTTP status API response DTOs.

use serde::{Deserialize, Serialize};

use super::wire::OutboundSnapshot;

/// Broker status for the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStatusDto {
    pub running: bool,
    pub port: Option<u16>,
    pub client_count: usize,
    pub connections: Vec<ConnectionDto>,
    pub last_state: Option<OutboundSnapshot>,
}

/// One connected browser extension
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDto {
    pub id: String,
    pub remote_address: String,
    pub connected_at: Option<String>, // ISO 8601
}

/// Runtime state for the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStateDto {
    pub timer_running: bool,
    pub active_split_index: i64,
    pub current_split_name: Option<String>,
    pub total_splits: usize,
    pub source: String,
    pub desktop_connected: bool,
    pub display_current: bool,
    pub live: bool,
    pub last_browser_update_at: Option<String>, // ISO 8601
}

/// Desktop timer address, in the status document and as the retarget request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopTargetDto {
    pub host: String,
    pub port: u16,
}

/// Full status document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDto {
    pub broker: BrokerStatusDto,
    pub desktop: DesktopTargetDto,
    pub state: RuntimeStateDto,
}
