//! Lines the bridge sends back to a client.

use serde::Deserialize;
use splitnotes_bridge::infrastructure::dto::wire::{
    AckMessage, ConnectionTestReply, OutboundSnapshot,
};

/// Any line the bridge may send
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    StateUpdate(OutboundSnapshot),
    ConnectionTest(ConnectionTestReply),
    Ack(AckMessage),
}

impl ServerMessage {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
