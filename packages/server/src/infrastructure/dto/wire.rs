//! Newline-delimited JSON messages exchanged with browser extensions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ProtocolError, RuntimeState, Timestamp};

/// Inbound message types accepted from browser extensions
pub const INBOUND_TYPES: [&str; 3] = ["timer_state", "splits_updated", "connection_test"];

/// `timer_state` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStatePayload {
    pub running: bool,
    pub current_split: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_name: Option<String>,
}

/// `splits_updated` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitsUpdatedPayload {
    pub splits: Vec<String>,
}

/// `connection_test` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// One line of client input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    TimerState(TimerStatePayload),
    SplitsUpdated(SplitsUpdatedPayload),
    ConnectionTest(ConnectionTestPayload),
}

impl InboundMessage {
    /// Parse one line (without its terminator).
    ///
    /// Distinguishes invalid JSON, a missing or unknown `type`, and a payload
    /// that does not match its type.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_string();

        if !INBOUND_TYPES.contains(&kind.as_str()) {
            return Err(ProtocolError::UnknownType(kind));
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
            kind,
            reason: e.to_string(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::TimerState(_) => "timer_state",
            InboundMessage::SplitsUpdated(_) => "splits_updated",
            InboundMessage::ConnectionTest(_) => "connection_test",
        }
    }
}

/// Outbound message type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundType {
    StateUpdate,
    ConnectionTest,
}

/// Acknowledgement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
}

/// State snapshot broadcast to every browser connection on a real change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundSnapshot {
    pub r#type: OutboundType,
    pub current_split: i64,
    pub timer_running: bool,
    pub total_splits: usize,
    /// Unix timestamp (milliseconds)
    pub timestamp: i64,
}

impl OutboundSnapshot {
    pub fn from_state(state: &RuntimeState, at: Timestamp) -> Self {
        Self {
            r#type: OutboundType::StateUpdate,
            current_split: state.active_split_index.value(),
            timer_running: state.timer_running,
            total_splits: state.total_splits(),
            timestamp: at.value(),
        }
    }
}

/// Optional per-message acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMessage {
    pub status: AckStatus,
    pub timestamp: i64,
}

impl AckMessage {
    pub fn ok(at: Timestamp) -> Self {
        Self {
            status: AckStatus::Ok,
            timestamp: at.value(),
        }
    }
}

/// Reply to `connection_test`; never touches runtime state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTestReply {
    pub r#type: OutboundType,
    pub status: AckStatus,
    pub timestamp: i64,
    /// The `timestamp` the tester sent, echoed back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo: Option<f64>,
}

impl ConnectionTestReply {
    pub fn ok(at: Timestamp, echo: Option<f64>) -> Self {
        Self {
            r#type: OutboundType::ConnectionTest,
            status: AckStatus::Ok,
            timestamp: at.value(),
            echo,
        }
    }
}

/// Serialize `message` as one protocol line, newline included.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SplitIndex;

    #[test]
    fn test_parse_timer_state() {
        // テスト項目: timer_state メッセージがパースできる
        // given (前提条件):
        let line = r#"{"type":"timer_state","running":true,"currentSplit":3,"splitName":"Boss"}"#;

        // when (操作):
        let result = InboundMessage::parse(line);

        // then (期待する結果):
        assert_eq!(
            result,
            Ok(InboundMessage::TimerState(TimerStatePayload {
                running: true,
                current_split: 3,
                split_name: Some("Boss".to_string()),
            }))
        );
    }

    #[test]
    fn test_parse_splits_updated_and_connection_test() {
        // テスト項目: splits_updated / connection_test がパースできる
        // when (操作):
        let splits = InboundMessage::parse(r#"{"type":"splits_updated","splits":["A","B"]}"#);
        let test = InboundMessage::parse(
            r#"{"type":"connection_test","timestamp":1712345678901,"source":"popup"}"#,
        );

        // then (期待する結果):
        assert_eq!(splits.unwrap().kind(), "splits_updated");
        match test.unwrap() {
            InboundMessage::ConnectionTest(payload) => {
                assert_eq!(payload.timestamp, Some(1712345678901.0));
                assert_eq!(payload.source.as_deref(), Some("popup"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_errors_are_classified() {
        // テスト項目: 不正な入力はエラー種別ごとに分類される
        // when (操作):
        let not_json = InboundMessage::parse("{not json");
        let no_type = InboundMessage::parse(r#"{"running":true}"#);
        let unknown = InboundMessage::parse(r#"{"type":"settings_update"}"#);
        let bad_payload = InboundMessage::parse(r#"{"type":"timer_state","running":"yes"}"#);

        // then (期待する結果):
        assert!(matches!(not_json, Err(ProtocolError::InvalidJson(_))));
        assert_eq!(no_type, Err(ProtocolError::MissingType));
        assert_eq!(
            unknown,
            Err(ProtocolError::UnknownType("settings_update".to_string()))
        );
        assert!(matches!(
            bad_payload,
            Err(ProtocolError::InvalidPayload { kind, .. }) if kind == "timer_state"
        ));
    }

    #[test]
    fn test_snapshot_wire_shape() {
        // テスト項目: state_update の JSON 形式が仕様通り
        // given (前提条件):
        let mut state = RuntimeState::new();
        state.timer_running = true;
        state.active_split_index = SplitIndex::new(2).unwrap();
        state.split_names = vec!["A".into(), "B".into(), "C".into()];

        // when (操作):
        let line = encode_line(&OutboundSnapshot::from_state(&state, Timestamp::new(42))).unwrap();

        // then (期待する結果):
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "state_update",
                "currentSplit": 2,
                "timerRunning": true,
                "totalSplits": 3,
                "timestamp": 42
            })
        );
    }

    #[test]
    fn test_ack_and_connection_test_reply_shape() {
        // テスト項目: ack と connection_test 応答の JSON 形式
        // when (操作):
        let ack = serde_json::to_value(AckMessage::ok(Timestamp::new(7))).unwrap();
        let reply =
            serde_json::to_value(ConnectionTestReply::ok(Timestamp::new(8), Some(5.0))).unwrap();

        // then (期待する結果):
        assert_eq!(ack, serde_json::json!({"status": "ok", "timestamp": 7}));
        assert_eq!(reply["type"], "connection_test");
        assert_eq!(reply["status"], "ok");
        assert_eq!(reply["echo"], 5.0);
    }
}
