//! WebSocket event envelopes.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handshake parameters carried in the upgrade request's query string
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandshakeQuery {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DialogCoordsDto {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStateDto {
    pub running: bool,
    pub end_time: i64,
    pub original_duration_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStateDto {
    pub text: String,
    pub enabled: bool,
    pub dialog_coords: Option<DialogCoordsDto>,
    pub host_allowed: bool,
    pub host_connected: bool,
    pub timer: TimerStateDto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerActionDto {
    pub action: TimerAction,
    /// Countdown length in seconds; required for `start`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResultDto {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Events a peer sends to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    UpdateText(String),
    UpdateEnabled(bool),
    UpdateDialogCoords(Option<DialogCoordsDto>),
    TimerAction(TimerActionDto),
    ToggleHostConnection(bool),
    Command(Value),
    ScreenUpdate(Value),
    Log(Value),
    TimerUpdated(Value),
}

/// Events the relay sends to peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    AuthResult(AuthResultDto),
    StateSync(SharedStateDto),
    TextUpdated {
        text: String,
    },
    EnabledUpdated {
        enabled: bool,
    },
    DialogCoordsUpdated {
        #[serde(rename = "dialogCoords")]
        dialog_coords: Option<DialogCoordsDto>,
    },
    TimerUpdated(TimerStateDto),
    HostStatus {
        connected: bool,
    },
    HostAllowedStatus {
        allowed: bool,
    },
    Command(Value),
    Log {
        message: String,
    },
    Error {
        message: String,
    },
    ScreenUpdate(Value),
}

impl ServerEvent {
    pub fn auth_success() -> Self {
        ServerEvent::AuthResult(AuthResultDto {
            success: true,
            message: None,
        })
    }

    pub fn auth_failure(message: impl Into<String>) -> Self {
        ServerEvent::AuthResult(AuthResultDto {
            success: false,
            message: Some(message.into()),
        })
    }

    pub fn log(message: impl Into<String>) -> Self {
        ServerEvent::Log {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A host event forwarded to viewers without interpretation
#[derive(Debug, Serialize)]
pub struct RelayedEvent<'a> {
    pub event: &'a str,
    pub data: &'a Value,
}

impl RelayedEvent<'_> {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_parses_envelope() {
        // テスト項目: イベント名と data から ClientEvent が復元される
        // given (前提条件):
        let text = r#"{"event":"timer_action","data":{"action":"start","duration":300}}"#;

        // when (操作):
        let event: ClientEvent = serde_json::from_str(text).unwrap();

        // then (期待する結果):
        assert_eq!(
            event,
            ClientEvent::TimerAction(TimerActionDto {
                action: TimerAction::Start,
                duration: Some(300),
            })
        );
    }

    #[test]
    fn test_client_event_keeps_command_payload_opaque() {
        // テスト項目: command イベントのペイロードは解釈されずに保持される
        // given (前提条件):
        let text = r#"{"event":"command","data":{"type":"MOUSE_CLICK","x":10,"y":20}}"#;

        // when (操作):
        let event: ClientEvent = serde_json::from_str(text).unwrap();

        // then (期待する結果):
        assert_eq!(
            event,
            ClientEvent::Command(json!({"type": "MOUSE_CLICK", "x": 10, "y": 20}))
        );
    }

    #[test]
    fn test_client_event_rejects_unknown_event() {
        // テスト項目: 未知のイベント名はパースエラーになる
        // given (前提条件):
        let text = r#"{"event":"drop_tables","data":true}"#;

        // when (操作):
        let result = serde_json::from_str::<ClientEvent>(text);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_state_sync_uses_camel_case_keys() {
        // テスト項目: state_sync はダッシュボードが期待する camelCase のキーで送られる
        // given (前提条件):
        let event = ServerEvent::StateSync(SharedStateDto {
            text: "abc".to_string(),
            enabled: true,
            dialog_coords: Some(DialogCoordsDto { x: 1.0, y: 2.0 }),
            host_allowed: false,
            host_connected: false,
            timer: TimerStateDto {
                running: true,
                end_time: 1_000,
                original_duration_seconds: 10,
            },
        });

        // when (操作):
        let value: Value = serde_json::from_str(&event.encode().unwrap()).unwrap();

        // then (期待する結果):
        assert_eq!(value["event"], "state_sync");
        assert_eq!(value["data"]["hostAllowed"], false);
        assert_eq!(value["data"]["dialogCoords"]["x"], 1.0);
        assert_eq!(value["data"]["timer"]["endTime"], 1_000);
        assert_eq!(value["data"]["timer"]["originalDurationSeconds"], 10);
    }

    #[test]
    fn test_auth_failure_carries_message() {
        // テスト項目: 認証失敗イベントは success=false と理由を含む
        // given (前提条件):
        let event = ServerEvent::auth_failure("Invalid access token");

        // when (操作):
        let value: Value = serde_json::from_str(&event.encode().unwrap()).unwrap();

        // then (期待する結果):
        assert_eq!(
            value,
            json!({
                "event": "auth_result",
                "data": {"success": false, "message": "Invalid access token"}
            })
        );
    }

    #[test]
    fn test_relayed_event_wraps_payload_verbatim() {
        // テスト項目: host のイベントはそのまま envelope に包まれる
        // given (前提条件):
        let payload = json!({"image": "aGVsbG8="});

        // when (操作):
        let encoded = RelayedEvent {
            event: "screen_update",
            data: &payload,
        }
        .encode()
        .unwrap();

        // then (期待する結果):
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, json!({"event": "screen_update", "data": payload}));
    }
}
