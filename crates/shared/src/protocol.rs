//! Realtime telemetry protocol spoken on the panel's `/system-info` socket.
//!
//! The server owns the frame shape; the client only requires each text frame
//! to be a JSON object and reads the handful of fields it understands.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Path of the realtime endpoint, relative to the panel origin.
pub const REALTIME_PATH: &str = "/system-info";

/// `type` value of node online/offline notifications.
pub const EVENT_STATUS: &str = "status";
/// `type` value of periodic system-info samples.
pub const EVENT_INFO: &str = "info";
/// `type` value of agent upgrade progress reports.
pub const EVENT_UPGRADE_PROGRESS: &str = "upgrade_progress";

/// A single realtime frame.
///
/// Every field is optional and kept as raw JSON: a frame with unexpected
/// field types is still delivered to the handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RealtimeMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
}

impl RealtimeMessage {
    /// Parse a text frame. Anything that is not a JSON object yields `None`.
    pub fn from_text(text: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(text).ok()? {
            Value::Object(map) => Some(Self::from_object(map)),
            _ => None,
        }
    }

    fn from_object(mut map: Map<String, Value>) -> Self {
        let mut take = |key: &str| map.remove(key).filter(|v| !v.is_null());
        Self {
            id: take("id"),
            kind: take("type"),
            data: take("data"),
            message: take("message"),
        }
    }

    /// The `type` field when it is a string.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_ref().and_then(Value::as_str)
    }

    /// The `message` field when it is a string.
    pub fn message_text(&self) -> Option<&str> {
        self.message.as_ref().and_then(Value::as_str)
    }

    /// Node id carried in `id`, which the server sends as a number or as a
    /// numeric string.
    pub fn node_id(&self) -> Option<i64> {
        match self.id.as_ref()? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Decode the node-level event this frame describes, if any.
    pub fn node_event(&self) -> Option<NodeEvent> {
        let node_id = self.node_id()?;
        match self.kind()? {
            EVENT_STATUS => Some(NodeEvent::Status {
                node_id,
                online: self.data.as_ref().is_some_and(is_one),
            }),
            EVENT_INFO => Some(NodeEvent::Info {
                node_id,
                data: self.data.clone().unwrap_or(Value::Null),
            }),
            EVENT_UPGRADE_PROGRESS => {
                UpgradeProgress::from_data(self.data.as_ref()?).map(|progress| {
                    NodeEvent::UpgradeProgress { node_id, progress }
                })
            }
            _ => None,
        }
    }
}

fn is_one(value: &Value) -> bool {
    value.as_f64() == Some(1.0)
}

/// Node-level events carried by realtime frames.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// Agent connectivity changed. Only `data == 1` means online.
    Status { node_id: i64, online: bool },
    /// A system-info sample; `data` is an object or a JSON-encoded string.
    Info { node_id: i64, data: Value },
    /// Progress of an agent upgrade.
    UpgradeProgress {
        node_id: i64,
        progress: UpgradeProgress,
    },
}

impl NodeEvent {
    pub fn node_id(&self) -> i64 {
        match self {
            NodeEvent::Status { node_id, .. }
            | NodeEvent::Info { node_id, .. }
            | NodeEvent::UpgradeProgress { node_id, .. } => *node_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpgradeProgress {
    pub stage: String,
    pub percent: f64,
    pub message: String,
}

impl UpgradeProgress {
    /// Read `{ "data": { "stage", "percent" }, "message" }`, given either as an
    /// object or as a JSON string. Frames without an inner `data` object are
    /// not progress reports.
    pub fn from_data(data: &Value) -> Option<Self> {
        let parsed;
        let body = match data {
            Value::String(s) => {
                parsed = serde_json::from_str::<Value>(s).ok()?;
                &parsed
            }
            other => other,
        };
        let inner = body.get("data").filter(|v| v.is_object())?;
        Some(Self {
            stage: inner
                .get("stage")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            percent: inner.get("percent").and_then(Value::as_f64).unwrap_or(0.0),
            message: body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_object_frames_are_rejected() {
        assert!(RealtimeMessage::from_text("[1,2]").is_none());
        assert!(RealtimeMessage::from_text("\"hello\"").is_none());
        assert!(RealtimeMessage::from_text("null").is_none());
        assert!(RealtimeMessage::from_text("{not json").is_none());
    }

    #[test]
    fn object_frames_keep_unexpected_types() {
        let msg = RealtimeMessage::from_text(r#"{"id":"12","type":5,"extra":true}"#).unwrap();
        assert_eq!(msg.node_id(), Some(12));
        assert_eq!(msg.kind(), None);
        assert_eq!(msg.kind, Some(json!(5)));
    }

    #[test]
    fn status_event_only_online_for_one() {
        let online = RealtimeMessage::from_text(r#"{"id":3,"type":"status","data":1}"#).unwrap();
        assert_eq!(
            online.node_event(),
            Some(NodeEvent::Status {
                node_id: 3,
                online: true
            })
        );

        let offline =
            RealtimeMessage::from_text(r#"{"id":3,"type":"status","data":"1"}"#).unwrap();
        assert_eq!(
            offline.node_event(),
            Some(NodeEvent::Status {
                node_id: 3,
                online: false
            })
        );
    }

    #[test]
    fn frames_without_numeric_id_have_no_event() {
        let msg = RealtimeMessage::from_text(r#"{"id":"abc","type":"status","data":1}"#).unwrap();
        assert_eq!(msg.node_event(), None);
    }

    #[test]
    fn upgrade_progress_from_string_payload() {
        let payload = json!({"data": {"stage": "download", "percent": 42}, "message": "fetching"});
        let frame = json!({"id": 9, "type": "upgrade_progress", "data": payload.to_string()});
        let msg = RealtimeMessage::from_text(&frame.to_string()).unwrap();
        assert_eq!(
            msg.node_event(),
            Some(NodeEvent::UpgradeProgress {
                node_id: 9,
                progress: UpgradeProgress {
                    stage: "download".into(),
                    percent: 42.0,
                    message: "fetching".into(),
                }
            })
        );
    }

    #[test]
    fn upgrade_progress_requires_inner_data() {
        assert!(UpgradeProgress::from_data(&json!({"message": "x"})).is_none());
        assert!(UpgradeProgress::from_data(&json!("not json")).is_none());
    }
}
