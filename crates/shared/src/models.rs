//! Shared data models for the flvx panel API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Envelope ---

/// Response envelope used by every `/api/v1` endpoint.
///
/// `code == 0` means success; anything else carries a message in `msg`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub code: i64,
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Server message, or `fallback` when it is missing or blank.
    pub fn message_or(&self, fallback: &str) -> String {
        match self.msg.as_deref().map(str::trim) {
            Some(msg) if !msg.is_empty() => msg.to_string(),
            _ => fallback.to_string(),
        }
    }
}

// --- Auth ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "role_id")]
    pub role_id: i64,
    pub name: String,
    #[serde(default)]
    pub require_password_change: Option<bool>,
}

// --- Resources ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeApiItem {
    pub id: i64,
    pub name: String,
    pub status: i64,
    #[serde(default)]
    pub inx: Option<i64>,
    #[serde(default)]
    pub sync_error: Option<String>,
    #[serde(default)]
    pub is_remote: Option<i64>,
    #[serde(default)]
    pub version: Option<String>,
}

impl NodeApiItem {
    pub fn is_remote_node(&self) -> bool {
        self.is_remote == Some(1)
    }

    /// Sync error reported for a federated node, if any non-blank one exists.
    pub fn sync_error_text(&self) -> Option<&str> {
        self.sync_error.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TunnelApiItem {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: i64,
    pub status: i64,
    #[serde(default)]
    pub inx: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForwardApiItem {
    pub id: i64,
    pub name: String,
    pub status: i64,
    #[serde(default)]
    pub tunnel_name: Option<String>,
    #[serde(default)]
    pub in_ip: Option<String>,
    #[serde(default)]
    pub in_port: Option<u16>,
    #[serde(default)]
    pub remote_addr: Option<String>,
    #[serde(default)]
    pub in_flow: Option<u64>,
    #[serde(default)]
    pub out_flow: Option<u64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub tunnel_id: Option<i64>,
    #[serde(default)]
    pub inx: Option<i64>,
}

// --- Ordering ---

/// One row of an `*/update-order` request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderEntry {
    pub id: i64,
    pub inx: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardOrderRequest {
    pub forwards: Vec<OrderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeOrderRequest {
    pub nodes: Vec<OrderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TunnelOrderRequest {
    pub tunnels: Vec<OrderEntry>,
}

// --- Batch operations ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdsRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchChangeTunnelRequest {
    pub forward_ids: Vec<i64>,
    pub target_tunnel_id: i64,
}

/// Summary returned by every batch endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchOperationResult {
    pub success_count: i64,
    pub fail_count: i64,
}

impl BatchOperationResult {
    /// Read a batch summary leniently: a missing body, missing fields or
    /// non-numeric values count as zero.
    pub fn from_value(value: Option<&Value>) -> Self {
        let field = |name: &str| {
            value
                .and_then(|v| v.get(name))
                .map(lenient_number)
                .unwrap_or(0)
        };
        Self {
            success_count: field("successCount"),
            fail_count: field("failCount"),
        }
    }
}

fn lenient_number(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}
