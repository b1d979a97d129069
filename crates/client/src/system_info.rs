//! Node system info derived from `info` telemetry frames.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest gap between two samples (in seconds of node uptime) that still
/// yields a speed. Older samples are too coarse to be useful.
const MAX_SAMPLE_GAP_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeSystemInfo {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    /// Bytes sent since boot
    pub upload_traffic: u64,
    /// Bytes received since boot
    pub download_traffic: u64,
    /// Bytes per second
    pub upload_speed: f64,
    pub download_speed: f64,
    /// Seconds since boot
    pub uptime: u64,
}

fn parse_raw(data: &Value) -> Option<Map<String, Value>> {
    match data {
        Value::Object(map) => Some(map.clone()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

/// Leading numeric prefix of a string, `"12.5%"` reads as `12.5`.
fn numeric_prefix(text: &str) -> &str {
    let text = text.trim_start();
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in text.char_indices() {
        let ok = c.is_ascii_digit()
            || (i == 0 && (c == '-' || c == '+'))
            || (c == '.' && !seen_dot);
        if !ok {
            break;
        }
        seen_dot |= c == '.';
        end = i + c.len_utf8();
    }
    &text[..end]
}

fn to_float(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => numeric_prefix(s).parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}

/// Counters are whole and non-negative; anything else reads as 0.
fn to_counter(value: Option<&Value>) -> u64 {
    let float = to_float(value);
    if float > 0.0 {
        float.trunc() as u64
    } else {
        0
    }
}

/// Build the system info for one `info` frame.
///
/// `previous` is the last sample of the same node and is only used to derive
/// speeds. Returns `None` when `data` is not an object (or a JSON string
/// holding one).
pub fn build_node_system_info(
    data: &Value,
    previous: Option<&NodeSystemInfo>,
) -> Option<NodeSystemInfo> {
    let raw = parse_raw(data)?;

    let upload_traffic = to_counter(raw.get("bytes_transmitted"));
    let download_traffic = to_counter(raw.get("bytes_received"));
    let uptime = to_counter(raw.get("uptime"));

    let mut upload_speed = 0.0;
    let mut download_speed = 0.0;

    if let Some(previous) = previous.filter(|p| p.uptime != 0) {
        if uptime > previous.uptime && uptime - previous.uptime <= MAX_SAMPLE_GAP_SECS {
            let elapsed = (uptime - previous.uptime) as f64;
            // Counters reset on node restart
            if upload_traffic >= previous.upload_traffic {
                upload_speed = (upload_traffic - previous.upload_traffic) as f64 / elapsed;
            }
            if download_traffic >= previous.download_traffic {
                download_speed = (download_traffic - previous.download_traffic) as f64 / elapsed;
            }
        }
    }

    Some(NodeSystemInfo {
        cpu_usage: to_float(raw.get("cpu_usage")),
        memory_usage: to_float(raw.get("memory_usage")),
        upload_traffic,
        download_traffic,
        upload_speed,
        download_speed,
        uptime,
    })
}
