//! Diagnosis result presentation for forwards and tunnels.

use serde::{Deserialize, Serialize};

use super::{Badge, Tone};

/// One hop of a diagnosis run, as returned by `*/diagnose`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisEntry {
    pub success: bool,
    pub description: String,
    pub node_name: String,
    pub node_id: String,
    pub target_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_chain_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_inx: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_chain_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_inx: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForwardDiagnosisResult {
    pub forward_name: String,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    pub results: Vec<DiagnosisEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TunnelDiagnosisResult {
    pub tunnel_name: String,
    pub tunnel_type: String,
    pub timestamp: i64,
    pub results: Vec<DiagnosisEntry>,
}

fn failed_entry(description: &str, target_ip: String, message: &str) -> DiagnosisEntry {
    DiagnosisEntry {
        success: false,
        description: description.to_string(),
        node_name: "-".into(),
        node_id: "-".into(),
        target_ip,
        message: Some(message.to_string()),
        ..Default::default()
    }
}

/// Result shown when the diagnose request itself failed.
///
/// The first target address stands in for the real hop list.
pub fn forward_diagnosis_fallback(
    forward_name: &str,
    remote_addr: &str,
    description: &str,
    message: &str,
) -> ForwardDiagnosisResult {
    let target = remote_addr.split(',').next().unwrap_or_default();
    let target = if target.is_empty() { "-" } else { target };
    ForwardDiagnosisResult {
        forward_name: forward_name.to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        results: vec![failed_entry(description, target.to_string(), message)],
    }
}

pub fn tunnel_diagnosis_fallback(
    tunnel_name: &str,
    tunnel_type: i64,
    description: &str,
    message: &str,
) -> TunnelDiagnosisResult {
    let mut entry = failed_entry(description, "-".into(), message);
    entry.target_port = Some(443);
    TunnelDiagnosisResult {
        tunnel_name: tunnel_name.to_string(),
        tunnel_type: if tunnel_type == 1 { "端口转发" } else { "隧道转发" }.to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        results: vec![entry],
    }
}

/// Link quality from latency (ms) and packet loss (%).
///
/// `None` when either measurement is missing.
pub fn quality_display(average_time: Option<f64>, packet_loss: Option<f64>) -> Option<Badge> {
    let (avg, loss) = (average_time?, packet_loss?);

    let badge = if avg < 30.0 && loss == 0.0 {
        Badge::new("🚀 优秀", Tone::Success)
    } else if avg < 50.0 && loss == 0.0 {
        Badge::new("✨ 很好", Tone::Success)
    } else if avg < 100.0 && loss < 1.0 {
        Badge::new("👍 良好", Tone::Primary)
    } else if avg < 150.0 && loss < 2.0 {
        Badge::new("😐 一般", Tone::Warning)
    } else if avg < 200.0 && loss < 5.0 {
        Badge::new("😟 较差", Tone::Warning)
    } else {
        Badge::new("😵 很差", Tone::Danger)
    };
    Some(badge)
}

impl DiagnosisEntry {
    pub fn quality(&self) -> Option<Badge> {
        quality_display(self.average_time, self.packet_loss)
    }
}
