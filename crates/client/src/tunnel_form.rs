//! Tunnel create/edit form: defaults and client-side validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Forward on the entry node's port.
pub const TUNNEL_TYPE_PORT_FORWARD: i64 = 1;
/// Relay from entry nodes through exit nodes.
pub const TUNNEL_TYPE_RELAY: i64 = 2;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainNode {
    pub node_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TunnelForm {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: i64,
    pub in_node_id: Vec<ChainNode>,
    pub out_node_id: Vec<ChainNode>,
    pub chain_nodes: Vec<ChainNode>,
    pub flow: i64,
    pub traffic_ratio: f64,
    pub in_ip: String,
    pub ip_preference: String,
    pub status: i64,
}

impl Default for TunnelForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: TUNNEL_TYPE_PORT_FORWARD,
            in_node_id: Vec::new(),
            out_node_id: Vec::new(),
            chain_nodes: Vec::new(),
            flow: 1,
            traffic_ratio: 1.0,
            in_ip: String::new(),
            ip_preference: String::new(),
            status: 1,
        }
    }
}

/// The slice of a node the validator needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAvailability {
    pub id: i64,
    pub status: i64,
}

/// Field name to error message. Empty means valid.
pub type FormErrors = BTreeMap<&'static str, &'static str>;

/// Whether any selected node is known and not online. Unknown ids pass.
fn any_offline(selected: &[ChainNode], nodes: &[NodeAvailability]) -> bool {
    selected.iter().any(|item| {
        nodes
            .iter()
            .find(|n| n.id == item.node_id)
            .is_some_and(|n| n.status != 1)
    })
}

pub fn validate_tunnel_form(form: &TunnelForm, nodes: &[NodeAvailability]) -> FormErrors {
    let mut errors = FormErrors::new();

    let name_len = form.name.chars().count();
    if form.name.trim().is_empty() {
        errors.insert("name", "请输入隧道名称");
    } else if !(2..=50).contains(&name_len) {
        errors.insert("name", "隧道名称长度应在2-50个字符之间");
    }

    if form.in_node_id.is_empty() {
        errors.insert("inNodeId", "请至少选择一个入口节点");
    } else if any_offline(&form.in_node_id, nodes) {
        errors.insert("inNodeId", "所有入口节点必须在线");
    }

    if form.traffic_ratio <= 0.0 || form.traffic_ratio > 100.0 {
        errors.insert("trafficRatio", "流量倍率须大于0，支持小数（如 0.5）");
    }

    if form.kind == TUNNEL_TYPE_RELAY {
        if form.out_node_id.is_empty() {
            errors.insert("outNodeId", "请至少选择一个出口节点");
        } else {
            if any_offline(&form.out_node_id, nodes) {
                errors.insert("outNodeId", "所有出口节点必须在线");
            }
            let overlaps = form
                .in_node_id
                .iter()
                .any(|entry| form.out_node_id.contains(entry));
            if overlaps {
                errors.insert("outNodeId", "隧道转发模式下，入口和出口不能有相同节点");
            }
        }
    }

    errors
}
