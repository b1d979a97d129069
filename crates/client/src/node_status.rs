//! Live per-node state for the node page.
//!
//! The board is fed by the node list and then by realtime [`NodeEvent`]s.
//! Offline reports are debounced by the caller: [`NodeStatusBoard::apply`]
//! returns the timer action to take, and the offline timer later calls
//! [`NodeStatusBoard::mark_offline`].

use std::collections::HashMap;

use flvx_shared::{NodeApiItem, NodeEvent, UpgradeProgress};

use crate::display::ConnectionStatus;
use crate::system_info::{build_node_system_info, NodeSystemInfo};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeLiveState {
    pub status: ConnectionStatus,
    pub system_info: Option<NodeSystemInfo>,
    pub upgrade: Option<UpgradeProgress>,
}

/// What to do with the node's offline timer after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineAction {
    None,
    Cancel(i64),
    Schedule(i64),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeStatusBoard {
    nodes: HashMap<i64, NodeLiveState>,
}

/// Initial status from the list endpoint. A federated node with a sync error
/// is offline whatever its own status says.
pub fn initial_status(node: &NodeApiItem) -> ConnectionStatus {
    if node.sync_error_text().is_some() {
        ConnectionStatus::Offline
    } else {
        ConnectionStatus::from_online(node.status == 1)
    }
}

impl NodeStatusBoard {
    pub fn from_nodes(nodes: &[NodeApiItem]) -> Self {
        let nodes = nodes
            .iter()
            .map(|node| {
                (
                    node.id,
                    NodeLiveState {
                        status: initial_status(node),
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self { nodes }
    }

    pub fn get(&self, node_id: i64) -> Option<&NodeLiveState> {
        self.nodes.get(&node_id)
    }

    pub fn status(&self, node_id: i64) -> ConnectionStatus {
        self.get(node_id).map(|s| s.status).unwrap_or_default()
    }

    pub fn online_count(&self) -> usize {
        self.nodes.values().filter(|s| s.status.is_online()).count()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Apply a realtime event.
    ///
    /// Status and info events for nodes missing from the board are ignored
    /// apart from the timer action, so a late event for a deleted node cannot
    /// resurrect it.
    pub fn apply(&mut self, event: &NodeEvent) -> OfflineAction {
        match event {
            NodeEvent::Status {
                node_id,
                online: true,
            } => {
                if let Some(state) = self.nodes.get_mut(node_id) {
                    state.status = ConnectionStatus::Online;
                }
                OfflineAction::Cancel(*node_id)
            }
            // Debounced: only the timer may flip the node offline.
            NodeEvent::Status {
                node_id,
                online: false,
            } => OfflineAction::Schedule(*node_id),
            NodeEvent::Info { node_id, data } => {
                if let Some(state) = self.nodes.get_mut(node_id) {
                    if let Some(info) = build_node_system_info(data, state.system_info.as_ref()) {
                        state.system_info = Some(info);
                        state.status = ConnectionStatus::Online;
                    }
                }
                OfflineAction::Cancel(*node_id)
            }
            NodeEvent::UpgradeProgress { node_id, progress } => {
                if let Some(state) = self.nodes.get_mut(node_id) {
                    state.upgrade = Some(progress.clone());
                }
                OfflineAction::None
            }
        }
    }

    /// The offline timer fired: drop the stale sample and show the node offline.
    pub fn mark_offline(&mut self, node_id: i64) {
        if let Some(state) = self.nodes.get_mut(&node_id) {
            state.status = ConnectionStatus::Offline;
            state.system_info = None;
        }
    }

    pub fn clear_upgrade(&mut self, node_id: i64) {
        if let Some(state) = self.nodes.get_mut(&node_id) {
            state.upgrade = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: i64, status: i64, sync_error: Option<&str>) -> NodeApiItem {
        NodeApiItem {
            id,
            status,
            sync_error: sync_error.map(str::to_string),
            ..Default::default()
        }
    }

    fn board() -> NodeStatusBoard {
        NodeStatusBoard::from_nodes(&[
            node(1, 1, None),
            node(2, 0, None),
            node(3, 1, Some("provider_share_deleted")),
            node(4, 1, Some("")),
        ])
    }

    #[test]
    fn initial_status_respects_sync_errors() {
        let board = board();
        assert_eq!(board.status(1), ConnectionStatus::Online);
        assert_eq!(board.status(2), ConnectionStatus::Offline);
        assert_eq!(board.status(3), ConnectionStatus::Offline);
        assert_eq!(board.status(4), ConnectionStatus::Online);
        assert_eq!(board.online_count(), 2);
    }

    #[test]
    fn online_status_cancels_timer() {
        let mut board = board();
        let action = board.apply(&NodeEvent::Status {
            node_id: 2,
            online: true,
        });
        assert_eq!(action, OfflineAction::Cancel(2));
        assert_eq!(board.status(2), ConnectionStatus::Online);
    }

    #[test]
    fn offline_status_is_deferred() {
        let mut board = board();
        let action = board.apply(&NodeEvent::Status {
            node_id: 1,
            online: false,
        });
        assert_eq!(action, OfflineAction::Schedule(1));
        assert_eq!(board.status(1), ConnectionStatus::Online);

        board.mark_offline(1);
        assert_eq!(board.status(1), ConnectionStatus::Offline);
    }

    #[test]
    fn info_brings_node_online_with_sample() {
        let mut board = board();
        let action = board.apply(&NodeEvent::Info {
            node_id: 2,
            data: json!({"cpu_usage": 5, "uptime": 10}),
        });
        assert_eq!(action, OfflineAction::Cancel(2));
        let state = board.get(2).unwrap();
        assert!(state.status.is_online());
        assert_eq!(state.system_info.unwrap().uptime, 10);

        board.mark_offline(2);
        assert!(board.get(2).unwrap().system_info.is_none());
    }

    #[test]
    fn unreadable_info_changes_nothing() {
        let mut board = board();
        board.apply(&NodeEvent::Info {
            node_id: 2,
            data: json!("garbage"),
        });
        assert_eq!(board.status(2), ConnectionStatus::Offline);
    }

    #[test]
    fn upgrade_progress_is_recorded() {
        let mut board = board();
        let progress = UpgradeProgress {
            stage: "download".into(),
            percent: 40.0,
            message: String::new(),
        };
        let action = board.apply(&NodeEvent::UpgradeProgress {
            node_id: 1,
            progress: progress.clone(),
        });
        assert_eq!(action, OfflineAction::None);
        assert_eq!(board.get(1).unwrap().upgrade.as_ref(), Some(&progress));
        board.clear_upgrade(1);
        assert!(board.get(1).unwrap().upgrade.is_none());
    }

    #[test]
    fn unknown_nodes_are_ignored() {
        let mut board = board();
        board.apply(&NodeEvent::Status {
            node_id: 99,
            online: true,
        });
        assert!(board.get(99).is_none());
    }
}
