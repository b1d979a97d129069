//! Node list status chips.

use super::{Badge, Tone};

/// Live connection state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Online,
    #[default]
    Offline,
}

impl ConnectionStatus {
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectionStatus::Online
        } else {
            ConnectionStatus::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == ConnectionStatus::Online
    }
}

pub fn connection_status_meta(status: ConnectionStatus) -> Badge {
    match status {
        ConnectionStatus::Online => Badge::new("在线", Tone::Success),
        ConnectionStatus::Offline => Badge::new("离线", Tone::Danger),
    }
}

/// Human readable reason a federated node stopped syncing.
pub fn remote_sync_error_message(sync_error: &str) -> String {
    match sync_error {
        "provider_share_deleted" => "提供方已删除该分享".to_string(),
        "provider_share_disabled" => "提供方已禁用该分享".to_string(),
        "provider_share_expired" => "提供方分享已过期".to_string(),
        other => format!("远程同步失败: {other}"),
    }
}
