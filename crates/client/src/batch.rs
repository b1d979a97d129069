//! Forward list batch actions and the toast each one produces.

use flvx_shared::{extract_error_message, ApiError, ApiResponse, BatchOperationResult};
use serde_json::Value;

use crate::api_client::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastTone {
    Success,
    Error,
}

/// What the forward page should do after a batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub tone: ToastTone,
    pub message: String,
    pub should_refresh: bool,
    pub close_delete_modal: bool,
    pub close_change_tunnel_modal: bool,
    pub reset_target_tunnel: bool,
}

impl BatchOutcome {
    fn error(message: String) -> Self {
        Self {
            tone: ToastTone::Error,
            message,
            should_refresh: false,
            close_delete_modal: false,
            close_change_tunnel_modal: false,
            reset_target_tunnel: false,
        }
    }

    /// Toast for a completed batch: success only when nothing failed.
    fn summary(result: BatchOperationResult, success_text: String) -> Self {
        let (tone, message) = if result.fail_count == 0 {
            (ToastTone::Success, success_text)
        } else {
            (
                ToastTone::Error,
                format!(
                    "成功 {} 项，失败 {} 项",
                    result.success_count, result.fail_count
                ),
            )
        };
        Self {
            tone,
            message,
            should_refresh: true,
            close_delete_modal: false,
            close_change_tunnel_modal: false,
            reset_target_tunnel: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.tone == ToastTone::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAction {
    Delete,
    Pause,
    Resume,
    Redeploy,
    ChangeTunnel,
}

impl BatchAction {
    pub fn fallback_message(self) -> &'static str {
        match self {
            BatchAction::Delete => "删除失败",
            BatchAction::Pause => "停用失败",
            BatchAction::Resume => "启用失败",
            BatchAction::Redeploy => "下发失败",
            BatchAction::ChangeTunnel => "隧道失败",
        }
    }

    fn success_message(self, count: i64) -> String {
        match self {
            BatchAction::Delete => format!("成功删除 {count} 项"),
            BatchAction::Pause => format!("成功停用 {count} 项"),
            BatchAction::Resume => format!("成功启用 {count} 项"),
            BatchAction::Redeploy => format!("成功重新下发 {count} 项"),
            BatchAction::ChangeTunnel => format!("成功换隧道 {count} 项"),
        }
    }
}

/// Turn a batch response (or the error that replaced it) into an outcome.
pub fn batch_outcome(
    action: BatchAction,
    response: Result<ApiResponse<Value>, ApiError>,
) -> BatchOutcome {
    let response = match response {
        Ok(response) => response,
        Err(e) => {
            crate::log_error!("batch {:?} failed: {}", action, e);
            return BatchOutcome::error(extract_error_message(&e, action.fallback_message()));
        }
    };

    if !response.is_ok() {
        return BatchOutcome::error(response.message_or(action.fallback_message()));
    }

    let summary = BatchOperationResult::from_value(response.data.as_ref());
    let mut outcome = BatchOutcome::summary(summary, action.success_message(summary.success_count));
    match action {
        BatchAction::Delete => outcome.close_delete_modal = true,
        BatchAction::ChangeTunnel => {
            outcome.close_change_tunnel_modal = true;
            outcome.reset_target_tunnel = true;
        }
        _ => {}
    }
    outcome
}

pub async fn execute_batch_delete(api: &ApiClient, ids: &[i64]) -> BatchOutcome {
    batch_outcome(BatchAction::Delete, api.batch_delete_forwards(ids).await)
}

/// Resume (`enable`) or pause the selected forwards.
pub async fn execute_batch_toggle_service(
    api: &ApiClient,
    ids: &[i64],
    enable: bool,
) -> BatchOutcome {
    if enable {
        batch_outcome(BatchAction::Resume, api.batch_resume_forwards(ids).await)
    } else {
        batch_outcome(BatchAction::Pause, api.batch_pause_forwards(ids).await)
    }
}

pub async fn execute_batch_redeploy(api: &ApiClient, ids: &[i64]) -> BatchOutcome {
    batch_outcome(BatchAction::Redeploy, api.batch_redeploy_forwards(ids).await)
}

pub async fn execute_batch_change_tunnel(
    api: &ApiClient,
    ids: &[i64],
    target_tunnel_id: i64,
) -> BatchOutcome {
    batch_outcome(
        BatchAction::ChangeTunnel,
        api.batch_change_tunnel(ids, target_tunnel_id).await,
    )
}
