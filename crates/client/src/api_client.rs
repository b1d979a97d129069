//! HTTP client for the flvx panel API.
//!
//! Every endpoint is a `POST` with a JSON body and answers with an
//! [`ApiResponse`] envelope. Transport failures and non-2xx statuses become an
//! [`ApiError`]; application failures arrive as a non-zero `code`.

use flvx_shared::{
    ApiError, ApiResponse, BatchChangeTunnelRequest, ForwardApiItem, ForwardOrderRequest,
    IdsRequest, NodeApiItem, NodeOrderRequest, OrderEntry, TunnelApiItem, TunnelOrderRequest,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Client for the panel's `/api/v1` endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
            token: None,
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Session token, sent verbatim in the `Authorization` header.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let path = path.trim_start_matches('/');
        if self.base_url.is_empty() {
            format!("/{path}")
        } else {
            format!("{}/{path}", self.base_url.trim_end_matches('/'))
        }
    }

    /// POST `body` to `path` and decode the envelope.
    pub async fn post_json<TReq: Serialize + ?Sized, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<ApiResponse<TRes>, ApiError> {
        let url = self.url(path);
        let body_bytes = serde_json::to_vec(body).map_err(|e| ApiError::Serialize(e.to_string()))?;

        let mut rb = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body_bytes);
        if let Some(token) = &self.token {
            rb = rb.header("Authorization", token.as_str());
        }

        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            crate::log_warn!("POST {} failed with status {}", path, status);
            return Err(ApiError::Http { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    /// POST without a body.
    pub async fn post_empty<TRes: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<ApiResponse<TRes>, ApiError> {
        self.post_json(path, &serde_json::Map::new()).await
    }

    // --- Lists ---

    pub async fn node_list(&self) -> Result<ApiResponse<Vec<NodeApiItem>>, ApiError> {
        self.post_empty("/node/list").await
    }

    pub async fn tunnel_list(&self) -> Result<ApiResponse<Vec<TunnelApiItem>>, ApiError> {
        self.post_empty("/tunnel/list").await
    }

    pub async fn forward_list(&self) -> Result<ApiResponse<Vec<ForwardApiItem>>, ApiError> {
        self.post_empty("/forward/list").await
    }

    // --- Ordering ---

    pub async fn update_forward_order(
        &self,
        forwards: Vec<OrderEntry>,
    ) -> Result<ApiResponse<Value>, ApiError> {
        self.post_json("/forward/update-order", &ForwardOrderRequest { forwards })
            .await
    }

    pub async fn update_node_order(
        &self,
        nodes: Vec<OrderEntry>,
    ) -> Result<ApiResponse<Value>, ApiError> {
        self.post_json("/node/update-order", &NodeOrderRequest { nodes })
            .await
    }

    pub async fn update_tunnel_order(
        &self,
        tunnels: Vec<OrderEntry>,
    ) -> Result<ApiResponse<Value>, ApiError> {
        self.post_json("/tunnel/update-order", &TunnelOrderRequest { tunnels })
            .await
    }

    // --- Forward batch operations ---

    async fn post_ids(&self, path: &str, ids: &[i64]) -> Result<ApiResponse<Value>, ApiError> {
        self.post_json(path, &IdsRequest { ids: ids.to_vec() }).await
    }

    pub async fn batch_delete_forwards(&self, ids: &[i64]) -> Result<ApiResponse<Value>, ApiError> {
        self.post_ids("/forward/batch-delete", ids).await
    }

    pub async fn batch_pause_forwards(&self, ids: &[i64]) -> Result<ApiResponse<Value>, ApiError> {
        self.post_ids("/forward/batch-pause", ids).await
    }

    pub async fn batch_resume_forwards(&self, ids: &[i64]) -> Result<ApiResponse<Value>, ApiError> {
        self.post_ids("/forward/batch-resume", ids).await
    }

    pub async fn batch_redeploy_forwards(
        &self,
        ids: &[i64],
    ) -> Result<ApiResponse<Value>, ApiError> {
        self.post_ids("/forward/batch-redeploy", ids).await
    }

    pub async fn batch_change_tunnel(
        &self,
        forward_ids: &[i64],
        target_tunnel_id: i64,
    ) -> Result<ApiResponse<Value>, ApiError> {
        let request = BatchChangeTunnelRequest {
            forward_ids: forward_ids.to_vec(),
            target_tunnel_id,
        };
        self.post_json("/forward/batch-change-tunnel", &request).await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path() {
        let client = ApiClient::new().with_base_url("http://panel:6365/api/v1/");
        assert_eq!(client.url("/node/list"), "http://panel:6365/api/v1/node/list");
        assert_eq!(client.url("node/list"), "http://panel:6365/api/v1/node/list");
    }

    #[test]
    fn url_without_base_is_rooted() {
        let client = ApiClient::new();
        assert_eq!(client.url("node/list"), "/node/list");
        assert_eq!(client.url("https://x/y"), "https://x/y");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn unserializable_body_fails_before_sending() {
        use std::collections::HashMap;

        // JSON object keys must be strings
        let body: HashMap<(i32, i32), i32> = HashMap::from([((1, 2), 3)]);
        let client = ApiClient::new().with_base_url("http://127.0.0.1:9/api/v1/");
        let result = client.post_json::<_, Value>("/node/list", &body).await;
        assert!(matches!(result, Err(ApiError::Serialize(_))), "{result:?}");
    }

    #[test]
    fn blank_token_is_dropped() {
        let client = ApiClient::new().with_token(Some(String::new()));
        assert!(client.token.is_none());
    }
}
