//! Shared error types and the panel's error payload.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used when nothing better can be extracted from a failed request.
pub const DEFAULT_ERROR_MESSAGE: &str = "网络请求失败";

/// Error body the panel returns alongside non-2xx statuses.
///
/// The Go backend fills `msg`; some proxies and older endpoints use `message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorPayload {
    /// The first non-blank of `msg` and `message`.
    pub fn text(&self) -> Option<&str> {
        [self.msg.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// Attempt to parse an error body into a user-facing message.
/// Prefers `msg`, falls back to `message`.
pub fn try_error_payload(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorPayload>(body).ok()?;
    parsed.text().map(str::to_string)
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http { status: 401, .. })
    }
}

/// Turn a request error into the message shown in a toast.
///
/// Server payloads win over transport details; `fallback` is used only when
/// the error carries no text at all.
pub fn extract_error_message(error: &ApiError, fallback: &str) -> String {
    match error {
        ApiError::Http { body, .. } => {
            try_error_payload(body).unwrap_or_else(|| error.to_string())
        }
        ApiError::Network(msg) | ApiError::Serialize(msg) | ApiError::Deserialize(msg)
            if msg.trim().is_empty() =>
        {
            fallback.to_string()
        }
        other => other.to_string(),
    }
}
