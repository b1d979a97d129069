//! Client configuration from environment variables.
//!
//! Environment variables (all optional):
//! - `FLVX_API_BASE`: REST base URL (default: `/api/v1/`, resolved against the
//!   page origin in the browser)
//! - `FLVX_OFFLINE_DELAY_MS`: debounce before a node is shown offline (default: 3000)
//! - `FLVX_RECONNECT_STEP_MS`: realtime reconnect step; attempt `n` waits `n` steps (default: 3000)
//! - `FLVX_MAX_RECONNECT_ATTEMPTS`: realtime reconnect ceiling (default: 5)
//! - `FLVX_CONFIG_DIR`: native storage directory override

use std::time::Duration;

use thiserror::Error;

use crate::offline_timers::DEFAULT_OFFLINE_DELAY;
use crate::realtime::RealtimeConfig;

pub const ENV_API_BASE: &str = "FLVX_API_BASE";
pub const ENV_OFFLINE_DELAY_MS: &str = "FLVX_OFFLINE_DELAY_MS";
pub const ENV_RECONNECT_STEP_MS: &str = "FLVX_RECONNECT_STEP_MS";
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "FLVX_MAX_RECONNECT_ATTEMPTS";
pub const ENV_CONFIG_DIR: &str = "FLVX_CONFIG_DIR";

/// Same-origin API prefix served by the panel.
pub const DEFAULT_API_BASE: &str = "/api/v1/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("API base {0:?} is relative and there is no page origin to resolve it against")]
    RelativeBase(String),
    #[error("invalid API base {base:?}: {reason}")]
    InvalidUrl { base: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// REST base URL, absolute or origin-relative.
    pub api_base: String,
    pub realtime: RealtimeConfig,
    pub offline_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            realtime: RealtimeConfig::default(),
            offline_delay: DEFAULT_OFFLINE_DELAY,
        }
    }
}

impl ClientConfig {
    /// Read the configuration from the process environment.
    ///
    /// In the browser there is no environment; defaults are returned.
    pub fn from_env() -> Result<Self, ConfigError> {
        #[cfg(target_arch = "wasm32")]
        {
            Ok(Self::default())
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            Self::from_lookup(|var| std::env::var(var).ok())
        }
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(base) = lookup(ENV_API_BASE).filter(|b| !b.trim().is_empty()) {
            config.api_base = base.trim().to_string();
        }
        if let Some(ms) = read_u64(&lookup, ENV_OFFLINE_DELAY_MS)? {
            config.offline_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = read_u64(&lookup, ENV_RECONNECT_STEP_MS)? {
            config.realtime.reconnect_step = Duration::from_millis(ms);
        }
        if let Some(max) = read_u64(&lookup, ENV_MAX_RECONNECT_ATTEMPTS)? {
            config.realtime.max_reconnect_attempts =
                u32::try_from(max).map_err(|_| ConfigError::InvalidNumber {
                    var: ENV_MAX_RECONNECT_ATTEMPTS,
                    value: max.to_string(),
                })?;
        }

        Ok(config)
    }

    /// The API base as an absolute URL.
    ///
    /// Origin-relative bases are resolved against the current page in the
    /// browser; natively they are an error.
    pub fn absolute_api_base(&self) -> Result<String, ConfigError> {
        resolve_base(&self.api_base, page_origin().as_deref())
    }
}

fn read_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidNumber { var, value: raw })
}

/// Resolve `base` against `origin` when it is not already absolute.
pub fn resolve_base(base: &str, origin: Option<&str>) -> Result<String, ConfigError> {
    if base.starts_with("http://") || base.starts_with("https://") {
        return Ok(base.to_string());
    }
    let origin = origin.ok_or_else(|| ConfigError::RelativeBase(base.to_string()))?;
    let invalid = |e: url::ParseError| ConfigError::InvalidUrl {
        base: base.to_string(),
        reason: e.to_string(),
    };
    let joined = url::Url::parse(origin)
        .map_err(invalid)?
        .join(base)
        .map_err(invalid)?;
    Ok(joined.to_string())
}

#[cfg(target_arch = "wasm32")]
fn page_origin() -> Option<String> {
    web_sys::window()?.location().origin().ok()
}

#[cfg(not(target_arch = "wasm32"))]
fn page_origin() -> Option<String> {
    None
}
