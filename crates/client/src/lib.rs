//! flvx client core
//!
//! The non-visual half of the flvx admin console: list ordering, realtime
//! node telemetry, debounced offline detection, REST calls and the display
//! helpers the Dioxus pages render with. Runs in the browser (WASM) and on
//! desktop.

#[macro_use]
pub mod logging;

pub mod config;
pub mod runtime;
pub mod storage;

pub mod api_client;
pub mod session;

pub mod offline_timers;
pub mod order;
pub mod realtime;

pub mod batch;
pub mod display;
pub mod node_status;
pub mod system_info;
pub mod tunnel_form;

pub mod hooks;

pub use api_client::ApiClient;
pub use config::{ClientConfig, ConfigError};
pub use offline_timers::OfflineTimers;
pub use realtime::{realtime_url, ConnectionState, NodeRealtime, RealtimeConfig, RealtimeFeed};
