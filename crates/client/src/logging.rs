//! Cross-platform logging.
//!
//! The `log_*!` macros dispatch to the backend of the current target:
//! - Web: `web_sys::console`
//! - Desktop: `tracing`, installed with [`init_tracing`]

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "flvx_client=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Install the native `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. A second call is ignored.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// The browser console needs no setup.
#[cfg(target_arch = "wasm32")]
pub fn init_tracing(_default_filter: &str) {}

#[cfg(target_arch = "wasm32")]
pub fn emit(level: Level, msg: &str) {
    let msg = wasm_bindgen::JsValue::from_str(msg);
    match level {
        Level::Debug => web_sys::console::debug_1(&msg),
        Level::Info => web_sys::console::log_1(&msg),
        Level::Warn => web_sys::console::warn_1(&msg),
        Level::Error => web_sys::console::error_1(&msg),
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn emit(level: Level, msg: &str) {
    match level {
        Level::Debug => tracing::debug!("{}", msg),
        Level::Info => tracing::info!("{}", msg),
        Level::Warn => tracing::warn!("{}", msg),
        Level::Error => tracing::error!("{}", msg),
    }
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Info, &format!($($arg)*))
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Error, &format!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Warn, &format!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Debug, &format!($($arg)*))
    };
}
