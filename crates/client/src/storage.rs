//! Cross-platform key/value storage.
//!
//! Values are JSON strings stored under a caller-supplied key:
//! - Web: `localStorage`
//! - Desktop: one `<key>.json` file per key in the platform config directory
//!   (`~/.config/flvx/` on Linux), or in `$FLVX_CONFIG_DIR` when set.
//!
//! Storage is a convenience: every operation is best-effort and reports
//! failure as `false`/`None` instead of an error.

use serde::Serialize;

/// Save a value to persistent storage.
///
/// Returns `true` if the operation succeeded.
pub fn save<T: Serialize>(key: &str, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => save_raw(key, &json),
        Err(_) => false,
    }
}

/// Remove a value from persistent storage.
pub fn remove(key: &str) {
    remove_raw(key);
}

// =========================================
// Web (WASM) implementation
// =========================================

#[cfg(target_arch = "wasm32")]
fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

/// Store a raw string under `key`.
#[cfg(target_arch = "wasm32")]
pub fn save_raw(key: &str, value: &str) -> bool {
    local_storage().is_some_and(|storage| storage.set_item(key, value).is_ok())
}

/// Read the raw string stored under `key`.
#[cfg(target_arch = "wasm32")]
pub fn load_raw(key: &str) -> Option<String> {
    local_storage()?.get_item(key).ok()?
}

#[cfg(target_arch = "wasm32")]
fn remove_raw(key: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.remove_item(key);
    }
}

// =========================================
// Desktop (native) implementation
// =========================================

#[cfg(not(target_arch = "wasm32"))]
fn storage_dir() -> Option<std::path::PathBuf> {
    let dir = match std::env::var_os(crate::config::ENV_CONFIG_DIR) {
        Some(dir) if !dir.is_empty() => std::path::PathBuf::from(dir),
        _ => dirs::config_dir()?.join("flvx"),
    };

    if !dir.exists() {
        std::fs::create_dir_all(&dir).ok()?;
    }

    Some(dir)
}

#[cfg(not(target_arch = "wasm32"))]
fn file_path(key: &str) -> Option<std::path::PathBuf> {
    let dir = storage_dir()?;
    // Keys become file names
    let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
    Some(dir.join(format!("{}.json", safe_key)))
}

/// Store a raw string under `key`.
#[cfg(not(target_arch = "wasm32"))]
pub fn save_raw(key: &str, value: &str) -> bool {
    let Some(path) = file_path(key) else {
        return false;
    };
    std::fs::write(path, value).is_ok()
}

/// Read the raw string stored under `key`.
#[cfg(not(target_arch = "wasm32"))]
pub fn load_raw(key: &str) -> Option<String> {
    let path = file_path(key)?;
    std::fs::read_to_string(path).ok()
}

#[cfg(not(target_arch = "wasm32"))]
fn remove_raw(key: &str) {
    if let Some(path) = file_path(key) {
        let _ = std::fs::remove_file(path);
    }
}
