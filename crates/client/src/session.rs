//! Login session persisted in client storage.
//!
//! Values are stored as plain strings so a session written by the browser
//! console reads back unchanged.

use flvx_shared::LoginResponse;

use crate::storage;

pub const TOKEN_KEY: &str = "token";
pub const ROLE_ID_KEY: &str = "role_id";
pub const NAME_KEY: &str = "name";
pub const ADMIN_KEY: &str = "admin";

/// Role id the panel assigns to administrators.
pub const ADMIN_ROLE_ID: i64 = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub token: Option<String>,
    pub role_id: Option<i64>,
    pub name: Option<String>,
    pub is_admin: bool,
}

impl SessionData {
    pub fn is_logged_in(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

fn parse_role_id(value: &str) -> Option<i64> {
    // Leading digits only, like a browser's parseInt
    let value = value.trim();
    let end = value
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

pub fn token() -> Option<String> {
    storage::load_raw(TOKEN_KEY)
}

pub fn role_id() -> Option<i64> {
    storage::load_raw(ROLE_ID_KEY).and_then(|v| parse_role_id(&v))
}

/// Stored admin flag. Sessions written before the flag existed derive it
/// from the role id and get it back-filled.
pub fn admin_flag() -> bool {
    if let Some(value) = storage::load_raw(ADMIN_KEY) {
        return value == "true";
    }

    let role_id = role_id();
    let is_admin = role_id == Some(ADMIN_ROLE_ID);
    if role_id.is_some() {
        storage::save_raw(ADMIN_KEY, if is_admin { "true" } else { "false" });
    }
    is_admin
}

pub fn read_session() -> SessionData {
    SessionData {
        token: token(),
        role_id: role_id(),
        name: storage::load_raw(NAME_KEY),
        is_admin: admin_flag(),
    }
}

pub fn write_login_session(login: &LoginResponse) {
    let is_admin = login.role_id == ADMIN_ROLE_ID;
    storage::save_raw(TOKEN_KEY, &login.token);
    storage::save_raw(ROLE_ID_KEY, &login.role_id.to_string());
    storage::save_raw(NAME_KEY, &login.name);
    storage::save_raw(ADMIN_KEY, if is_admin { "true" } else { "false" });
    crate::log_info!("session stored for {}", login.name);
}

pub fn clear_session() {
    for key in [TOKEN_KEY, ROLE_ID_KEY, NAME_KEY, ADMIN_KEY] {
        storage::remove(key);
    }
}
