//! User-defined list ordering.
//!
//! The forward, node and tunnel lists can be reordered by drag and drop. The
//! order is kept in client storage as a JSON array of ids, and reconciled
//! against whatever the server returns on the next load: stale ids are
//! dropped and new ids are appended at the end.

use std::collections::HashSet;

use flvx_shared::{ForwardApiItem, NodeApiItem, OrderEntry, TunnelApiItem};
use serde_json::Value;

use crate::storage;

pub const FORWARD_ORDER_KEY: &str = "forward-order";
pub const NODE_ORDER_KEY: &str = "node-order";
pub const TUNNEL_ORDER_KEY: &str = "tunnel-order";

/// A list item that can take part in a user-defined order.
pub trait Orderable {
    fn order_id(&self) -> i64;

    /// Server-side position, when the backend persisted one.
    fn order_inx(&self) -> Option<i64> {
        None
    }

    /// Owning user, for lists shared between users.
    fn owner_id(&self) -> Option<i64> {
        None
    }
}

impl Orderable for ForwardApiItem {
    fn order_id(&self) -> i64 {
        self.id
    }

    fn order_inx(&self) -> Option<i64> {
        self.inx
    }

    fn owner_id(&self) -> Option<i64> {
        self.user_id
    }
}

impl Orderable for NodeApiItem {
    fn order_id(&self) -> i64 {
        self.id
    }

    fn order_inx(&self) -> Option<i64> {
        self.inx
    }
}

impl Orderable for TunnelApiItem {
    fn order_id(&self) -> i64 {
        self.id
    }

    fn order_inx(&self) -> Option<i64> {
        self.inx
    }
}

/// Parse a stored order.
///
/// Anything that is not a JSON array reads as "no stored order". Entries are
/// coerced to numbers; fractional, negative and non-numeric entries are
/// dropped.
pub fn parse_order_ids(raw: Option<&str>) -> Option<Vec<i64>> {
    let raw = raw.filter(|s| !s.is_empty())?;
    let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(raw) else {
        return None;
    };
    Some(entries.iter().filter_map(coerce_id).collect())
}

fn coerce_id(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => return None,
    };
    if number.is_finite() && number.fract() == 0.0 && number >= 0.0 && number <= i64::MAX as f64 {
        Some(number as i64)
    } else {
        None
    }
}

/// Merge a stored order with the ids the server currently knows about.
///
/// The result is always a permutation of `current`.
pub fn reconcile(stored: Option<&[i64]>, current: &[i64]) -> Vec<i64> {
    let stored = match stored {
        Some(stored) if !stored.is_empty() => stored,
        _ => return current.to_vec(),
    };

    let known: HashSet<i64> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(current.len());
    let mut ordered: Vec<i64> = stored
        .iter()
        .copied()
        .filter(|id| known.contains(id) && seen.insert(*id))
        .collect();

    if ordered.is_empty() {
        return current.to_vec();
    }

    for id in current {
        if seen.insert(*id) {
            ordered.push(*id);
        }
    }
    ordered
}

/// Read the order stored under `key` and reconcile it with `current`.
pub fn load_stored_order(key: &str, current: &[i64]) -> Vec<i64> {
    let raw = storage::load_raw(key);
    let stored = parse_order_ids(raw.as_deref());
    reconcile(stored.as_deref(), current)
}

/// Persist `ids` under `key`. Failures are only logged.
pub fn save_order(key: &str, ids: &[i64]) {
    if !storage::save(key, &ids) {
        crate::log_debug!("failed to persist order under {}", key);
    }
}

/// Move `active` to the position currently held by `over`.
///
/// Returns `None` when nothing moves.
pub fn move_item(order: &[i64], active: i64, over: i64) -> Option<Vec<i64>> {
    if active == over {
        return None;
    }
    let from = order.iter().position(|id| *id == active)?;
    let to = order.iter().position(|id| *id == over)?;

    let mut moved = order.to_vec();
    let id = moved.remove(from);
    moved.insert(to, id);
    Some(moved)
}

/// Rows for an `*/update-order` request.
pub fn order_entries(order: &[i64]) -> Vec<OrderEntry> {
    order
        .iter()
        .enumerate()
        .map(|(inx, id)| OrderEntry {
            id: *id,
            inx: inx as i64,
        })
        .collect()
}

/// Items owned by `user_id`, or every item when no user is given.
pub fn user_scoped<T: Orderable>(items: &[T], user_id: Option<i64>) -> Vec<&T> {
    match user_id {
        None => items.iter().collect(),
        Some(user) => items
            .iter()
            .filter(|item| item.owner_id() == Some(user))
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltOrder {
    pub order: Vec<i64>,
    /// The order came from server-side `inx` values, not client storage.
    pub from_database: bool,
}

/// Initial display order for a freshly loaded list.
///
/// A server-side order wins as soon as any item has a non-zero `inx`.
pub fn build_order<T: Orderable>(items: &[T], user_id: Option<i64>, key: &str) -> BuiltOrder {
    let scoped = user_scoped(items, user_id);

    let has_db_order = scoped
        .iter()
        .any(|item| item.order_inx().is_some_and(|inx| inx != 0));

    if has_db_order {
        let mut sorted = scoped;
        sorted.sort_by_key(|item| item.order_inx().unwrap_or(0));
        return BuiltOrder {
            order: sorted.iter().map(|item| item.order_id()).collect(),
            from_database: true,
        };
    }

    let ids: Vec<i64> = scoped.iter().map(|item| item.order_id()).collect();
    BuiltOrder {
        order: load_stored_order(key, &ids),
        from_database: false,
    }
}
