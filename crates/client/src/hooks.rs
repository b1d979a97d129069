//! Dioxus hooks binding the realtime client, offline timers and stored
//! orders to a component's lifecycle.
//!
//! Socket and timer callbacks may run off the UI thread on desktop, so they
//! only push onto an unbounded channel. A task spawned in the component scope
//! drains it and calls the component's latest handler, skipping realtime
//! frames queued before the last disconnect.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use dioxus::prelude::*;
use flvx_shared::RealtimeMessage;
use futures_channel::mpsc;
use futures_util::StreamExt;

use crate::config::ClientConfig;
use crate::offline_timers::OfflineTimers;
use crate::order;
use crate::realtime::{realtime_url, ConnectionState, FeedEvent, NodeRealtime, RealtimeFeed};
use crate::session;

type MessageCallback = Rc<RefCell<Box<dyn FnMut(RealtimeMessage)>>>;

/// Handle returned by [`use_node_realtime`].
#[derive(Clone)]
pub struct RealtimeHandle {
    feed: RealtimeFeed,
    state: Signal<ConnectionState>,
}

impl RealtimeHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        self.state().is_connecting()
    }

    /// Manual reconnect, e.g. from a "retry" button.
    pub fn reconnect(&self) {
        self.feed.reconnect();
    }

    /// Disconnect. Frames still queued for the component are dropped.
    pub fn disconnect(&self) {
        self.feed.disconnect();
    }
}

/// Keep a realtime connection open while the component is mounted and
/// `enabled` is true.
///
/// `on_message` may change on every render; the newest one receives frames.
pub fn use_node_realtime(
    config: &ClientConfig,
    enabled: bool,
    on_message: impl FnMut(RealtimeMessage) + 'static,
) -> RealtimeHandle {
    let state = use_signal(ConnectionState::default);

    let callback: MessageCallback =
        use_hook(|| Rc::new(RefCell::new(Box::new(|_: RealtimeMessage| {}) as Box<dyn FnMut(RealtimeMessage)>)));
    if let Ok(mut current) = callback.try_borrow_mut() {
        *current = Box::new(on_message);
    }

    let feed = use_hook(|| {
        let api_base = match config.absolute_api_base() {
            Ok(base) => Some(base),
            Err(e) => {
                crate::log_error!("realtime disabled: {}", e);
                None
            }
        };
        let client = NodeRealtime::new(config.realtime.clone(), move || {
            let base = api_base.as_deref()?;
            Some(realtime_url(base, session::token().as_deref()))
        });
        let (feed, mut rx) = RealtimeFeed::new(client);

        let drain = feed.clone();
        let callback = callback.clone();
        let mut state = state;
        spawn(async move {
            while let Some(event) = rx.next().await {
                match event {
                    FeedEvent::State(next) => state.set(next),
                    FeedEvent::Message { epoch, message } => {
                        if !drain.is_current(epoch) {
                            continue;
                        }
                        if let Ok(mut handler) = callback.try_borrow_mut() {
                            (*handler)(message);
                        }
                    }
                }
            }
        });

        feed
    });

    feed.sync_enabled(enabled);

    let teardown = feed.clone();
    use_drop(move || teardown.disconnect());

    RealtimeHandle { feed, state }
}

/// Offline timers whose callback runs on the UI task.
///
/// Every pending timer is cancelled when the component unmounts.
pub fn use_offline_timers(delay: Duration, on_offline: impl FnMut(i64) + 'static) -> OfflineTimers {
    let callback: Rc<RefCell<Box<dyn FnMut(i64)>>> =
        use_hook(|| Rc::new(RefCell::new(Box::new(|_: i64| {}) as Box<dyn FnMut(i64)>)));
    if let Ok(mut current) = callback.try_borrow_mut() {
        *current = Box::new(on_offline);
    }

    let timers = use_hook(|| {
        let (tx, mut rx) = mpsc::unbounded::<i64>();
        let timers = OfflineTimers::new(delay, move |node_id| {
            let _ = tx.unbounded_send(node_id);
        });

        let callback = callback.clone();
        spawn(async move {
            while let Some(node_id) = rx.next().await {
                if let Ok(mut handler) = callback.try_borrow_mut() {
                    (*handler)(node_id);
                }
            }
        });

        timers
    });

    let teardown = timers.clone();
    use_drop(move || teardown.cancel_all());

    timers
}

/// Reactive list order backed by client storage.
#[derive(Clone, Copy)]
pub struct StoredOrder {
    key: &'static str,
    order: Signal<Vec<i64>>,
}

impl StoredOrder {
    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn ids(&self) -> Vec<i64> {
        self.order.read().clone()
    }

    /// Reconcile the stored order with a freshly loaded id list.
    pub fn sync(&mut self, current: &[i64]) {
        self.order.set(order::load_stored_order(self.key, current));
    }

    /// Replace the order without touching storage, e.g. with a server order.
    pub fn replace(&mut self, ids: Vec<i64>) {
        self.order.set(ids);
    }

    /// Replace and persist the order.
    pub fn save(&mut self, ids: Vec<i64>) {
        order::save_order(self.key, &ids);
        self.order.set(ids);
    }

    /// Drag-and-drop move. Returns the new order when something moved.
    pub fn move_item(&mut self, active: i64, over: i64) -> Option<Vec<i64>> {
        let moved = order::move_item(&self.order.read(), active, over)?;
        self.save(moved.clone());
        Some(moved)
    }
}

pub fn use_stored_order(key: &'static str) -> StoredOrder {
    let order = use_signal(Vec::new);
    StoredOrder { key, order }
}
