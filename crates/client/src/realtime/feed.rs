//! Hand-off from a [`NodeRealtime`] to a single consumer task.
//!
//! Socket callbacks may run on any thread, so the feed only queues events on
//! an unbounded channel. Every message is stamped with the feed's epoch and
//! the epoch moves on whenever the feed tears its connection down, so frames
//! still sitting in the queue from an old connection can be told apart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use flvx_shared::RealtimeMessage;
use futures_channel::mpsc;

use super::{lock, ConnectionState, NodeRealtime};

#[derive(Debug)]
pub enum FeedEvent {
    Message { epoch: u64, message: RealtimeMessage },
    State(ConnectionState),
}

/// A realtime client bound to one consumer.
#[derive(Clone)]
pub struct RealtimeFeed {
    client: NodeRealtime,
    epoch: Arc<AtomicU64>,
    enabled: Arc<Mutex<Option<bool>>>,
}

impl RealtimeFeed {
    /// Route `client`'s messages and state changes into a channel.
    ///
    /// Replaces any handler or state listener already set on `client`.
    pub fn new(client: NodeRealtime) -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        let (tx, rx) = mpsc::unbounded();
        let epoch = Arc::new(AtomicU64::new(0));

        let message_tx = tx.clone();
        let message_epoch = epoch.clone();
        client.set_message_handler(move |message| {
            let epoch = message_epoch.load(Ordering::SeqCst);
            let _ = message_tx.unbounded_send(FeedEvent::Message { epoch, message });
        });
        client.on_state_change(move |state| {
            let _ = tx.unbounded_send(FeedEvent::State(state));
        });

        let feed = Self {
            client,
            epoch,
            enabled: Arc::new(Mutex::new(None)),
        };
        (feed, rx)
    }

    pub fn client(&self) -> &NodeRealtime {
        &self.client
    }

    /// Apply the consumer's `enabled` flag. Only a change has an effect:
    /// switching on connects, switching off tears the connection down.
    ///
    /// Returns whether the flag changed.
    pub fn sync_enabled(&self, enabled: bool) -> bool {
        {
            let mut last = lock(&self.enabled);
            if *last == Some(enabled) {
                return false;
            }
            *last = Some(enabled);
        }

        self.client.set_enabled(enabled);
        if enabled {
            self.client.connect();
        } else {
            self.retire_epoch();
        }
        true
    }

    /// Manual reconnect, e.g. from a "retry" button.
    pub fn reconnect(&self) {
        self.client.connect();
    }

    /// Disconnect and mark every queued message as stale.
    pub fn disconnect(&self) {
        self.client.disconnect();
        self.retire_epoch();
    }

    /// Whether a message stamped with `epoch` belongs to the live connection.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    // Only after the client has stopped delivering for the old socket.
    fn retire_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}
