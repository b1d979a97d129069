//! Debounced "node went offline" notifications.
//!
//! A node that flaps offline for a moment should not flicker in the UI. An
//! offline signal therefore only schedules a timer; if the node reports back
//! before the timer fires, the timer is cancelled and nothing happens.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::future::AbortHandle;

use crate::runtime;

/// Delay the node page waits before showing a node as offline.
pub const DEFAULT_OFFLINE_DELAY: Duration = Duration::from_millis(3000);

type OfflineCallback = Arc<dyn Fn(i64) + Send + Sync>;

struct PendingTimer {
    token: u64,
    abort: AbortHandle,
}

struct Registry {
    delay: Duration,
    on_offline: OfflineCallback,
    timers: Mutex<HashMap<i64, PendingTimer>>,
    next_token: AtomicU64,
}

impl Registry {
    fn timers(&self) -> MutexGuard<'_, HashMap<i64, PendingTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called by the timer task. Only the timer that still owns the entry may
    /// fire, so a cancel that won the lock suppresses the callback.
    fn fire(&self, node_id: i64, token: u64) {
        let owned = {
            let mut timers = self.timers();
            match timers.get(&node_id) {
                Some(pending) if pending.token == token => {
                    timers.remove(&node_id);
                    true
                }
                _ => false,
            }
        };
        if owned {
            crate::log_debug!("node {} offline after {:?}", node_id, self.delay);
            (self.on_offline)(node_id);
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let timers = self.timers.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, pending) in timers.drain() {
            pending.abort.abort();
        }
    }
}

/// Keyed delayed-callback registry with at most one pending timer per node.
///
/// Cloning yields another handle to the same registry. Timers are cancelled
/// when the last handle is dropped.
#[derive(Clone)]
pub struct OfflineTimers {
    registry: Arc<Registry>,
}

impl std::fmt::Debug for OfflineTimers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineTimers")
            .field("delay", &self.registry.delay)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl OfflineTimers {
    pub fn new(delay: Duration, on_offline: impl Fn(i64) + Send + Sync + 'static) -> Self {
        Self {
            registry: Arc::new(Registry {
                delay,
                on_offline: Arc::new(on_offline),
                timers: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Start the offline timer for `node_id` unless one is already pending.
    pub fn schedule(&self, node_id: i64) {
        let mut timers = self.registry.timers();
        if timers.contains_key(&node_id) {
            return;
        }

        let token = self.registry.next_token.fetch_add(1, Ordering::Relaxed);
        let registry: Weak<Registry> = Arc::downgrade(&self.registry);
        let abort = runtime::spawn_delayed(self.registry.delay, move || {
            if let Some(registry) = registry.upgrade() {
                registry.fire(node_id, token);
            }
        });
        timers.insert(node_id, PendingTimer { token, abort });
    }

    /// Cancel the pending timer for `node_id`, if any.
    pub fn cancel(&self, node_id: i64) {
        let removed = self.registry.timers().remove(&node_id);
        if let Some(pending) = removed {
            pending.abort.abort();
        }
    }

    /// Cancel every pending timer. Call on teardown.
    pub fn cancel_all(&self) {
        let drained: Vec<PendingTimer> = self.registry.timers().drain().map(|(_, p)| p).collect();
        for pending in drained {
            pending.abort.abort();
        }
    }

    pub fn is_pending(&self, node_id: i64) -> bool {
        self.registry.timers().contains_key(&node_id)
    }

    pub fn pending_count(&self) -> usize {
        self.registry.timers().len()
    }

    pub fn delay(&self) -> Duration {
        self.registry.delay
    }
}
