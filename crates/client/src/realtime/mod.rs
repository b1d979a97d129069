//! Realtime node telemetry over the panel's `/system-info` WebSocket.
//!
//! [`NodeRealtime`] owns at most one live socket. Its lifecycle follows the
//! node page: connect on mount, disconnect on unmount. When the socket closes
//! while the client is enabled it reconnects with a linear backoff: attempt
//! `n` waits `n × reconnect_step`, up to `max_reconnect_attempts` attempts.
//! The counter resets on every successful open, and once the ceiling is hit
//! the client stays disconnected until `connect()` is called again.
//!
//! ```text
//!                 connect()
//!  Disconnected ─────────────▶ Connecting ──open──▶ Connected
//!       ▲                          │                    │
//!       └──────────close───────────┴────error/close─────┘
//!       │
//!       └── reconnect timer (attempt × step) ──▶ connect()
//! ```
//!
//! Every socket is tagged with a generation number. Events from a socket the
//! client has already let go of are ignored. Socket callbacks run behind a
//! dispatch gate that `disconnect` waits on, which is what makes
//! [`NodeRealtime::disconnect`] final even when frames arrive on another
//! thread.

use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use flvx_shared::{RealtimeMessage, REALTIME_PATH};
use futures_util::future::AbortHandle;

use crate::runtime;

mod feed;
pub use feed::{FeedEvent, RealtimeFeed};

#[cfg(target_arch = "wasm32")]
mod connection_wasm;
#[cfg(target_arch = "wasm32")]
use connection_wasm::{open_socket, SocketHandle};

#[cfg(not(target_arch = "wasm32"))]
mod connection_native;
#[cfg(not(target_arch = "wasm32"))]
use connection_native::{open_socket, SocketHandle};

/// Connection state for the realtime socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }
}

/// Reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Reconnects attempted after consecutive failures before giving up
    pub max_reconnect_attempts: u32,
    /// Attempt `n` is delayed by `n` steps
    pub reconnect_step: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_step: Duration::from_millis(3000),
        }
    }
}

impl RealtimeConfig {
    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.reconnect_step.saturating_mul(attempt)
    }
}

/// Build the realtime socket URL from the REST base URL.
///
/// `http`/`https` become `ws`/`wss`, a trailing `/api/v1/` is dropped and the
/// telemetry path with the session token is appended.
pub fn realtime_url(api_base: &str, token: Option<&str>) -> String {
    let base = match api_base.strip_prefix("http") {
        Some(rest) => format!("ws{rest}"),
        None => api_base.to_string(),
    };
    let base = base.strip_suffix("/api/v1/").unwrap_or(&base);
    format!(
        "{base}{REALTIME_PATH}?type=0&secret={}",
        urlencoding::encode(token.unwrap_or_default())
    )
}

type MessageHandler = Arc<dyn Fn(RealtimeMessage) + Send + Sync>;
type StateListener = Arc<dyn Fn(ConnectionState) + Send + Sync>;
type UrlBuilder = Box<dyn Fn() -> Option<String> + Send + Sync>;

struct Inner {
    enabled: bool,
    state: ConnectionState,
    attempts: u32,
    generation: u64,
    socket: Option<SocketHandle>,
    reconnect: Option<(u64, AbortHandle)>,
}

struct Shared {
    config: RealtimeConfig,
    url_builder: UrlBuilder,
    // Indirection cell: replaced freely, read on every message.
    handler: Mutex<Option<MessageHandler>>,
    state_listener: Mutex<Option<StateListener>>,
    inner: Mutex<Inner>,
    // Held while a socket event is checked and delivered.
    dispatch: Mutex<()>,
}

thread_local! {
    // Client whose socket callbacks are running on this thread, 0 if none.
    static DISPATCHING: Cell<usize> = const { Cell::new(0) };
}

/// Marks this thread as delivering events for one client until dropped.
struct DispatchGuard<'a> {
    _gate: Option<MutexGuard<'a, ()>>,
    previous: usize,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        DISPATCHING.with(|current| current.set(self.previous));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn inner(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    fn id(&self) -> usize {
        self as *const Shared as usize
    }

    /// Enter the dispatch gate. Re-entrant on the thread already holding it.
    fn begin_dispatch(&self) -> DispatchGuard<'_> {
        let previous = DISPATCHING.with(Cell::get);
        let gate = (previous != self.id()).then(|| lock(&self.dispatch));
        DISPATCHING.with(|current| current.set(self.id()));
        DispatchGuard {
            _gate: gate,
            previous,
        }
    }

    /// Block until no socket event is being delivered on another thread.
    ///
    /// A handler that disconnects from inside its own callback does not wait
    /// on itself.
    fn wait_for_dispatch(&self) {
        if DISPATCHING.with(Cell::get) != self.id() {
            drop(lock(&self.dispatch));
        }
    }

    fn notify(&self, state: ConnectionState) {
        let listener = lock(&self.state_listener).clone();
        if let Some(listener) = listener {
            listener(state);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner().generation == generation
    }

    fn on_open(&self, generation: u64) {
        let _dispatch = self.begin_dispatch();
        {
            let mut inner = self.inner();
            if inner.generation != generation {
                return;
            }
            inner.attempts = 0;
            inner.state = ConnectionState::Connected;
        }
        crate::log_info!("realtime socket connected");
        self.notify(ConnectionState::Connected);
    }

    fn on_message(&self, generation: u64, text: &str) {
        let _dispatch = self.begin_dispatch();
        if !self.is_current(generation) {
            return;
        }
        let Some(message) = RealtimeMessage::from_text(text) else {
            crate::log_debug!("dropping non-object realtime frame");
            return;
        };
        let handler = lock(&self.handler).clone();
        if let Some(handler) = handler {
            handler(message);
        }
    }

    fn on_error(&self, generation: u64, reason: &str) {
        if self.is_current(generation) {
            crate::log_debug!("realtime socket error: {}", reason);
        }
    }

    fn on_close(self: &Arc<Self>, generation: u64) {
        let _dispatch = self.begin_dispatch();
        let detached = {
            let mut inner = self.inner();
            if inner.generation != generation {
                return;
            }
            let detached = inner.socket.take();
            inner.state = ConnectionState::Disconnected;

            if inner.enabled && inner.attempts < self.config.max_reconnect_attempts {
                inner.attempts += 1;
                let attempt = inner.attempts;
                let delay = self.config.delay_for_attempt(attempt);
                crate::log_info!(
                    "realtime socket closed, reconnecting in {:?} (attempt {}/{})",
                    delay,
                    attempt,
                    self.config.max_reconnect_attempts
                );
                self.schedule_reconnect(&mut inner, delay);
            } else if inner.enabled {
                crate::log_warn!(
                    "realtime socket closed, giving up after {} reconnect attempts",
                    inner.attempts
                );
            }
            detached
        };
        if let Some(socket) = detached {
            socket.release();
        }
        self.notify(ConnectionState::Disconnected);
    }

    fn schedule_reconnect(self: &Arc<Self>, inner: &mut Inner, delay: Duration) {
        inner.generation += 1;
        let token = inner.generation;
        let shared: Weak<Shared> = Arc::downgrade(self);
        let abort = runtime::spawn_delayed(delay, move || {
            if let Some(shared) = shared.upgrade() {
                NodeRealtime { shared }.fire_reconnect(token);
            }
        });
        inner.reconnect = Some((token, abort));
    }
}

/// Callbacks a platform socket uses to report its edges back to the client.
#[derive(Clone)]
pub(crate) struct SocketEvents {
    shared: Weak<Shared>,
    generation: u64,
}

impl SocketEvents {
    pub(crate) fn opened(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_open(self.generation);
        }
    }

    pub(crate) fn message(&self, text: &str) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_message(self.generation, text);
        }
    }

    pub(crate) fn errored(&self, reason: &str) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_error(self.generation, reason);
        }
    }

    pub(crate) fn closed(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_close(self.generation);
        }
    }
}

/// Live node telemetry client.
///
/// Cloning yields another handle to the same connection.
#[derive(Clone)]
pub struct NodeRealtime {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for NodeRealtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner();
        f.debug_struct("NodeRealtime")
            .field("enabled", &inner.enabled)
            .field("state", &inner.state)
            .field("attempts", &inner.attempts)
            .finish()
    }
}

impl NodeRealtime {
    /// Create a disconnected, enabled client.
    ///
    /// `url_builder` runs on every connect so a refreshed session token is
    /// picked up by reconnects. Returning `None` skips the attempt.
    pub fn new(
        config: RealtimeConfig,
        url_builder: impl Fn() -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                url_builder: Box::new(url_builder),
                handler: Mutex::new(None),
                state_listener: Mutex::new(None),
                inner: Mutex::new(Inner {
                    enabled: true,
                    state: ConnectionState::Disconnected,
                    attempts: 0,
                    generation: 0,
                    socket: None,
                    reconnect: None,
                }),
                dispatch: Mutex::new(()),
            }),
        }
    }

    /// Replace the message handler. Takes effect for the next frame; the
    /// connection is left alone.
    pub fn set_message_handler(&self, handler: impl Fn(RealtimeMessage) + Send + Sync + 'static) {
        *lock(&self.shared.handler) = Some(Arc::new(handler));
    }

    /// Observe state transitions.
    pub fn on_state_change(&self, listener: impl Fn(ConnectionState) + Send + Sync + 'static) {
        *lock(&self.shared.state_listener) = Some(Arc::new(listener));
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.inner().state
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.inner().enabled
    }

    /// Reconnects scheduled since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.inner().attempts
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.shared.inner().reconnect.is_some()
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.shared.config
    }

    /// Open the socket unless disabled or already open/opening.
    ///
    /// A socket that is already closing is dropped without waiting for its
    /// close event, and a new one is opened right away.
    pub fn connect(&self) {
        let (generation, dropped_stale) = {
            let mut inner = self.shared.inner();
            if !inner.enabled {
                return;
            }
            let mut dropped_stale = false;
            if inner.socket.as_ref().is_some_and(SocketHandle::is_closing) {
                inner.generation += 1;
                inner.state = ConnectionState::Disconnected;
                if let Some(stale) = inner.socket.take() {
                    crate::log_debug!("replacing realtime socket that is still closing");
                    stale.close();
                }
                dropped_stale = true;
            }
            if inner.socket.is_some() {
                return;
            }
            (inner.generation, dropped_stale)
        };

        let Some(url) = (self.shared.url_builder)() else {
            crate::log_warn!("realtime URL unavailable, not connecting");
            if dropped_stale {
                self.shared.notify(ConnectionState::Disconnected);
            }
            return;
        };

        let opened = {
            let mut inner = self.shared.inner();
            // Raced with another connect/disconnect while building the URL.
            if !inner.enabled || inner.socket.is_some() || inner.generation != generation {
                return;
            }
            inner.generation += 1;
            if let Some((_, abort)) = inner.reconnect.take() {
                abort.abort();
            }
            let events = SocketEvents {
                shared: Arc::downgrade(&self.shared),
                generation: inner.generation,
            };
            match open_socket(&url, events) {
                Ok(socket) => {
                    inner.socket = Some(socket);
                    inner.state = ConnectionState::Connecting;
                    true
                }
                Err(reason) => {
                    crate::log_error!("failed to create realtime socket: {}", reason);
                    inner.state = ConnectionState::Disconnected;
                    false
                }
            }
        };

        self.shared.notify(if opened {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        });
    }

    /// Tear the connection down and cancel any pending reconnect.
    ///
    /// Safe to call repeatedly. No callback fires for the old socket after
    /// this returns: an event already being delivered on another thread is
    /// waited for.
    pub fn disconnect(&self) {
        let (socket, changed) = {
            let mut inner = self.shared.inner();
            if let Some((_, abort)) = inner.reconnect.take() {
                abort.abort();
            }
            inner.attempts = 0;
            inner.generation += 1;
            let changed = inner.state != ConnectionState::Disconnected;
            inner.state = ConnectionState::Disconnected;
            (inner.socket.take(), changed)
        };
        self.shared.wait_for_dispatch();
        if let Some(socket) = socket {
            crate::log_debug!("closing realtime socket");
            socket.close();
        }
        if changed {
            self.shared.notify(ConnectionState::Disconnected);
        }
    }

    /// Allow or forbid connecting. Disabling tears the connection down;
    /// enabling only permits the next `connect()`.
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.inner().enabled = enabled;
        if !enabled {
            self.disconnect();
        }
    }

    fn fire_reconnect(&self, token: u64) {
        {
            let mut inner = self.shared.inner();
            match inner.reconnect {
                Some((pending, _)) if pending == token => inner.reconnect = None,
                _ => return,
            }
        }
        self.connect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_rewrites_scheme_and_strips_api_prefix() {
        assert_eq!(
            realtime_url("https://panel.example.com/api/v1/", Some("abc")),
            "wss://panel.example.com/system-info?type=0&secret=abc"
        );
        assert_eq!(
            realtime_url("http://10.0.0.2:6365/api/v1/", None),
            "ws://10.0.0.2:6365/system-info?type=0&secret="
        );
    }

    #[test]
    fn url_keeps_other_paths_and_encodes_token() {
        assert_eq!(
            realtime_url("https://panel.example.com/console", Some("a b+c")),
            "wss://panel.example.com/console/system-info?type=0&secret=a%20b%2Bc"
        );
    }

    #[test]
    fn backoff_is_linear() {
        let config = RealtimeConfig::default();
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(6));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(15));
    }

    #[test]
    fn disabled_client_does_not_connect() {
        let client = NodeRealtime::new(RealtimeConfig::default(), || {
            panic!("url builder must not run while disabled")
        });
        client.set_enabled(false);
        client.connect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.has_pending_reconnect());
    }

    #[test]
    fn missing_url_leaves_client_disconnected() {
        let client = NodeRealtime::new(RealtimeConfig::default(), || None);
        client.connect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_from_inside_a_dispatch_does_not_wait_on_itself() {
        let client = NodeRealtime::new(RealtimeConfig::default(), || None);
        let _dispatch = client.shared.begin_dispatch();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn dispatch_gate_is_reentrant() {
        let client = NodeRealtime::new(RealtimeConfig::default(), || None);
        let outer = client.shared.begin_dispatch();
        {
            let _inner = client.shared.begin_dispatch();
        }
        assert_eq!(DISPATCHING.with(Cell::get), client.shared.id());
        drop(outer);
        assert_eq!(DISPATCHING.with(Cell::get), 0);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn connect_replaces_a_socket_that_is_already_closing() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = accepts.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let url = format!("ws://{addr}/system-info?type=0&secret=");
        let builder_url = url.clone();
        let client = NodeRealtime::new(
            RealtimeConfig {
                max_reconnect_attempts: 0,
                reconnect_step: Duration::from_millis(10),
            },
            move || Some(builder_url.clone()),
        );

        // Socket whose task has finished without reporting back
        let orphan = open_socket(
            &url,
            SocketEvents {
                shared: Weak::new(),
                generation: 0,
            },
        )
        .unwrap();
        for _ in 0..500 {
            if orphan.is_closing() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(orphan.is_closing());
        {
            let mut inner = client.shared.inner();
            inner.socket = Some(orphan);
            inner.state = ConnectionState::Connected;
        }

        client.connect();
        assert_eq!(client.state(), ConnectionState::Connecting);
        for _ in 0..500 {
            if accepts.load(Ordering::SeqCst) >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(accepts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let client = NodeRealtime::new(RealtimeConfig::default(), || None);
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.reconnect_attempts(), 0);
    }
}
