//! Realtime client lifecycle against local sockets.

#![cfg(not(target_arch = "wasm32"))]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flvx_client::realtime::FeedEvent;
use flvx_client::{ConnectionState, NodeRealtime, RealtimeConfig, RealtimeFeed};
use futures_channel::mpsc::UnboundedReceiver;
use flvx_shared::{NodeEvent, RealtimeMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

fn fast_config(step_ms: u64) -> RealtimeConfig {
    RealtimeConfig {
        max_reconnect_attempts: 5,
        reconnect_step: Duration::from_millis(step_ms),
    }
}

fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/system-info?type=0&secret=test")
}

/// Accepts TCP connections and drops them before the handshake.
async fn refusing_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let counter = accepts.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });
    (addr, accepts)
}

/// WebSocket server that sends `frames` to every client, then idles until
/// the client goes away.
async fn telemetry_server(frames: Vec<String>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let frames = frames.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                for frame in frames {
                    if ws.send(Message::Text(frame.into())).await.is_err() {
                        return;
                    }
                }
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });
    addr
}

async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_gives_up_after_five_reconnects() {
    let (addr, accepts) = refusing_server().await;
    let client = NodeRealtime::new(fast_config(10), move || Some(ws_url(addr)));

    client.connect();

    let settled = wait_until(Duration::from_secs(5), || {
        accepts.load(Ordering::SeqCst) >= 6
            && client.state() == ConnectionState::Disconnected
            && !client.has_pending_reconnect()
    })
    .await;
    assert!(settled, "client did not settle: {client:?}");

    // Longer than the whole backoff schedule
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(accepts.load(Ordering::SeqCst), 6);
    assert_eq!(client.reconnect_attempts(), 5);
    assert!(!client.has_pending_reconnect());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_manual_connect_after_giving_up_starts_over() {
    let (addr, accepts) = refusing_server().await;
    let client = NodeRealtime::new(fast_config(5), move || Some(ws_url(addr)));

    client.connect();
    assert!(
        wait_until(Duration::from_secs(5), || accepts.load(Ordering::SeqCst) >= 6
            && !client.has_pending_reconnect())
        .await
    );

    client.connect();
    assert!(wait_until(Duration::from_secs(2), || accepts.load(Ordering::SeqCst) >= 7).await);
    client.disconnect();
}

#[tokio::test]
async fn test_disconnect_cancels_pending_reconnect() {
    let (addr, accepts) = refusing_server().await;
    let client = NodeRealtime::new(fast_config(300), move || Some(ws_url(addr)));

    client.connect();
    assert!(wait_until(Duration::from_secs(2), || client.has_pending_reconnect()).await);

    client.disconnect();
    assert!(!client.has_pending_reconnect());
    assert_eq!(client.reconnect_attempts(), 0);
    assert_eq!(client.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(accepts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_only_object_frames_reach_the_handler() {
    let addr = telemetry_server(vec![
        r#"{"id":1,"type":"status","data":1}"#.to_string(),
        "[1,2,3]".to_string(),
        r#""just a string""#.to_string(),
        "not json".to_string(),
        r#"{"id":"2","type":"info","data":"{\"cpu_usage\":3}"}"#.to_string(),
    ])
    .await;

    let received: Arc<Mutex<Vec<RealtimeMessage>>> = Arc::default();
    let states: Arc<Mutex<Vec<ConnectionState>>> = Arc::default();

    let client = NodeRealtime::new(fast_config(10), move || Some(ws_url(addr)));
    let sink = received.clone();
    client.set_message_handler(move |message| sink.lock().unwrap().push(message));
    let state_sink = states.clone();
    client.on_state_change(move |state| state_sink.lock().unwrap().push(state));

    client.connect();
    assert!(wait_until(Duration::from_secs(5), || received.lock().unwrap().len() >= 2).await);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.reconnect_attempts(), 0);

    {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(
            received[0].node_event(),
            Some(NodeEvent::Status {
                node_id: 1,
                online: true
            })
        );
        assert_eq!(received[1].node_id(), Some(2));
        assert_eq!(received[1].kind(), Some("info"));
    }

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(
        *states.lock().unwrap(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected
        ]
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(received.lock().unwrap().len(), 2);
    assert_eq!(states.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_handler_can_be_replaced_without_reconnecting() {
    let addr = telemetry_server(vec![r#"{"id":1,"type":"status","data":0}"#.to_string()]).await;

    let first: Arc<Mutex<Vec<RealtimeMessage>>> = Arc::default();
    let second: Arc<Mutex<Vec<RealtimeMessage>>> = Arc::default();

    let client = NodeRealtime::new(fast_config(10), move || Some(ws_url(addr)));
    let sink = second.clone();
    // Replaced before the first frame can arrive
    let unused = first.clone();
    client.set_message_handler(move |message| unused.lock().unwrap().push(message));
    client.set_message_handler(move |message| sink.lock().unwrap().push(message));

    client.connect();
    assert!(wait_until(Duration::from_secs(5), || !second.lock().unwrap().is_empty()).await);
    assert!(first.lock().unwrap().is_empty());

    // Already open: a second connect is a no-op
    client.connect();
    assert_eq!(client.state(), ConnectionState::Connected);
    client.disconnect();
}

#[tokio::test]
async fn test_disabling_tears_down_and_blocks_connect() {
    let addr = telemetry_server(Vec::new()).await;
    let client = NodeRealtime::new(fast_config(10), move || Some(ws_url(addr)));

    client.connect();
    assert!(wait_until(Duration::from_secs(5), || client.state().is_connected()).await);

    client.set_enabled(false);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    client.connect();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.set_enabled(true);
    client.connect();
    assert!(wait_until(Duration::from_secs(5), || client.state().is_connected()).await);
    client.disconnect();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnect_waits_for_a_frame_being_delivered() {
    let addr = telemetry_server(vec![
        r#"{"id":1,"type":"status","data":1}"#.to_string(),
        r#"{"id":2,"type":"status","data":1}"#.to_string(),
    ])
    .await;

    let delivered = Arc::new(AtomicUsize::new(0));
    let (entered_tx, entered_rx) = std::sync::mpsc::channel::<()>();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);

    let client = NodeRealtime::new(fast_config(10), move || Some(ws_url(addr)));
    let count = delivered.clone();
    client.set_message_handler(move |_| {
        let _ = entered_tx.lock().unwrap().send(());
        // Park the socket task inside the handler until the test lets go
        let _ = release_rx
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(5));
        count.fetch_add(1, Ordering::SeqCst);
    });
    client.connect();

    tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(5)))
        .await
        .unwrap()
        .expect("first frame never reached the handler");

    let returned = Arc::new(AtomicBool::new(false));
    let returned_flag = returned.clone();
    let disconnecting = client.clone();
    let disconnect = tokio::task::spawn_blocking(move || {
        disconnecting.disconnect();
        returned_flag.store(true, Ordering::SeqCst);
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!returned.load(Ordering::SeqCst));
    assert_eq!(delivered.load(Ordering::SeqCst), 0);

    release_tx.send(()).unwrap();
    disconnect.await.unwrap();
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);

    // The second frame belongs to the dropped socket
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

async fn next_message(rx: &mut UnboundedReceiver<FeedEvent>) -> (u64, RealtimeMessage) {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), rx.next()).await {
            Ok(Some(FeedEvent::Message { epoch, message })) => return (epoch, message),
            Ok(Some(FeedEvent::State(_))) => continue,
            other => panic!("no realtime message: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_feed_marks_queued_frames_stale_after_disconnect() {
    let addr = telemetry_server(vec![r#"{"id":7,"type":"status","data":1}"#.to_string()]).await;
    let client = NodeRealtime::new(fast_config(10), move || Some(ws_url(addr)));
    let (feed, mut rx) = RealtimeFeed::new(client);

    assert!(feed.sync_enabled(true));
    let (epoch, message) = next_message(&mut rx).await;
    assert!(feed.is_current(epoch));
    assert_eq!(message.node_id(), Some(7));

    feed.disconnect();
    assert!(!feed.is_current(epoch));
    assert_eq!(feed.client().state(), ConnectionState::Disconnected);

    // A fresh connection delivers current frames again
    feed.reconnect();
    let (fresh, _) = next_message(&mut rx).await;
    assert_ne!(fresh, epoch);
    assert!(feed.is_current(fresh));
    feed.disconnect();
}

#[tokio::test]
async fn test_feed_applies_only_enabled_changes() {
    let addr = telemetry_server(Vec::new()).await;
    let client = NodeRealtime::new(fast_config(10), move || Some(ws_url(addr)));
    let (feed, mut rx) = RealtimeFeed::new(client);

    assert!(feed.sync_enabled(true));
    assert_eq!(feed.client().state(), ConnectionState::Connecting);
    assert!(!feed.sync_enabled(true));
    assert!(wait_until(Duration::from_secs(5), || feed.client().state().is_connected()).await);

    assert!(feed.sync_enabled(false));
    assert!(!feed.client().is_enabled());
    assert_eq!(feed.client().state(), ConnectionState::Disconnected);
    assert!(!feed.sync_enabled(false));

    // Re-rendering with the flag still off must not reconnect
    feed.reconnect();
    assert_eq!(feed.client().state(), ConnectionState::Disconnected);

    assert!(feed.sync_enabled(true));
    assert!(wait_until(Duration::from_secs(5), || feed.client().state().is_connected()).await);
    feed.disconnect();

    let mut states = Vec::new();
    while let Ok(Some(event)) = rx.try_next() {
        if let FeedEvent::State(state) = event {
            states.push(state);
        }
    }
    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ]
    );
}
