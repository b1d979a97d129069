//! Native/Desktop socket implementation using tokio-tungstenite.

use futures_util::StreamExt;
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::SocketEvents;

/// Owning handle to a socket task.
///
/// Dropping the handle also shuts the socket down.
pub(crate) struct SocketHandle {
    shutdown: Option<oneshot::Sender<()>>,
}

impl SocketHandle {
    /// Ask the task to send a close frame and exit without reporting `closed`.
    pub(crate) fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }

    /// The socket task has exited, so no further events will arrive.
    pub(crate) fn is_closing(&self) -> bool {
        self.shutdown.as_ref().map_or(true, |shutdown| shutdown.is_closed())
    }

    /// Drop a handle whose task has already finished.
    pub(crate) fn release(self) {}
}

/// Spawn the socket task. Must be called from within a tokio runtime.
pub(crate) fn open_socket(url: &str, events: SocketEvents) -> Result<SocketHandle, String> {
    let url = url.to_string();
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let connecting = tokio::select! {
            result = connect_async(url.as_str()) => result,
            _ = &mut shutdown_rx => return,
        };

        let mut ws = match connecting {
            Ok((ws, _response)) => ws,
            Err(e) => {
                events.errored(&e.to_string());
                events.closed();
                return;
            }
        };
        events.opened();

        loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => events.message(&text),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Binary, ping, pong: pong replies are handled by tungstenite
                    }
                    Some(Err(e)) => {
                        events.errored(&e.to_string());
                        break;
                    }
                },
                _ = &mut shutdown_rx => {
                    let _ = ws.close(None).await;
                    return;
                }
            }
        }

        events.closed();
    });

    Ok(SocketHandle {
        shutdown: Some(shutdown_tx),
    })
}
