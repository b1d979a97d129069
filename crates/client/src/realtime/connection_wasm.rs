//! WASM/Web socket implementation using web_sys::WebSocket.

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

use super::SocketEvents;

/// Owning handle to a browser socket and the closures wired to it.
pub(crate) struct SocketHandle {
    ws: WebSocket,
    callbacks: Callbacks,
}

struct Callbacks {
    _onopen: Closure<dyn FnMut(Event)>,
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
    _onerror: Closure<dyn FnMut(Event)>,
    _onclose: Closure<dyn FnMut(CloseEvent)>,
}

impl SocketHandle {
    fn detach(&self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
    }

    /// The browser is closing the socket, or already has.
    pub(crate) fn is_closing(&self) -> bool {
        let ready = self.ws.ready_state();
        ready == WebSocket::CLOSING || ready == WebSocket::CLOSED
    }

    /// Detach every callback and close the socket if it is open or opening.
    pub(crate) fn close(self) {
        self.detach();
        let ready = self.ws.ready_state();
        if ready == WebSocket::CONNECTING || ready == WebSocket::OPEN {
            let _ = self.ws.close();
        }
        self.release();
    }

    /// Drop the handle once the current event has been dispatched.
    ///
    /// This may run inside one of the socket's own callbacks, and a closure
    /// must not be freed while it is executing.
    pub(crate) fn release(self) {
        let SocketHandle { ws, callbacks } = self;
        spawn_local(async move {
            drop(callbacks);
            drop(ws);
        });
    }
}

pub(crate) fn open_socket(url: &str, events: SocketEvents) -> Result<SocketHandle, String> {
    let ws = WebSocket::new(url).map_err(|e| format!("{:?}", e))?;

    let on_open = events.clone();
    let onopen = Closure::wrap(Box::new(move |_: Event| {
        on_open.opened();
    }) as Box<dyn FnMut(Event)>);
    ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));

    let on_message = events.clone();
    let onmessage = Closure::wrap(Box::new(move |e: MessageEvent| {
        // Binary frames are not part of the protocol
        if let Some(text) = e.data().as_string() {
            on_message.message(&text);
        }
    }) as Box<dyn FnMut(MessageEvent)>);
    ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));

    let on_error = events.clone();
    let onerror = Closure::wrap(Box::new(move |e: Event| {
        on_error.errored(&e.type_());
    }) as Box<dyn FnMut(Event)>);
    ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));

    let on_close = events;
    let onclose = Closure::wrap(Box::new(move |_: CloseEvent| {
        on_close.closed();
    }) as Box<dyn FnMut(CloseEvent)>);
    ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));

    Ok(SocketHandle {
        ws,
        callbacks: Callbacks {
            _onopen: onopen,
            _onmessage: onmessage,
            _onerror: onerror,
            _onclose: onclose,
        },
    })
}
