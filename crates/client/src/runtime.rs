//! Task spawning and timers for both targets.
//!
//! The browser runs everything on the page's event loop
//! (`wasm_bindgen_futures`, `gloo-timers`); desktop builds use the ambient
//! tokio runtime. Delayed work is cancelled through a `futures` abort handle
//! so callers do not need to know which executor is underneath.

use std::future::Future;
use std::time::Duration;

use futures_util::future::{abortable, AbortHandle};

/// `Send` on native targets, nothing in the browser.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSend: Send {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send> MaybeSend for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSend {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSend for T {}

/// Spawn a detached task.
///
/// Natively this must be called from within a tokio runtime.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(future);
}

#[cfg(target_arch = "wasm32")]
pub fn spawn<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
    let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
    gloo_timers::future::TimeoutFuture::new(millis).await;
}

/// Run `f` once after `delay` unless the returned handle is aborted first.
pub fn spawn_delayed<F>(delay: Duration, f: F) -> AbortHandle
where
    F: FnOnce() + MaybeSend + 'static,
{
    let (task, handle) = abortable(async move {
        sleep(delay).await;
        f();
    });
    spawn(async move {
        let _ = task.await;
    });
    handle
}
