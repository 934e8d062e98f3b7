//! Browser bindings (wasm32)

use futures_util::future::LocalBoxFuture;
use std::time::Duration;
use tether_ports::{
    CapabilityError, CapabilityResult, RawSocket, SocketEvent, SocketHandle, TurnDriver, TurnStep,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::wasm_bindgen;
use web_sys::{BinaryType, CloseEvent, Event, MessageEvent, WebSocket};

#[wasm_bindgen]
extern "C" {
    /// `setTimeout` on the global scope, present in windows and workers alike
    #[wasm_bindgen(js_name = setTimeout, catch)]
    fn set_timeout(handler: &JsValue, timeout: i32) -> Result<JsValue, JsValue>;
}

/// Turn driver backed by `setTimeout(0)`
///
/// Promise continuations are all drained within one microtask checkpoint,
/// so each step is posted as its own macrotask instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacrotaskTurns;

impl TurnDriver for MacrotaskTurns {
    fn schedule(&self, step: TurnStep) {
        let callback = Closure::once_into_js(move || step());
        if let Err(e) = set_timeout(&callback, 0) {
            warn!(error = ?e, "setTimeout rejected a scheduled turn");
        }
    }

    fn name(&self) -> &str {
        "macrotask"
    }
}

/// Future resolving after `duration`; never resolves without a timer source
pub(super) fn sleep(duration: Duration) -> LocalBoxFuture<'static, ()> {
    let (tx, rx) = oneshot::channel::<()>();
    let callback = Closure::once_into_js(move || {
        let _ = tx.send(());
    });
    let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
    let scheduled = match set_timeout(&callback, millis) {
        Ok(_) => true,
        Err(e) => {
            warn!(error = ?e, "setTimeout rejected a sleep");
            false
        }
    };

    Box::pin(async move {
        if scheduled {
            let _ = rx.await;
        } else {
            futures_util::future::pending::<()>().await;
        }
    })
}

/// Callbacks must outlive the socket's handlers
struct Handlers {
    _onopen: Closure<dyn FnMut(Event)>,
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
    _onclose: Closure<dyn FnMut(CloseEvent)>,
    _onerror: Closure<dyn FnMut(Event)>,
}

struct BrowserSocket {
    ws: WebSocket,
    _handlers: Handlers,
}

impl RawSocket for BrowserSocket {
    fn send(&self, text: &str) -> CapabilityResult<()> {
        self.ws
            .send_with_str(text)
            .map_err(|e| CapabilityError::Socket(format!("send failed: {e:?}")))
    }

    fn close(&self) {
        if let Err(e) = self.ws.close() {
            debug!(error = ?e, "close request failed");
        }
    }
}

impl Drop for BrowserSocket {
    fn drop(&mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onclose(None);
        self.ws.set_onerror(None);
    }
}

fn frame_text(data: JsValue) -> Option<String> {
    if let Some(text) = data.as_string() {
        return Some(text);
    }
    let buffer = data.dyn_into::<js_sys::ArrayBuffer>().ok()?;
    let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

pub(super) fn connect(url: &str) -> CapabilityResult<SocketHandle> {
    let ws = WebSocket::new(url)
        .map_err(|e| CapabilityError::Socket(format!("failed to create WebSocket: {e:?}")))?;
    ws.set_binary_type(BinaryType::Arraybuffer);

    let (tx, rx) = mpsc::unbounded_channel();

    let tx_open = tx.clone();
    let onopen = Closure::wrap(Box::new(move |_: Event| {
        let _ = tx_open.send(SocketEvent::Opened);
    }) as Box<dyn FnMut(Event)>);
    ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));

    let tx_message = tx.clone();
    let onmessage = Closure::wrap(Box::new(move |e: MessageEvent| match frame_text(e.data()) {
        Some(text) => {
            let _ = tx_message.send(SocketEvent::Message(text));
        }
        None => debug!("ignoring frame of unknown type"),
    }) as Box<dyn FnMut(MessageEvent)>);
    ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));

    let tx_close = tx.clone();
    let onclose = Closure::wrap(Box::new(move |_: CloseEvent| {
        let _ = tx_close.send(SocketEvent::Closed);
    }) as Box<dyn FnMut(CloseEvent)>);
    ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));

    // The browser does not expose error details on WebSocket errors
    let tx_error = tx;
    let onerror = Closure::wrap(Box::new(move |_: Event| {
        let _ = tx_error.send(SocketEvent::Failed("websocket error".to_string()));
    }) as Box<dyn FnMut(Event)>);
    ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));

    debug!(%url, "browser websocket created");
    Ok(SocketHandle::new(
        Box::new(BrowserSocket {
            ws,
            _handlers: Handlers {
                _onopen: onopen,
                _onmessage: onmessage,
                _onclose: onclose,
                _onerror: onerror,
            },
        }),
        rx,
    ))
}
