//! Message transport over an environment-bound socket
//!
//! ```text
//!   Connecting ──Opened──► Open ──close/remote close/error──► Closed
//!        │                                                     ▲
//!        └──────── close/error/deadline (pending: Handshake) ───┘
//! ```
//!
//! Inbound frames and the close notification both go through one
//! [`Scheduler`], one per turn, so the close notification never overtakes
//! a frame that arrived before it.

use crate::config::TransportConfig;
use crate::error::TransportError;
use futures_util::future::{self, LocalBoxFuture};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tether_core::Capability;
use tether_events::{Dispatcher, Listener, Scheduler, listener};
use tether_ports::{Capabilities, RawSocket, SocketEvent, SocketHandle};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

const MESSAGE_EVENT: &str = "message";
const CLOSE_EVENT: &str = "close";

/// Connection lifecycle; `Closed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Payload carried by the internal hook dispatcher
#[derive(Debug, Clone)]
enum Hook {
    Message(String),
    Close,
}

/// A send issued while Connecting
struct PendingSend {
    message: String,
    settle: oneshot::Sender<Result<(), TransportError>>,
}

struct Shared {
    url: String,
    state: Cell<ConnectionState>,
    socket: Box<dyn RawSocket>,
    pending: RefCell<Vec<PendingSend>>,
    hooks: Dispatcher<Hook>,
    message_hook: RefCell<Option<Listener<Hook>>>,
    close_hook: RefCell<Option<Listener<Hook>>>,
    scheduler: Scheduler,
}

impl Shared {
    fn transmit(&self, message: &str) -> Result<(), TransportError> {
        self.socket.send(message)?;
        trace!(url = %self.url, bytes = message.len(), "frame sent");
        Ok(())
    }

    fn open(&self) {
        if self.state.get() != ConnectionState::Connecting {
            return;
        }
        self.state.set(ConnectionState::Open);
        let pending = self.pending.take();
        debug!(url = %self.url, flushed = pending.len(), "connection open");
        for send in pending {
            let _ = send.settle.send(self.transmit(&send.message));
        }
    }

    fn deliver(&self, text: String) {
        let hooks = self.hooks.clone();
        self.scheduler.defer(move || {
            hooks.emit(MESSAGE_EVENT, Hook::Message(text));
        });
    }

    fn shutdown(&self, cause: &str) {
        if !self.teardown(cause) {
            return;
        }
        let hooks = self.hooks.clone();
        self.scheduler.defer(move || {
            hooks.emit(CLOSE_EVENT, Hook::Close);
        });
    }

    /// Enter Closed without notifying; returns whether this call closed it
    fn teardown(&self, cause: &str) -> bool {
        let previous = self.state.replace(ConnectionState::Closed);
        if previous == ConnectionState::Closed {
            return false;
        }
        debug!(url = %self.url, ?previous, cause, "connection closed");
        self.socket.close();

        let pending = self.pending.take();
        if !pending.is_empty() {
            debug!(
                url = %self.url,
                rejected = pending.len(),
                "rejecting sends queued before the handshake"
            );
        }
        for send in pending {
            let _ = send.settle.send(Err(TransportError::Handshake));
        }
        true
    }

    fn replace_hook(
        &self,
        slot: &RefCell<Option<Listener<Hook>>>,
        event: &str,
        hook: Listener<Hook>,
        once: bool,
    ) {
        if let Some(previous) = slot.replace(Some(Rc::clone(&hook))) {
            self.hooks.remove_listener(event, &previous);
        }
        if once {
            self.hooks.once(event, &hook);
        } else {
            self.hooks.on(event, &hook);
        }
    }
}

/// Persistent, message-oriented connection to one endpoint
///
/// There is no reconnection: once Closed, build a new transport. Dropping
/// the transport closes the socket and rejects pending sends without a
/// close notification.
pub struct MessageTransport {
    inner: Rc<Shared>,
}

impl MessageTransport {
    /// Open a socket to `config.url` through `runtime`
    pub fn connect(
        runtime: &Rc<dyn Capabilities>,
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        config.validate()?;
        runtime.require(Capability::RawSocket)?;
        let handle = runtime.connect_socket(&config.url)?;
        Ok(Self::new(handle, runtime, config))
    }

    /// Wrap an already constructed socket
    pub fn new(
        handle: SocketHandle,
        runtime: &Rc<dyn Capabilities>,
        config: &TransportConfig,
    ) -> Self {
        let SocketHandle { socket, events } = handle;
        let inner = Rc::new(Shared {
            url: config.url.clone(),
            state: Cell::new(ConnectionState::Connecting),
            socket,
            pending: RefCell::new(Vec::new()),
            hooks: Dispatcher::new(),
            message_hook: RefCell::new(None),
            close_hook: RefCell::new(None),
            scheduler: Scheduler::new(runtime.turn_driver()),
        });
        debug!(url = %inner.url, environment = %runtime.environment(), "connecting");

        runtime.spawn_local(Box::pin(pump(Rc::downgrade(&inner), events)));

        if let Some(timeout) = config.connect_timeout() {
            let deadline = runtime.sleep(timeout);
            let weak = Rc::downgrade(&inner);
            runtime.spawn_local(Box::pin(async move {
                deadline.await;
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                if shared.state.get() == ConnectionState::Connecting {
                    warn!(url = %shared.url, ?timeout, "handshake deadline elapsed");
                    shared.shutdown("connect timeout");
                }
            }));
        }

        Self { inner }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Send one text frame
    ///
    /// The state is checked when `send` is called. While Connecting the frame
    /// is held and the returned future settles when the connection opens
    /// (frame transmitted) or closes first (`Handshake`).
    pub fn send(
        &self,
        message: impl Into<String>,
    ) -> LocalBoxFuture<'static, Result<(), TransportError>> {
        let message = message.into();
        match self.inner.state.get() {
            ConnectionState::Open => Box::pin(future::ready(self.inner.transmit(&message))),
            ConnectionState::Closed => Box::pin(future::ready(Err(TransportError::Closed))),
            ConnectionState::Connecting => {
                let (settle, settled) = oneshot::channel();
                self.inner
                    .pending
                    .borrow_mut()
                    .push(PendingSend { message, settle });
                Box::pin(async move { settled.await.unwrap_or(Err(TransportError::Closed)) })
            }
        }
    }

    /// Set the inbound frame callback, replacing any previous one
    pub fn on_message(&self, callback: impl Fn(&str) + 'static) {
        let hook = listener(move |hook: &Hook| {
            if let Hook::Message(text) = hook {
                callback(text);
            }
        });
        self.inner
            .replace_hook(&self.inner.message_hook, MESSAGE_EVENT, hook, false);
    }

    /// Set the close callback, replacing any previous one; fires at most once
    pub fn on_close(&self, callback: impl FnOnce() + 'static) {
        let callback = Cell::new(Some(callback));
        let hook = listener(move |hook: &Hook| {
            if let Hook::Close = hook {
                if let Some(callback) = callback.take() {
                    callback();
                }
            }
        });
        self.inner
            .replace_hook(&self.inner.close_hook, CLOSE_EVENT, hook, true);
    }

    /// Close the connection; further calls are no-ops
    pub fn close(&self) {
        self.inner.shutdown("closed locally");
    }
}

impl Drop for MessageTransport {
    // No close notification: the owner is gone, and dropping may happen
    // outside the loop that runs turns
    fn drop(&mut self) {
        self.inner.teardown("transport dropped");
    }
}

impl fmt::Debug for MessageTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageTransport")
            .field("url", &self.inner.url)
            .field("state", &self.inner.state.get())
            .field("pending", &self.inner.pending.borrow().len())
            .finish()
    }
}

/// Feed socket events into the state machine until the connection closes
async fn pump(shared: Weak<Shared>, mut events: mpsc::UnboundedReceiver<SocketEvent>) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        match event {
            SocketEvent::Opened => shared.open(),
            SocketEvent::Message(text) => shared.deliver(text),
            SocketEvent::Closed => shared.shutdown("remote close"),
            SocketEvent::Failed(reason) => {
                debug!(url = %shared.url, %reason, "socket error");
                shared.shutdown("socket error");
            }
        }
        if shared.state.get() == ConnectionState::Closed {
            return;
        }
    }
    if let Some(shared) = shared.upgrade() {
        shared.shutdown("socket event stream ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;
    use tether_core::{ByteBuffer, Environment};
    use tether_events::ManualTurns;
    use tether_platform::HostCapabilities;
    use tether_ports::{CapabilityError, CapabilityResult, TurnDriver};
    use tokio::task::LocalSet;

    /// Tokio local tasks with manually driven turns
    struct TestRuntime {
        turns: Rc<ManualTurns>,
    }

    #[async_trait(?Send)]
    impl Capabilities for TestRuntime {
        fn environment(&self) -> Environment {
            Environment::Host
        }

        fn supports(&self, _capability: Capability) -> bool {
            true
        }

        async fn read_file(&self, _path: &Path) -> CapabilityResult<ByteBuffer> {
            Err(CapabilityError::unsupported(Capability::FileAccess))
        }

        async fn write_file(&self, _path: &Path, _contents: &ByteBuffer) -> CapabilityResult<()> {
            Err(CapabilityError::unsupported(Capability::FileAccess))
        }

        fn connect_socket(&self, _url: &str) -> CapabilityResult<SocketHandle> {
            Err(CapabilityError::Socket("no sockets in tests".to_string()))
        }

        fn turn_driver(&self) -> Rc<dyn TurnDriver> {
            self.turns.clone()
        }

        fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
            tokio::task::spawn_local(task);
        }

        fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
            Box::pin(tokio::time::sleep(duration))
        }
    }

    #[derive(Default)]
    struct MockSocket {
        sent: Rc<RefCell<Vec<String>>>,
        closes: Rc<Cell<u32>>,
    }

    impl RawSocket for MockSocket {
        fn send(&self, text: &str) -> CapabilityResult<()> {
            self.sent.borrow_mut().push(text.to_string());
            Ok(())
        }

        fn close(&self) {
            self.closes.set(self.closes.get() + 1);
        }
    }

    struct Harness {
        transport: MessageTransport,
        turns: Rc<ManualTurns>,
        events: mpsc::UnboundedSender<SocketEvent>,
        sent: Rc<RefCell<Vec<String>>>,
        closes: Rc<Cell<u32>>,
    }

    fn harness(config: TransportConfig) -> Harness {
        let turns = Rc::new(ManualTurns::new());
        let runtime: Rc<dyn Capabilities> = Rc::new(TestRuntime {
            turns: Rc::clone(&turns),
        });
        let socket = MockSocket::default();
        let sent = Rc::clone(&socket.sent);
        let closes = Rc::clone(&socket.closes);
        let (events, rx) = mpsc::unbounded_channel();
        let handle = SocketHandle::new(Box::new(socket), rx);
        let transport = MessageTransport::new(handle, &runtime, &config);
        Harness {
            transport,
            turns,
            events,
            sent,
            closes,
        }
    }

    fn config() -> TransportConfig {
        TransportConfig::new("ws://127.0.0.1:9000")
    }

    /// Let the event pump catch up
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_pending_sends_flush_in_order_on_open() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                assert_eq!(h.transport.state(), ConnectionState::Connecting);

                let a = h.transport.send("a");
                let b = h.transport.send("b");
                assert!(h.sent.borrow().is_empty());

                h.events.send(SocketEvent::Opened).unwrap();
                settle().await;
                assert_eq!(h.transport.state(), ConnectionState::Open);

                let c = h.transport.send("c");
                assert_eq!(*h.sent.borrow(), vec!["a", "b", "c"]);
                assert_eq!(a.await, Ok(()));
                assert_eq!(b.await, Ok(()));
                assert_eq!(c.await, Ok(()));
            })
            .await;
    }

    #[tokio::test]
    async fn test_handshake_failure_rejects_pending() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                let a = h.transport.send("a");
                let b = h.transport.send("b");

                h.events
                    .send(SocketEvent::Failed("connection refused".to_string()))
                    .unwrap();
                settle().await;

                assert_eq!(h.transport.state(), ConnectionState::Closed);
                assert_eq!(a.await, Err(TransportError::Handshake));
                assert_eq!(b.await, Err(TransportError::Handshake));
                assert!(h.sent.borrow().is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn test_send_after_close_fails_immediately() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                h.events.send(SocketEvent::Opened).unwrap();
                settle().await;

                h.transport.close();
                assert_eq!(h.transport.send("late").await, Err(TransportError::Closed));
                assert!(h.sent.borrow().is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn test_close_while_connecting_rejects_pending() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                let a = h.transport.send("a");
                h.transport.close();
                assert_eq!(a.await, Err(TransportError::Handshake));

                // A late handshake does not reopen
                h.events.send(SocketEvent::Opened).unwrap();
                settle().await;
                assert_eq!(h.transport.state(), ConnectionState::Closed);
            })
            .await;
    }

    #[tokio::test]
    async fn test_close_notifies_once() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                let fired = Rc::new(Cell::new(0));
                let counter = Rc::clone(&fired);
                h.transport.on_close(move || counter.set(counter.get() + 1));

                h.events.send(SocketEvent::Opened).unwrap();
                h.events.send(SocketEvent::Closed).unwrap();
                settle().await;
                h.transport.close();
                h.transport.close();

                h.turns.run_until_idle();
                assert_eq!(fired.get(), 1);
                assert_eq!(h.closes.get(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_close_notification_is_deferred() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                let fired = Rc::new(Cell::new(false));
                let flag = Rc::clone(&fired);
                h.transport.on_close(move || flag.set(true));

                h.transport.close();
                assert!(!fired.get());
                assert!(h.turns.run_turn());
                assert!(fired.get());
            })
            .await;
    }

    #[tokio::test]
    async fn test_on_close_replaces_previous_callback() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                let log: Rc<RefCell<Vec<&str>>> = Rc::default();
                let first = Rc::clone(&log);
                h.transport.on_close(move || first.borrow_mut().push("first"));
                let second = Rc::clone(&log);
                h.transport.on_close(move || second.borrow_mut().push("second"));

                h.transport.close();
                h.turns.run_until_idle();
                assert_eq!(*log.borrow(), vec!["second"]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_messages_delivered_one_per_turn() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                let received: Rc<RefCell<Vec<String>>> = Rc::default();
                let sink = Rc::clone(&received);
                h.transport
                    .on_message(move |text| sink.borrow_mut().push(text.to_string()));

                h.events.send(SocketEvent::Opened).unwrap();
                h.events.send(SocketEvent::Message("1".to_string())).unwrap();
                h.events.send(SocketEvent::Message("2".to_string())).unwrap();
                settle().await;
                assert!(received.borrow().is_empty());

                assert!(h.turns.run_turn());
                assert_eq!(*received.borrow(), vec!["1"]);
                assert!(h.turns.run_turn());
                assert_eq!(*received.borrow(), vec!["1", "2"]);
                assert!(!h.turns.run_turn());
            })
            .await;
    }

    #[tokio::test]
    async fn test_remote_close_after_frames() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                let log: Rc<RefCell<Vec<String>>> = Rc::default();
                let messages = Rc::clone(&log);
                h.transport
                    .on_message(move |text| messages.borrow_mut().push(text.to_string()));
                let closes = Rc::clone(&log);
                h.transport
                    .on_close(move || closes.borrow_mut().push("closed".to_string()));

                h.events.send(SocketEvent::Opened).unwrap();
                h.events.send(SocketEvent::Message("x".to_string())).unwrap();
                h.events.send(SocketEvent::Message("y".to_string())).unwrap();
                h.events.send(SocketEvent::Closed).unwrap();
                settle().await;

                h.turns.run_until_idle();
                assert_eq!(*log.borrow(), vec!["x", "y", "closed"]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_on_message_replaces_previous_callback() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                let log: Rc<RefCell<Vec<String>>> = Rc::default();
                let first = Rc::clone(&log);
                h.transport
                    .on_message(move |text| first.borrow_mut().push(format!("first:{text}")));
                let second = Rc::clone(&log);
                h.transport
                    .on_message(move |text| second.borrow_mut().push(format!("second:{text}")));

                h.events.send(SocketEvent::Opened).unwrap();
                h.events.send(SocketEvent::Message("m".to_string())).unwrap();
                settle().await;
                h.turns.run_until_idle();
                assert_eq!(*log.borrow(), vec!["second:m"]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_message_callback_can_reply() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                let transport = Rc::new(h.transport);
                let replier = Rc::downgrade(&transport);
                transport.on_message(move |text| {
                    if let Some(transport) = replier.upgrade() {
                        drop(transport.send(format!("ack:{text}")));
                    }
                });

                h.events.send(SocketEvent::Opened).unwrap();
                h.events.send(SocketEvent::Message("7".to_string())).unwrap();
                settle().await;
                h.turns.run_until_idle();
                assert_eq!(*h.sent.borrow(), vec!["ack:7"]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_drop_closes_socket() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                let fired = Rc::new(Cell::new(false));
                let flag = Rc::clone(&fired);
                h.transport.on_close(move || flag.set(true));
                let pending = h.transport.send("a");
                let closes = Rc::clone(&h.closes);
                let turns = Rc::clone(&h.turns);

                drop(h);
                assert_eq!(closes.get(), 1);
                assert_eq!(pending.await, Err(TransportError::Handshake));
                assert_eq!(turns.run_until_idle(), 0);
                assert!(!fired.get());
            })
            .await;
    }

    #[tokio::test]
    async fn test_drop_outside_local_set() {
        let socket = MockSocket::default();
        let closes = Rc::clone(&socket.closes);
        let (events, rx) = mpsc::unbounded_channel();

        // Host turns spawn local tasks, which only works inside a LocalSet
        let transport = LocalSet::new()
            .run_until(async move {
                let runtime: Rc<dyn Capabilities> = Rc::new(HostCapabilities::new());
                let handle = SocketHandle::new(Box::new(socket), rx);
                MessageTransport::new(handle, &runtime, &config())
            })
            .await;

        assert_eq!(transport.state(), ConnectionState::Connecting);
        drop(transport);
        assert_eq!(closes.get(), 1);
        drop(events);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_deadline_leaves_send_pending() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config());
                let outcome =
                    tokio::time::timeout(Duration::from_secs(3_600), h.transport.send("a")).await;
                assert!(outcome.is_err());
                assert_eq!(h.transport.state(), ConnectionState::Connecting);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_deadline_rejects_pending() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config().with_connect_timeout(Duration::from_millis(100)));
                let fired = Rc::new(Cell::new(false));
                let flag = Rc::clone(&fired);
                h.transport.on_close(move || flag.set(true));

                let outcome = h.transport.send("a").await;
                assert_eq!(outcome, Err(TransportError::Handshake));
                assert_eq!(h.transport.state(), ConnectionState::Closed);

                h.turns.run_until_idle();
                assert!(fired.get());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_ignored_once_open() {
        LocalSet::new()
            .run_until(async {
                let h = harness(config().with_connect_timeout(Duration::from_millis(100)));
                h.events.send(SocketEvent::Opened).unwrap();
                settle().await;

                tokio::time::sleep(Duration::from_millis(500)).await;
                assert_eq!(h.transport.state(), ConnectionState::Open);
                assert_eq!(h.transport.send("ok").await, Ok(()));
            })
            .await;
    }
}
