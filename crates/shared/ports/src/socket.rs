use crate::error::CapabilityResult;
use tokio::sync::mpsc;

/// Lifecycle and data events reported by a raw socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Handshake completed
    Opened,
    /// One inbound text frame
    Message(String),
    /// Orderly close, local or remote
    Closed,
    /// Socket-level failure; the socket is unusable afterwards
    Failed(String),
}

/// Outbound half of an environment-specific socket
///
/// Calls never block: `send` hands the frame to the socket's own writer.
pub trait RawSocket {
    fn send(&self, text: &str) -> CapabilityResult<()>;

    /// Request close; completion is reported as [`SocketEvent::Closed`]
    fn close(&self);
}

/// A freshly constructed socket plus the stream of its events
pub struct SocketHandle {
    pub socket: Box<dyn RawSocket>,
    pub events: mpsc::UnboundedReceiver<SocketEvent>,
}

impl SocketHandle {
    pub fn new(socket: Box<dyn RawSocket>, events: mpsc::UnboundedReceiver<SocketEvent>) -> Self {
        Self { socket, events }
    }
}
