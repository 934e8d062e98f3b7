//! Native WebSocket socket (tokio-tungstenite)
//!
//! The socket is driven by a spawned task that owns the stream. Outbound
//! frames reach it through an unbounded channel; lifecycle and inbound
//! frames are reported back as [`SocketEvent`]s.

use futures_util::{SinkExt, StreamExt};
use tether_ports::{CapabilityError, CapabilityResult, RawSocket, SocketEvent, SocketHandle};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, trace, warn};

enum Outbound {
    Text(String),
    Close,
}

/// Handle to a socket task
struct WsSocket {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl RawSocket for WsSocket {
    fn send(&self, text: &str) -> CapabilityResult<()> {
        self.outbound
            .send(Outbound::Text(text.to_string()))
            .map_err(|_| CapabilityError::Socket("socket task has stopped".to_string()))
    }

    fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Start connecting to `url`; the returned handle is usable immediately
pub(super) fn connect(url: &str) -> CapabilityResult<SocketHandle> {
    let runtime = Handle::try_current().map_err(|e| CapabilityError::Socket(e.to_string()))?;
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    runtime.spawn(drive(url.to_string(), outbound_rx, event_tx));

    Ok(SocketHandle::new(
        Box::new(WsSocket {
            outbound: outbound_tx,
        }),
        event_rx,
    ))
}

async fn drive(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    let connecting = connect_async(url.as_str());
    tokio::pin!(connecting);

    let stream = loop {
        tokio::select! {
            connected = &mut connecting => match connected {
                Ok((stream, _)) => break stream,
                Err(e) => {
                    warn!(%url, error = %e, "websocket handshake failed");
                    let _ = events.send(SocketEvent::Failed(e.to_string()));
                    return;
                }
            },
            command = outbound.recv() => match command {
                Some(Outbound::Text(_)) => warn!(%url, "dropping frame queued before handshake"),
                Some(Outbound::Close) | None => {
                    debug!(%url, "closed before handshake completed");
                    let _ = events.send(SocketEvent::Closed);
                    return;
                }
            },
        }
    };

    debug!(%url, "websocket open");
    let _ = events.send(SocketEvent::Opened);
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                        let _ = events.send(SocketEvent::Failed(e.to_string()));
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = write.close().await {
                        trace!(error = %e, "close handshake did not complete");
                    }
                    let _ = events.send(SocketEvent::Closed);
                    return;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = events.send(SocketEvent::Message(text.to_string()));
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    let _ = events.send(SocketEvent::Message(
                        String::from_utf8_lossy(&data).into_owned(),
                    ));
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    debug!(%url, "websocket closed by peer");
                    let _ = events.send(SocketEvent::Closed);
                    return;
                }
                Some(Ok(_)) => {
                    // Ping/pong are answered by tungstenite itself
                }
                Some(Err(e)) => {
                    let _ = events.send(SocketEvent::Failed(e.to_string()));
                    return;
                }
            },
        }
    }
}
