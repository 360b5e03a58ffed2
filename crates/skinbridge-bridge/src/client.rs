//! Reconnecting WebSocket client.

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use skinbridge_protocol::{
    encode_outbound, parse_inbound, InboundMessage, OutboundMessage, Outbox, CONNECT_TIMEOUT_MS,
    DEFAULT_BRIDGE_URL, RECONNECT_DELAY_MS,
};

use crate::error::{BridgeError, Result};
use crate::queue::{ChannelState, OutboundQueue};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bridge connection configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Controller endpoint (`ws://` or `wss://`).
    pub url: String,
    /// Wait between a close/failure and the next connect attempt.
    pub reconnect_delay: Duration,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BRIDGE_URL.to_string(),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
        }
    }
}

/// Cheap, cloneable sending side of the bridge.
#[derive(Clone)]
pub struct BridgeHandle {
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    state_rx: watch::Receiver<ChannelState>,
}

impl BridgeHandle {
    /// Hand a message to the bridge task. It is written immediately when the
    /// channel is open and queued otherwise; order is preserved either way.
    pub fn submit(&self, message: OutboundMessage) -> Result<()> {
        self.outbound_tx
            .send(message)
            .map_err(|_| BridgeError::Closed)
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    /// Subscribe to channel state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }
}

impl Outbox for BridgeHandle {
    fn send(&mut self, message: OutboundMessage) {
        if self.submit(message).is_err() {
            debug!("bridge task stopped; dropping outbound message");
        }
    }
}

/// The task side of the bridge. Owns the channel state and the outbound
/// queue; run it with [`BridgeClient::run`].
pub struct BridgeClient {
    config: BridgeConfig,
    url: Url,
    queue: OutboundQueue,
    outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    state_tx: watch::Sender<ChannelState>,
}

enum SessionEnd {
    /// Connection lost; reconnect.
    Closed,
    /// Every handle or the inbound receiver is gone; stop.
    Shutdown,
}

/// Build a bridge: the client task, a handle for sending, and the receiver of
/// parsed inbound messages in arrival order.
pub fn bridge(
    config: BridgeConfig,
) -> Result<(BridgeClient, BridgeHandle, mpsc::UnboundedReceiver<InboundMessage>)> {
    let url = Url::parse(&config.url)?;
    if url.scheme() != "ws" && url.scheme() != "wss" {
        return Err(BridgeError::InvalidUrl(format!(
            "URL must use ws:// or wss:// scheme, got: {}",
            url.scheme()
        )));
    }

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ChannelState::Closed);

    let client = BridgeClient {
        config,
        url,
        queue: OutboundQueue::new(),
        outbound_rx,
        inbound_tx,
        state_tx,
    };
    let handle = BridgeHandle {
        outbound_tx,
        state_rx,
    };

    Ok((client, handle, inbound_rx))
}

impl BridgeClient {
    /// Keep the channel connected until every handle and the inbound
    /// receiver have been dropped. Connection failures never end the loop.
    pub async fn run(mut self) {
        loop {
            if self.inbound_tx.is_closed() {
                break;
            }

            self.set_state(ChannelState::Connecting);
            match self.connect().await {
                Ok(Some(stream)) => {
                    info!(url = %self.url, "Bridge connected");
                    if let SessionEnd::Shutdown = self.session(stream).await {
                        break;
                    }
                    info!(url = %self.url, "Bridge closed, reconnecting");
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Bridge connect failed");
                }
            }

            self.set_state(ChannelState::Closed);
            if !self.idle().await {
                break;
            }
        }

        self.set_state(ChannelState::Closed);
        debug!(queued = self.queue.len(), "Bridge task stopped");
    }

    fn set_state(&self, state: ChannelState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Bridge state changed");
        }
    }

    fn enqueue(&mut self, message: &OutboundMessage) {
        if let Some(text) = encode(message) {
            self.queue.push(text);
        }
    }

    /// One connect attempt. Outbound messages keep being queued while it is
    /// in flight. `Ok(None)` means the bridge is shutting down.
    async fn connect(&mut self) -> Result<Option<WsStream>> {
        let connect_timeout = self.config.connect_timeout;
        let connect = timeout(connect_timeout, connect_async(self.url.to_string()));
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    let (stream, _response) = result
                        .map_err(|_| BridgeError::Timeout(connect_timeout))?
                        .map_err(|e| BridgeError::WebSocket(e.to_string()))?;
                    return Ok(Some(stream));
                }
                outbound = self.outbound_rx.recv() => match outbound {
                    Some(message) => self.enqueue(&message),
                    None => return Ok(None),
                },
            }
        }
    }

    /// Wait out the reconnect delay, still accepting outbound messages.
    /// Returns false when the bridge should stop.
    async fn idle(&mut self) -> bool {
        let delay = tokio::time::sleep(self.config.reconnect_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = &mut delay => return true,
                outbound = self.outbound_rx.recv() => match outbound {
                    Some(message) => self.enqueue(&message),
                    None => return false,
                },
            }
        }
    }

    async fn session(&mut self, stream: WsStream) -> SessionEnd {
        let (mut writer, mut reader) = stream.split();
        self.set_state(ChannelState::Open);

        if !flush_backlog(&mut writer, &mut self.queue).await {
            return SessionEnd::Closed;
        }

        loop {
            tokio::select! {
                frame = reader.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !self.dispatch(text.as_str()) {
                            return SessionEnd::Shutdown;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Closed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Bridge read error");
                        return SessionEnd::Closed;
                    }
                },
                outbound = self.outbound_rx.recv() => match outbound {
                    Some(message) => {
                        if let Some(text) = encode(&message) {
                            if let Err(e) = writer.send(Message::Text(text.clone().into())).await {
                                warn!(error = %e, "Bridge write failed, queueing for next connection");
                                self.queue.push(text);
                                return SessionEnd::Closed;
                            }
                        }
                    }
                    None => {
                        let _ = writer.send(Message::Close(None)).await;
                        return SessionEnd::Shutdown;
                    }
                },
            }
        }
    }

    /// Deliver one inbound frame. Returns false once nobody is listening.
    fn dispatch(&self, text: &str) -> bool {
        match parse_inbound(text) {
            Ok(Some(message)) => self.inbound_tx.send(message).is_ok(),
            Ok(None) => {
                debug!("Ignoring bridge message of unknown kind");
                true
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed bridge message");
                true
            }
        }
    }
}

/// Write exactly what was queued before the transition to open, in order.
/// On the first failed write the unsent remainder goes back to the front of
/// the queue and `false` is returned.
async fn flush_backlog<S>(writer: &mut S, queue: &mut OutboundQueue) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let backlog = queue.take_snapshot();
    if !backlog.is_empty() {
        debug!(count = backlog.len(), "Flushing queued bridge messages");
    }
    let mut backlog = backlog.into_iter();
    while let Some(text) = backlog.next() {
        if let Err(e) = writer.send(Message::Text(text.clone().into())).await {
            warn!(error = %e, "Bridge flush interrupted");
            let mut unsent = vec![text];
            unsent.extend(backlog);
            queue.restore_front(unsent);
            return false;
        }
    }
    true
}

fn encode(message: &OutboundMessage) -> Option<String> {
    match encode_outbound(message) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(kind = message.kind(), error = %e, "Failed to encode bridge message");
            None
        }
    }
}
