//! In-memory session transport for testing

use async_trait::async_trait;
use runhub_core::{SessionTransport, TransportError};
use runhub_protocol::{ClientMessage, CloseCode, ServerMessage};
use tokio::sync::mpsc;

/// What the client side of a [`MemoryTransport`] observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Message(ServerMessage),
    Closed(CloseCode),
}

/// The server side of an in-memory connection.
pub struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<ClientEvent>,
}

/// The client side of an in-memory connection.
pub struct ClientHandle {
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: mpsc::UnboundedReceiver<ClientEvent>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, ClientHandle) {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        (
            MemoryTransport {
                inbound: server_rx,
                outbound: server_tx,
            },
            ClientHandle {
                outbound: Some(client_tx),
                inbound: client_rx,
            },
        )
    }
}

#[async_trait]
impl SessionTransport for MemoryTransport {
    async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    async fn send(&mut self, message: &ServerMessage) -> Result<(), TransportError> {
        self.outbound
            .send(ClientEvent::Message(message.clone()))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self, code: CloseCode) {
        let _ = self.outbound.send(ClientEvent::Closed(code));
    }
}

impl ClientHandle {
    pub fn send(&self, message: &ClientMessage) -> anyhow::Result<()> {
        self.send_raw(&serde_json::to_string(message)?)
    }

    /// Send a frame verbatim, e.g. one that is not valid JSON.
    pub fn send_raw(&self, text: &str) -> anyhow::Result<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("client already disconnected"))?;
        outbound
            .send(text.to_string())
            .map_err(|_| anyhow::anyhow!("server side is gone"))
    }

    /// Drop the connection without a close frame.
    pub fn disconnect(&mut self) {
        self.outbound = None;
    }

    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.inbound.recv().await
    }

    /// Messages received until the server closes or goes away, and the close code if any.
    pub async fn collect(&mut self) -> (Vec<ServerMessage>, Option<CloseCode>) {
        let mut messages = Vec::new();
        while let Some(event) = self.inbound.recv().await {
            match event {
                ClientEvent::Message(message) => messages.push(message),
                ClientEvent::Closed(code) => return (messages, Some(code)),
            }
        }
        (messages, None)
    }
}
