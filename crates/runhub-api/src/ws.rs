//! WebSocket transport for interactive sessions.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use runhub_core::{SessionTransport, TransportError};
use runhub_protocol::{CloseCode, ServerMessage};

/// Adapts an upgraded axum [`WebSocket`] to a [`SessionTransport`].
pub struct WebSocketTransport {
    socket: WebSocket,
}

impl WebSocketTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl SessionTransport for WebSocketTransport {
    async fn recv(&mut self) -> Option<String> {
        loop {
            match self.socket.recv().await? {
                Ok(Message::Text(text)) => return Some(text.as_str().to_string()),
                Ok(Message::Binary(bytes)) => {
                    return Some(String::from_utf8_lossy(&bytes).into_owned())
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(_)) => return None,
                Err(e) => {
                    log::debug!("WebSocket receive failed: {}", e);
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, message: &ServerMessage) -> Result<(), TransportError> {
        let text = message.to_json()?;
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Other(e.to_string()))
    }

    async fn close(&mut self, code: CloseCode) {
        let frame = CloseFrame {
            code: code.code(),
            reason: Utf8Bytes::from_static(code.reason()),
        };
        if let Err(e) = self.socket.send(Message::Close(Some(frame))).await {
            log::debug!("Failed to send close frame {}: {}", code.code(), e);
        }
    }
}
