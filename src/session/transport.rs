//! Client transports
//!
//! A session only needs to receive text messages, send clauses and close the
//! connection. Putting that behind a trait keeps the session loop independent
//! of the WebSocket stack.

use axum::extract::ws::{Message, WebSocket};
use tracing::debug;

use crate::relay::Clause;

/// Error type for transport operations
#[derive(Debug)]
pub enum TransportError {
    /// The WebSocket connection failed
    WebSocket(axum::Error),
    /// A clause could not be encoded
    Encode(serde_json::Error),
    /// The connection is already closed
    Closed,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            TransportError::Encode(e) => write!(f, "Failed to encode clause: {}", e),
            TransportError::Closed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<axum::Error> for TransportError {
    fn from(e: axum::Error) -> Self {
        TransportError::WebSocket(e)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Encode(e)
    }
}

/// A connection to one client
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Wait for the next inbound text message; None once the client is gone
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Send one clause to the client
    async fn send(&mut self, clause: &Clause) -> Result<(), TransportError>;

    /// Close the connection (best effort)
    async fn close(&mut self);
}

/// Transport over an axum WebSocket
pub struct WebSocketTransport {
    socket: WebSocket,
}

impl WebSocketTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.socket.recv().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Client sent close frame");
                    return None;
                }
                // Control frames are answered by axum; binary frames aren't part of the protocol
                Ok(Message::Binary(_)) | Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn send(&mut self, clause: &Clause) -> Result<(), TransportError> {
        let payload = serde_json::to_string(clause)?;
        self.socket.send(Message::Text(payload)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.send(Message::Close(None)).await {
            debug!(error = %e, "Close frame not delivered");
        }
    }
}
