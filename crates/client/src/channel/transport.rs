// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the realtime channel.
//!
//! The initiator talks to a [`Transport`] so the reconnect and heartbeat
//! logic can be driven by a scripted mock in tests.

use std::future::Future;
use std::pin::Pin;

use pk_core::Envelope;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// WebSocket-like, message-oriented connection.
pub trait Transport: Send + Sync {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()>;

    fn disconnect(&mut self) -> TransportFuture<'_, ()>;

    fn send(&mut self, msg: Envelope) -> TransportFuture<'_, ()>;

    /// Receives the next envelope.
    ///
    /// Returns `None` once the peer closes the connection.
    fn recv(&mut self) -> TransportFuture<'_, Option<Envelope>>;

    fn is_connected(&self) -> bool;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct WebSocketConnection {
    sink: futures_util::stream::SplitSink<WsStream, tokio_tungstenite::tungstenite::Message>,
    stream: futures_util::stream::SplitStream<WsStream>,
}

/// Transport over tokio-tungstenite.
#[derive(Default)]
pub struct WebSocketTransport {
    ws: Option<WebSocketConnection>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        WebSocketTransport { ws: None }
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()> {
        let url = url.to_string();
        Box::pin(async move {
            use futures_util::StreamExt;

            let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            let (sink, stream) = ws_stream.split();
            self.ws = Some(WebSocketConnection { sink, stream });
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if let Some(mut ws) = self.ws.take() {
                use futures_util::SinkExt;
                // Peer may already be gone.
                let _ = ws.sink.close().await;
            }
            Ok(())
        })
    }

    fn send(&mut self, msg: Envelope) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            use futures_util::SinkExt;
            use tokio_tungstenite::tungstenite::Message;

            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;

            let json = msg
                .to_json()
                .map_err(|e| TransportError::SerializationError(e.to_string()))?;

            if let Err(e) = ws.sink.send(Message::Text(json.into())).await {
                self.ws = None;
                return Err(TransportError::SendFailed(e.to_string()));
            }
            if let Err(e) = ws.sink.flush().await {
                self.ws = None;
                return Err(TransportError::SendFailed(e.to_string()));
            }
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<Envelope>> {
        Box::pin(async move {
            use futures_util::StreamExt;
            use tokio_tungstenite::tungstenite::Message;

            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;

            loop {
                match ws.stream.next().await {
                    Some(Ok(Message::Text(text))) => match Envelope::from_json(&text) {
                        Ok(msg) => return Ok(Some(msg)),
                        Err(e) => {
                            // One bad frame does not end the connection.
                            tracing::warn!(error = %e, "dropping malformed message");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        self.ws = None;
                        return Ok(None);
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        self.ws = None;
                        return Err(TransportError::ReceiveFailed(e.to_string()));
                    }
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.ws.is_some()
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
