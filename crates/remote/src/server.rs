// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Accepts initiator connections, registers each one, and routes messages:
//! - `identify` records the peer's source tag and is answered in kind
//! - `ping` is answered with a unicast `pong`
//! - everything else is applied locally and relayed to the other connections
//!
//! Unparseable frames are logged and dropped; they never close a connection.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use pk_core::{Envelope, MessageKind, Role};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::registry::ConnectionId;
use crate::state::ServerState;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Accepts connections until the listener fails.
pub async fn run(listener: TcpListener, state: ServerState) -> Result<(), ServerError> {
    info!("Listening on: {}", listener.local_addr()?);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), ServerError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (id, mut outgoing) = state.registry().register();
    info!(%id, %peer_addr, "connection opened");

    let result = pump(ws, id, &mut outgoing, &state).await;

    state.registry().remove(id);
    info!(%id, %peer_addr, "connection closed");
    result
}

async fn pump(
    ws: WebSocketStream<TcpStream>,
    id: ConnectionId,
    outgoing: &mut mpsc::UnboundedReceiver<Envelope>,
    state: &ServerState,
) -> Result<(), ServerError> {
    let (mut ws_sink, mut ws_stream) = ws.split();

    loop {
        tokio::select! {
            msg = ws_stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_text(&text, id, state).await {
                        ws_sink.send(Message::Text(reply.to_json()?.into())).await?;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    ws_sink.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%id, error = %e, "websocket error");
                    break;
                }
            },

            envelope = outgoing.recv() => match envelope {
                Some(envelope) => {
                    if let Err(e) = ws_sink.send(Message::Text(envelope.to_json()?.into())).await {
                        warn!(%id, error = %e, "failed to send");
                        break;
                    }
                }
                None => break,
            },
        }
    }
    Ok(())
}

/// Processes one text frame and returns the direct reply, if any.
pub(crate) async fn handle_text(
    text: &str,
    id: ConnectionId,
    state: &ServerState,
) -> Option<Envelope> {
    let msg = match Envelope::from_json(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(%id, error = %e, "dropping malformed message");
            return None;
        }
    };

    match msg.message_kind() {
        MessageKind::Identify => {
            info!(%id, source = %msg.source, "peer identified");
            state.registry().identify(id, &msg.source);
            Some(Envelope::identify(state.source(), Role::Acceptor))
        }
        MessageKind::Ping => Some(Envelope::pong(state.source(), msg.probe_id().unwrap_or(0))),
        MessageKind::Pong => {
            debug!(%id, "pong");
            None
        }
        MessageKind::Event(_) | MessageKind::Unknown(_) => {
            state.relay(id, msg).await;
            None
        }
    }
}
