// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test server utilities.
//!
//! Provides a TestServer that runs the real connection handler on a random
//! port against a throwaway database.

#![cfg(test)]
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::server;
use crate::state::ServerState;

/// A test server that runs on a random port and can be controlled.
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    state: ServerState,
    /// Keep the temp directory alive for the lifetime of the test server.
    _temp_dir: tempfile::TempDir,
}

impl TestServer {
    /// Start a new test server on a random available port.
    pub async fn start() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = ServerState::new(temp_dir.path(), "admin").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let state_clone = state.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = accept_loop(listener, state_clone) => {
                    if let Err(e) = result {
                        eprintln!("Test server error: {}", e);
                    }
                }
                _ = shutdown_rx => {}
            }
        });

        TestServer {
            addr,
            shutdown_tx,
            state,
            _temp_dir: temp_dir,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Accept loop that uses the actual server::handle_connection.
async fn accept_loop(
    listener: TcpListener,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            let _ = server::handle_connection(stream, peer_addr, state).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream::{SplitSink, SplitStream};
    use futures_util::{SinkExt, StreamExt};
    use pk_core::{Envelope, EventType, Role, UrlService};
    use serde_json::json;
    use tokio::net::TcpStream;
    use tokio::time::{timeout, Duration};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

    struct Client {
        sink: SplitSink<Ws, Message>,
        stream: SplitStream<Ws>,
    }

    impl Client {
        async fn connect(server: &TestServer) -> Self {
            let (ws, _) = connect_async(&server.ws_url()).await.unwrap();
            let (sink, stream) = ws.split();
            Client { sink, stream }
        }

        async fn send(&mut self, msg: Envelope) {
            self.send_raw(&msg.to_json().unwrap()).await;
        }

        async fn send_raw(&mut self, text: &str) {
            self.sink
                .send(Message::Text(text.to_string().into()))
                .await
                .unwrap();
        }

        async fn recv(&mut self) -> Envelope {
            match timeout(Duration::from_secs(5), self.stream.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => Envelope::from_json(&text).unwrap(),
                Ok(other) => panic!("Unexpected message: {:?}", other),
                Err(_) => panic!("Timeout waiting for message"),
            }
        }

        async fn expect_silence(&mut self) {
            let result = timeout(Duration::from_millis(300), self.stream.next()).await;
            assert!(result.is_err(), "Expected no message, got {:?}", result);
        }
    }

    async fn wait_for_connections(server: &TestServer, count: usize) {
        for _ in 0..100 {
            if server.state().registry().len() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} connections, have {}",
            count,
            server.state().registry().len()
        );
    }

    #[tokio::test]
    async fn test_server_starts() {
        let server = TestServer::start().await;
        assert!(server.addr().port() > 0);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let server = TestServer::start().await;
        let mut client = Client::connect(&server).await;

        client.send(Envelope::ping("desktop", 42)).await;

        let pong = client.recv().await;
        assert_eq!(pong.kind, "pong");
        assert_eq!(pong.probe_id(), Some(42));
        assert_eq!(pong.source, "admin");

        server.shutdown();
    }

    #[tokio::test]
    async fn test_identify_is_answered() {
        let server = TestServer::start().await;
        let mut client = Client::connect(&server).await;

        client
            .send(Envelope::identify("desktop", Role::Initiator))
            .await;

        let reply = client.recv().await;
        assert_eq!(reply.kind, "identify");
        assert_eq!(reply.data["role"], "acceptor");

        server.shutdown();
    }

    #[tokio::test]
    async fn test_relay_skips_sender() {
        let server = TestServer::start().await;
        let mut x = Client::connect(&server).await;
        let mut y = Client::connect(&server).await;
        let mut z = Client::connect(&server).await;
        wait_for_connections(&server, 3).await;

        x.send(Envelope::event(
            "desktop",
            EventType::UrlServiceUpdated,
            json!({ "id": 7, "priority": 1 }),
        ))
        .await;

        for peer in [&mut y, &mut z] {
            let msg = peer.recv().await;
            assert_eq!(msg.kind, "url_service_updated");
            assert_eq!(msg.data, json!({ "id": 7, "priority": 1 }));
            assert_eq!(msg.source, "desktop");
        }
        x.expect_silence().await;

        server.shutdown();
    }

    #[tokio::test]
    async fn test_full_record_is_applied() {
        let server = TestServer::start().await;
        let mut client = Client::connect(&server).await;

        let mut svc = UrlService::new(7, "svc", "https://r.example");
        svc.priority = 1;
        client
            .send(Envelope::event(
                "desktop",
                EventType::UrlServiceUpdated,
                serde_json::to_value(&svc).unwrap(),
            ))
            .await;

        // The ping is answered only after the event frame was handled.
        client.send(Envelope::ping("desktop", 1)).await;
        assert_eq!(client.recv().await.kind, "pong");

        let services = server.state().store().url_services(false).await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].priority, 1);
        assert_eq!(server.state().store().pending_count().await, 0);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection() {
        let server = TestServer::start().await;
        let mut client = Client::connect(&server).await;

        client.send_raw("not json").await;
        client.send_raw(r#"{"data": {}}"#).await;
        client.send(Envelope::ping("desktop", 9)).await;

        let pong = client.recv().await;
        assert_eq!(pong.probe_id(), Some(9));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_unknown_type_is_relayed() {
        let server = TestServer::start().await;
        let mut a = Client::connect(&server).await;
        let mut b = Client::connect(&server).await;
        wait_for_connections(&server, 2).await;

        a.send(Envelope::new("tariff_changed", json!({ "id": 1 }), "desktop"))
            .await;

        let msg = b.recv().await;
        assert_eq!(msg.kind, "tariff_changed");

        server.shutdown();
    }

    #[tokio::test]
    async fn test_disconnect_unregisters() {
        let server = TestServer::start().await;
        let client = Client::connect(&server).await;
        wait_for_connections(&server, 1).await;

        drop(client);
        wait_for_connections(&server, 0).await;

        server.shutdown();
    }
}
