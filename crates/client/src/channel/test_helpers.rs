// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted transport and fallback for channel tests.

#![allow(clippy::unwrap_used)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pk_core::{Envelope, Fallback};
use tokio::sync::mpsc;

use super::transport::{Transport, TransportError, TransportFuture};

/// Test-side view of a [`MockTransport`].
#[derive(Clone, Default)]
pub struct MockRemote {
    connects: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<Envelope>>>,
}

impl MockRemote {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Makes every following connect attempt fail (or succeed).
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_kinds(&self) -> Vec<String> {
        self.sent().into_iter().map(|e| e.kind).collect()
    }
}

/// Transport whose peer is driven by the test.
///
/// Incoming frames are fed through an unbounded channel: `Some(msg)` is
/// delivered, `None` closes the connection.
pub struct MockTransport {
    remote: MockRemote,
    connected: bool,
    incoming: mpsc::UnboundedReceiver<Option<Envelope>>,
}

impl MockTransport {
    pub fn new() -> (Self, MockRemote, mpsc::UnboundedSender<Option<Envelope>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let remote = MockRemote::default();
        let transport = MockTransport {
            remote: remote.clone(),
            connected: false,
            incoming: rx,
        };
        (transport, remote, tx)
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, _url: &str) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.remote.connects.fetch_add(1, Ordering::SeqCst);
            if self.remote.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionFailed("refused".into()));
            }
            self.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.connected = false;
            Ok(())
        })
    }

    fn send(&mut self, msg: Envelope) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            self.remote.sent.lock().unwrap().push(msg);
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<Envelope>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            match self.incoming.recv().await {
                Some(Some(msg)) => Ok(Some(msg)),
                Some(None) => {
                    self.connected = false;
                    Ok(None)
                }
                None => std::future::pending().await,
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Fallback that keeps every envelope it is given.
#[derive(Default)]
pub struct RecordingFallback {
    delivered: Mutex<Vec<Envelope>>,
}

impl RecordingFallback {
    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.data["id"].as_str().unwrap_or("-").to_string())
            .collect()
    }
}

impl Fallback for RecordingFallback {
    fn deliver(
        &self,
        envelope: Envelope,
    ) -> Pin<Box<dyn Future<Output = pk_core::Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.delivered.lock().unwrap().push(envelope);
            Ok(())
        })
    }
}
