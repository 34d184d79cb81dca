// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of open initiator connections.
//!
//! Each connection gets an opaque id and an unbounded queue drained by its
//! socket task, so unicast and broadcast never wait on a slow peer.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use pk_core::Envelope;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct Peer {
    tx: mpsc::UnboundedSender<Envelope>,
    /// Source tag from the peer's `identify`.
    source: Option<String>,
}

#[derive(Default)]
pub struct Registry {
    next_id: AtomicU64,
    peers: RwLock<HashMap<ConnectionId, Peer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection. The receiver yields everything addressed to it.
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Envelope>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Peer { tx, source: None });
        (id, rx)
    }

    pub fn remove(&self, id: ConnectionId) -> bool {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    pub fn identify(&self, id: ConnectionId, source: &str) {
        if let Some(peer) = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id)
        {
            peer.source = Some(source.to_string());
        }
    }

    pub fn source_of(&self, id: ConnectionId) -> Option<String> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .and_then(|peer| peer.source.clone())
    }

    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends to one connection. Returns false if it is gone.
    pub fn send_to(&self, id: ConnectionId, msg: Envelope) -> bool {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .is_some_and(|peer| peer.tx.send(msg).is_ok())
    }

    /// Sends to every open connection. Returns how many were reached.
    pub fn broadcast(&self, msg: &Envelope) -> usize {
        self.fan_out(msg, None)
    }

    /// Sends to every open connection except `except`.
    pub fn broadcast_except(&self, except: ConnectionId, msg: &Envelope) -> usize {
        self.fan_out(msg, Some(except))
    }

    fn fan_out(&self, msg: &Envelope, except: Option<ConnectionId>) -> usize {
        let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
        peers
            .iter()
            .filter(|(id, _)| Some(**id) != except)
            .filter(|(_, peer)| peer.tx.send(msg.clone()).is_ok())
            .count()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
