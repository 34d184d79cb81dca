// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Holds the acceptor's own store, its notification bus, the applier and the
//! connection registry. The acceptor runs the same outbox machinery as a
//! desktop client: admin edits are local-origin writes that the dispatcher
//! publishes, and the forwarder broadcasts them to every connection.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pk_core::{
    Applier, ApplyOutcome, Database, Dispatcher, Envelope, EventBus, Notification, Result,
    SqliteStore, StoreHandle,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::{ConnectionId, Registry};

const DB_FILE_NAME: &str = "proxkeep-remote.db";

#[derive(Clone)]
pub struct ServerState {
    inner: Arc<ServerStateInner>,
}

struct ServerStateInner {
    store: StoreHandle,
    bus: EventBus,
    applier: Applier,
    registry: Registry,
    /// Source tag for envelopes created here.
    source: String,
}

impl ServerState {
    /// Opens (or creates) the database in `data_dir`.
    pub fn new(data_dir: &Path, source: impl Into<String>) -> Result<Self> {
        let db = Database::open(&data_dir.join(DB_FILE_NAME))?;
        Ok(Self::with_store(SqliteStore::from_database(db), source))
    }

    /// State backed by an in-memory database.
    pub fn in_memory(source: impl Into<String>) -> Result<Self> {
        Ok(Self::with_store(SqliteStore::in_memory()?, source))
    }

    fn with_store(store: SqliteStore, source: impl Into<String>) -> Self {
        let store = StoreHandle::local_only(Arc::new(store));
        let bus = EventBus::default();
        let applier = Applier::new(store.clone(), bus.clone());
        ServerState {
            inner: Arc::new(ServerStateInner {
                store,
                bus,
                applier,
                registry: Registry::new(),
                source: source.into(),
            }),
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.inner.store
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.bus.subscribe()
    }

    /// Applies a message from one connection, then relays it to the others.
    ///
    /// Messages the applier cannot use are still relayed so peers running a
    /// newer vocabulary stay consistent.
    pub async fn relay(&self, from: ConnectionId, msg: Envelope) -> ApplyOutcome {
        let outcome = self.inner.applier.apply(&msg).await;
        let reached = self.inner.registry.broadcast_except(from, &msg);
        debug!(%from, kind = %msg.kind, ?outcome, reached, "relayed message");
        outcome
    }

    /// Applies a message delivered over HTTP and sends it to every connection.
    pub async fn accept_fallback(&self, msg: Envelope) -> ApplyOutcome {
        let outcome = self.inner.applier.apply(&msg).await;
        let reached = self.inner.registry.broadcast(&msg);
        debug!(kind = %msg.kind, ?outcome, reached, "accepted fallback delivery");
        outcome
    }

    /// Starts the dispatcher and the forwarder that broadcasts its output.
    pub fn spawn_background(
        &self,
        dispatch_interval: Duration,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let forwarder = tokio::spawn(forward_outbound(
            self.clone(),
            self.subscribe(),
            cancel.clone(),
        ));
        let dispatcher = Dispatcher::new(Arc::clone(self.inner.store.local()), self.inner.bus.clone());
        vec![
            forwarder,
            tokio::spawn(dispatcher.run(dispatch_interval, cancel)),
        ]
    }
}

async fn forward_outbound(
    state: ServerState,
    mut rx: broadcast::Receiver<Notification>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(notification) => {
                    if let Some(envelope) = notification.to_envelope(state.source()) {
                        let reached = state.registry().broadcast(&envelope);
                        debug!(kind = %envelope.kind, reached, "broadcast local change");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "broadcast forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
