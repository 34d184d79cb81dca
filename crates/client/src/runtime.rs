// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Owns every background task of the desktop engine.
//!
//! Started once from [`Config`]; all timers share one cancellation token
//! so [`Runtime::shutdown`] leaves nothing running.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pk_core::{
    Applier, ApplyOutcome, Command, DisabledStore, Dispatcher, Envelope, EventBus, Fallback,
    FallbackStore, Notification, Outcome, SessionManager, SqliteStore, Store, StoreHandle,
    StoreState,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{Initiator, InitiatorHandle, Transport, WebSocketTransport};
use crate::config::{Config, Mode};
use crate::error::Result;
use crate::fallback::HttpFallback;
use crate::service::SyncService;

const COMPACT_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct Runtime {
    service: SyncService,
    channel: Option<InitiatorHandle>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Builds the direct delivery client, if any endpoints are configured.
pub fn build_fallback(config: &Config) -> Result<Option<Arc<dyn Fallback>>> {
    if config.fallback.endpoints.is_empty() {
        return Ok(None);
    }
    let fallback = HttpFallback::new(
        config.fallback.endpoints.clone(),
        Duration::from_secs(config.fallback.timeout_secs),
    )?;
    Ok(Some(Arc::new(fallback)))
}

/// Opens the local store and picks the degraded path.
///
/// A store that fails to open stays errored for the life of the process.
pub async fn open_store(config: &Config) -> Result<StoreHandle> {
    Ok(open_store_with(config, build_fallback(config)?).await)
}

async fn open_store_with(config: &Config, fallback: Option<Arc<dyn Fallback>>) -> StoreHandle {
    let local: Arc<dyn Store> = if config.store.enabled {
        let path = config.db_path();
        let store = SqliteStore::new(&path);
        match store.init().await {
            StoreState::Connected => tracing::info!(path = %path.display(), "local store ready"),
            state => tracing::warn!(path = %path.display(), %state, "local store unavailable, running degraded"),
        }
        Arc::new(store)
    } else {
        tracing::info!("local store disabled");
        Arc::new(DisabledStore::new())
    };

    let degraded: Arc<dyn Store> = match fallback {
        Some(fallback) => Arc::new(FallbackStore::new(fallback, config.source.clone())),
        None => Arc::new(DisabledStore::new()),
    };

    StoreHandle::new(local, degraded)
}

impl Runtime {
    /// Opens the store and starts every task, talking WebSocket to the remote.
    pub async fn start(config: &Config) -> Result<Self> {
        let fallback = build_fallback(config)?;
        let store = open_store_with(config, fallback.clone()).await;
        Ok(Runtime::spawn(config, store, WebSocketTransport::new(), fallback))
    }

    /// Starts every task over an already opened store.
    ///
    /// `transport` is only used in realtime mode. `fallback` takes the
    /// messages the channel cannot carry once it has stopped retrying.
    pub fn spawn<T: Transport + 'static>(
        config: &Config,
        store: StoreHandle,
        transport: T,
        fallback: Option<Arc<dyn Fallback>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let bus = EventBus::default();
        let mut tasks = Vec::new();
        let sync = &config.sync;

        let dispatcher = Dispatcher::new(Arc::clone(store.local()), bus.clone())
            .with_batch(sync.dispatch_batch);
        tasks.push(tokio::spawn(dispatcher.run(
            Duration::from_millis(sync.dispatch_interval_ms),
            cancel.clone(),
        )));

        let sweeper = SessionManager::new(store.clone(), bus.clone());
        tasks.push(tokio::spawn(sweeper.run_sweeper(
            Duration::from_secs(sync.sweep_interval_secs),
            cancel.clone(),
        )));

        if sync.compact_after_hours > 0 {
            tasks.push(tokio::spawn(run_compaction(
                Arc::clone(store.local()),
                chrono::Duration::hours(sync.compact_after_hours as i64),
                cancel.clone(),
            )));
        }

        let mut service = SyncService::new(store.clone(), bus.clone());
        let channel = match (config.mode(), &config.remote) {
            (Mode::Realtime, Some(remote)) => {
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let (mut initiator, handle) =
                    Initiator::new(remote.initiator_config(&config.source), transport, inbound_tx);
                if let Some(fallback) = fallback {
                    initiator = initiator.with_fallback(fallback);
                }
                tasks.push(tokio::spawn(initiator.run(cancel.clone())));
                tasks.push(tokio::spawn(forward_outbound(
                    bus.subscribe(),
                    handle.clone(),
                    config.source.clone(),
                    cancel.clone(),
                )));
                tasks.push(tokio::spawn(apply_inbound(
                    inbound_rx,
                    Applier::new(store.clone(), bus.clone()),
                    cancel.clone(),
                )));
                service = service.with_channel(Arc::clone(handle.status()));
                tracing::info!(url = %remote.url, "realtime mode");
                Some(handle)
            }
            _ => {
                tracing::info!(
                    endpoints = config.fallback.endpoints.len(),
                    "fallback-only mode"
                );
                None
            }
        };

        Runtime {
            service,
            channel,
            cancel,
            tasks,
        }
    }

    pub fn service(&self) -> &SyncService {
        &self.service
    }

    /// The realtime channel, if running.
    pub fn channel(&self) -> Option<&InitiatorHandle> {
        self.channel.as_ref()
    }

    /// Stops every task and waits for them to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        tracing::info!("runtime stopped");
    }
}

/// Sends every outbound notification over the realtime channel.
async fn forward_outbound(
    mut rx: broadcast::Receiver<Notification>,
    channel: InitiatorHandle,
    source: String,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(notification) => {
                    if let Some(envelope) = notification.to_envelope(&source) {
                        channel.send(envelope);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "outbound forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

async fn apply_inbound(
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    applier: Applier,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some(msg) => {
                    if let ApplyOutcome::Applied { kind, id } = applier.apply(&msg).await {
                        tracing::debug!(%kind, %id, source = %msg.source, "applied remote change");
                    }
                }
                None => break,
            },
        }
    }
}

/// Deletes processed outbox rows older than `keep`, once an hour.
async fn run_compaction(store: Arc<dyn Store>, keep: chrono::Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(COMPACT_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if store.state() != StoreState::Connected {
                    continue;
                }
                let before = Utc::now() - keep;
                match store.exec(Command::CompactProcessed { before }).await {
                    Ok(Outcome::Count(0)) => {}
                    Ok(Outcome::Count(n)) => tracing::info!(deleted = n, "compacted outbox"),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "outbox compaction failed"),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
