// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Initiator side of the realtime channel.
//!
//! The initiator owns one connection to the acceptor and runs a single
//! event loop that:
//! - connects immediately, then reconnects with exponential backoff
//! - announces itself with `identify` on every new connection
//! - sends outgoing envelopes, buffering them while the channel is down
//! - answers pings and probes the peer with its own heartbeat
//! - forwards inbound entity messages to the applier
//!
//! Once the backoff schedule is exhausted the loop idles in
//! [`ChannelState::Closed`]; the next outgoing message restarts it. With a
//! [`Fallback`] attached, envelopes that cannot wait for the channel (the
//! backlog at exhaustion, sends while closed, evictions) go through it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use pk_core::{Envelope, Fallback, MessageKind, Role};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;

use super::backoff::Backoff;
use super::status::{ChannelState, ChannelStatus};
use super::transport::{Transport, TransportResult, WebSocketTransport};

/// Capacity of the outgoing request queue.
const OUTGOING_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct InitiatorConfig {
    pub url: String,
    /// Source tag for envelopes created by the channel itself.
    pub source: String,
    pub backoff: Backoff,
    /// Zero disables the heartbeat.
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub connect_timeout: Duration,
    /// Envelopes kept while disconnected; the oldest are dropped first.
    pub backlog_limit: usize,
}

impl InitiatorConfig {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        InitiatorConfig {
            url: url.into(),
            source: source.into(),
            backoff: Backoff::default(),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            backlog_limit: 256,
        }
    }
}

/// Cloneable entry point for sending through a running initiator.
#[derive(Clone)]
pub struct InitiatorHandle {
    tx: mpsc::Sender<Envelope>,
    status: Arc<ChannelStatus>,
}

impl InitiatorHandle {
    /// Queues an envelope for delivery. Returns false if the loop is gone
    /// or its queue is full.
    pub fn send(&self, msg: Envelope) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(kind = %msg.kind, "outgoing queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn status(&self) -> &Arc<ChannelStatus> {
        &self.status
    }
}

pub struct Initiator<T: Transport = WebSocketTransport> {
    config: InitiatorConfig,
    transport: T,
    rx: mpsc::Receiver<Envelope>,
    inbound: mpsc::UnboundedSender<Envelope>,
    status: Arc<ChannelStatus>,
    backlog: VecDeque<Envelope>,
    fallback: Option<Arc<dyn Fallback>>,
    reconnect_at: Option<Instant>,
    next_ping_at: Option<Instant>,
    pong_deadline: Option<Instant>,
    ping_seq: u64,
}

impl Initiator<WebSocketTransport> {
    pub fn websocket(
        config: InitiatorConfig,
        inbound: mpsc::UnboundedSender<Envelope>,
    ) -> (Self, InitiatorHandle) {
        Initiator::new(config, WebSocketTransport::new(), inbound)
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl<T: Transport> Initiator<T> {
    /// Creates the loop and its handle. Inbound entity messages go to `inbound`.
    pub fn new(
        config: InitiatorConfig,
        transport: T,
        inbound: mpsc::UnboundedSender<Envelope>,
    ) -> (Self, InitiatorHandle) {
        let (tx, rx) = mpsc::channel(OUTGOING_CAPACITY);
        let status = Arc::new(ChannelStatus::new());
        let handle = InitiatorHandle {
            tx,
            status: Arc::clone(&status),
        };
        let initiator = Initiator {
            config,
            transport,
            rx,
            inbound,
            status,
            backlog: VecDeque::new(),
            fallback: None,
            reconnect_at: None,
            next_ping_at: None,
            pong_deadline: None,
            ping_seq: 0,
        };
        (initiator, handle)
    }

    /// Delivers envelopes directly while the channel has given up.
    pub fn with_fallback(mut self, fallback: Arc<dyn Fallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Runs until cancelled or every handle is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.reconnect_at = Some(Instant::now());
        self.status.set_state(ChannelState::Connecting);

        loop {
            let connected = self.transport.is_connected();
            let reconnect_at = self.reconnect_at;
            let ping_at = self.next_ping_at;
            let pong_deadline = self.pong_deadline;

            tokio::select! {
                _ = cancel.cancelled() => break,

                msg = self.rx.recv() => match msg {
                    Some(msg) => self.handle_outbound(msg).await,
                    None => break,
                },

                result = self.transport.recv(), if connected => {
                    self.handle_inbound(result).await;
                }

                _ = sleep_until_opt(reconnect_at), if !connected && reconnect_at.is_some() => {
                    self.try_connect(&cancel).await;
                }

                _ = sleep_until_opt(ping_at), if connected && ping_at.is_some() => {
                    self.send_ping().await;
                }

                _ = sleep_until_opt(pong_deadline), if connected && pong_deadline.is_some() => {
                    tracing::warn!(url = %self.config.url, "heartbeat timed out");
                    self.connection_lost().await;
                }
            }
        }

        let _ = self.transport.disconnect().await;
        self.status.set_state(ChannelState::Closed);
        tracing::debug!(url = %self.config.url, "initiator stopped");
    }

    async fn try_connect(&mut self, cancel: &CancellationToken) {
        self.reconnect_at = None;
        self.status.set_state(ChannelState::Connecting);

        let attempt = timeout(
            self.config.connect_timeout,
            self.transport.connect(&self.config.url),
        );
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = attempt => result,
        };

        match result {
            Ok(Ok(())) => self.on_open().await,
            Ok(Err(e)) => {
                tracing::warn!(url = %self.config.url, error = %e, "connection attempt failed");
                self.schedule_reconnect();
            }
            Err(_) => {
                tracing::warn!(url = %self.config.url, "connection attempt timed out");
                let _ = self.transport.disconnect().await;
                self.schedule_reconnect();
            }
        }
    }

    async fn on_open(&mut self) {
        tracing::info!(url = %self.config.url, "realtime channel open");
        self.config.backoff.reset();
        self.status.set_attempt(0);
        self.status.set_state(ChannelState::Open);

        let identify = Envelope::identify(&self.config.source, Role::Initiator);
        if let Err(e) = self.transport.send(identify).await {
            tracing::warn!(error = %e, "handshake failed");
            self.connection_lost().await;
            return;
        }
        self.schedule_ping();
        self.flush_backlog().await;
    }

    async fn flush_backlog(&mut self) {
        if !self.backlog.is_empty() {
            tracing::info!(count = self.backlog.len(), "flushing buffered messages");
        }
        while let Some(msg) = self.backlog.pop_front() {
            if let Err(e) = self.transport.send(msg.clone()).await {
                tracing::warn!(error = %e, "flush interrupted");
                self.backlog.push_front(msg);
                self.connection_lost().await;
                break;
            }
        }
        self.status.set_backlog(self.backlog.len());
    }

    async fn handle_outbound(&mut self, msg: Envelope) {
        if self.transport.is_connected() {
            match self.transport.send(msg.clone()).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(kind = %msg.kind, error = %e, "send failed, buffering");
                    self.buffer(msg);
                    self.connection_lost().await;
                    return;
                }
            }
        }

        if self.reconnect_at.is_some() {
            self.buffer(msg);
            return;
        }

        // Retries were exhausted; new traffic starts a fresh cycle.
        tracing::info!(url = %self.config.url, "restarting reconnect cycle");
        self.config.backoff.reset();
        self.status.set_attempt(0);
        self.reconnect_at = Some(Instant::now());
        self.status.set_state(ChannelState::Reconnecting);
        if let Some(msg) = self.hand_off(msg) {
            self.buffer(msg);
        }
    }

    fn buffer(&mut self, msg: Envelope) {
        if self.backlog.len() >= self.config.backlog_limit.max(1) {
            if let Some(dropped) = self.backlog.pop_front() {
                if let Some(dropped) = self.hand_off(dropped) {
                    tracing::warn!(kind = %dropped.kind, "backlog full, dropping oldest message");
                }
            }
        }
        self.backlog.push_back(msg);
        self.status.set_backlog(self.backlog.len());
    }

    /// Sends `msg` through the fallback in the background. Gives it back
    /// when no fallback is attached.
    fn hand_off(&self, msg: Envelope) -> Option<Envelope> {
        let Some(fallback) = &self.fallback else {
            return Some(msg);
        };
        let fallback = Arc::clone(fallback);
        tokio::spawn(async move {
            let kind = msg.kind.clone();
            match fallback.deliver(msg).await {
                Ok(()) => tracing::debug!(%kind, "delivered through fallback"),
                Err(e) => tracing::warn!(%kind, error = %e, "fallback delivery failed"),
            }
        });
        None
    }

    async fn handle_inbound(&mut self, result: TransportResult<Option<Envelope>>) {
        let msg = match result {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                tracing::info!(url = %self.config.url, "realtime channel closed by peer");
                self.connection_lost().await;
                return;
            }
            Err(e) => {
                tracing::warn!(url = %self.config.url, error = %e, "receive failed");
                self.connection_lost().await;
                return;
            }
        };

        // Any traffic proves the peer is alive.
        self.pong_deadline = None;
        self.schedule_ping();

        match msg.message_kind() {
            MessageKind::Ping => {
                let pong = Envelope::pong(&self.config.source, msg.probe_id().unwrap_or(0));
                if let Err(e) = self.transport.send(pong).await {
                    tracing::warn!(error = %e, "pong failed");
                    self.connection_lost().await;
                }
            }
            MessageKind::Pong | MessageKind::Identify => {
                tracing::trace!(kind = %msg.kind, source = %msg.source, "control message");
            }
            MessageKind::Event(_) | MessageKind::Unknown(_) => {
                if self.inbound.send(msg).is_err() {
                    tracing::debug!("inbound receiver gone, dropping message");
                }
            }
        }
    }

    fn schedule_ping(&mut self) {
        self.next_ping_at = if self.config.heartbeat_interval.is_zero() {
            None
        } else {
            Some(Instant::now() + self.config.heartbeat_interval)
        };
    }

    async fn send_ping(&mut self) {
        self.ping_seq += 1;
        self.next_ping_at = None;
        let ping = Envelope::ping(&self.config.source, self.ping_seq);
        match self.transport.send(ping).await {
            Ok(()) => {
                self.pong_deadline = Some(Instant::now() + self.config.heartbeat_timeout);
            }
            Err(e) => {
                tracing::warn!(error = %e, "ping failed");
                self.connection_lost().await;
            }
        }
    }

    async fn connection_lost(&mut self) {
        let _ = self.transport.disconnect().await;
        self.next_ping_at = None;
        self.pong_deadline = None;
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        match self.config.backoff.next_delay() {
            Some(delay) => {
                let attempt = self.config.backoff.attempt();
                tracing::debug!(?delay, attempt, "scheduling reconnect");
                self.reconnect_at = Some(Instant::now() + delay);
                self.status.set_attempt(attempt);
                self.status.set_state(ChannelState::Reconnecting);
            }
            None => {
                tracing::warn!(
                    url = %self.config.url,
                    attempts = self.config.backoff.attempt(),
                    "reconnect attempts exhausted, waiting for outgoing traffic"
                );
                self.reconnect_at = None;
                self.status.set_state(ChannelState::Closed);
                if self.fallback.is_some() {
                    for msg in std::mem::take(&mut self.backlog) {
                        let _ = self.hand_off(msg);
                    }
                    self.status.set_backlog(0);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "initiator_tests.rs"]
mod tests;
