// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle manager.
//!
//! Keeps at most one non-terminal session per user: creating a session
//! disconnects the user's other sessions in the same transaction as the
//! insert. When the local store is unusable, create/update/end go to the
//! degraded store with a synthesized `local-<millis>-<seq>` identifier so callers
//! still get a usable handle.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Notification};
use crate::entity::{NewSession, Session, SessionPatch};
use crate::error::{Error, Result};
use crate::event::EventType;
use crate::store::{Command, Outcome, StoreHandle};

/// Default interval between expiry sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct SessionManager {
    store: StoreHandle,
    bus: EventBus,
}

/// Sequence that keeps degraded ids distinct within one millisecond.
static DEGRADED_SEQ: AtomicU64 = AtomicU64::new(0);

fn degraded_session_id(now: DateTime<Utc>) -> String {
    let seq = DEGRADED_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("local-{}-{}", now.timestamp_millis(), seq)
}

fn unexpected(outcome: Outcome) -> Error {
    Error::CorruptedData(format!("unexpected store outcome: {outcome:?}"))
}

impl SessionManager {
    pub fn new(store: StoreHandle, bus: EventBus) -> Self {
        SessionManager { store, bus }
    }

    /// Starts a session for `user_id` and returns its identifier.
    pub async fn create_session(&self, user_id: &str, fields: NewSession) -> Result<String> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("user id must not be empty".into()));
        }
        let now = Utc::now();

        if self.store.is_connected() {
            let id = uuid::Uuid::new_v4().to_string();
            let session = Session::start(id.clone(), user_id.to_string(), fields.clone(), now);
            match self.store.local().exec(Command::CreateSession(session)).await {
                Ok(Outcome::Created { closed }) => {
                    if closed > 0 {
                        info!(user_id, closed, "disconnected previous sessions");
                    }
                    debug!(%id, user_id, "session created");
                    return Ok(id);
                }
                Ok(other) => return Err(unexpected(other)),
                Err(Error::StoreUnavailable) => {
                    warn!(user_id, "local store went away, creating session in degraded mode");
                }
                Err(e) => return Err(e),
            }
        }

        let id = degraded_session_id(now);
        let session = Session::start(id.clone(), user_id.to_string(), fields, now);
        if let Err(e) = self
            .store
            .degraded()
            .exec(Command::CreateSession(session))
            .await
        {
            warn!(%id, error = %e, "degraded session create was not delivered");
        }
        Ok(id)
    }

    /// Applies a partial update. A change to location or external IP is
    /// also pushed straight to the realtime channel.
    pub async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<Session> {
        let touches_location = patch.touches_location();
        let command = Command::UpdateSession {
            id: id.to_string(),
            patch,
        };
        let session = match self.store.active().exec(command).await? {
            Outcome::Session(session) => session,
            other => return Err(unexpected(other)),
        };

        if touches_location {
            self.bus.publish(Notification::outbound(
                EventType::SessionLocationUpdated,
                session.id.clone(),
                serde_json::to_value(&session)?,
            ));
        }
        Ok(session)
    }

    /// Disconnects a session, logging the connection when a duration is given.
    pub async fn end_session(&self, id: &str, duration_secs: Option<i64>) -> Result<Session> {
        if let Some(d) = duration_secs {
            if d < 0 {
                return Err(Error::InvalidInput(format!(
                    "duration must not be negative: {d}"
                )));
            }
        }
        let command = Command::EndSession {
            id: id.to_string(),
            duration_secs,
        };
        match self.store.active().exec(command).await? {
            Outcome::Ended { session, log } => {
                debug!(
                    id,
                    logged = log.is_some(),
                    "session ended"
                );
                Ok(session)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Expires connected sessions whose expiry has passed. Returns how many.
    pub async fn sweep_expired(&self) -> Result<usize> {
        if !self.store.is_connected() {
            return Ok(0);
        }
        let outcome = self
            .store
            .local()
            .exec(Command::ExpireSessions { now: Utc::now() })
            .await?;
        match outcome {
            Outcome::Expired(sessions) => {
                if !sessions.is_empty() {
                    info!(count = sessions.len(), "expired sessions");
                }
                Ok(sessions.len())
            }
            other => Err(unexpected(other)),
        }
    }

    /// Sweeps every `interval` (at least one second) until cancelled.
    pub async fn run_sweeper(self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_expired().await {
                        warn!(error = %e, "session sweep failed");
                    }
                }
            }
        }
        debug!("session sweeper stopped");
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
