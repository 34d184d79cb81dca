// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response surface offered to the layers above the sync engine.
//!
//! Every call checks the store state at the moment it runs; nothing here
//! caches connectivity.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use pk_core::{
    Command, EventBus, Notification, NewSession, Origin, Outcome, Record, Session, SessionManager,
    SessionPatch, StoreHandle, UrlService, UrlServicePatch, User, UserProfile,
};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::channel::ChannelStatus;
use crate::error::{Error, Result};

/// Snapshot of engine health for status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub store: String,
    /// `None` in fallback-only mode.
    pub channel: Option<String>,
    pub pending_events: usize,
    pub backlog: usize,
}

#[derive(Clone)]
pub struct SyncService {
    store: StoreHandle,
    bus: EventBus,
    sessions: SessionManager,
    channel: Option<Arc<ChannelStatus>>,
}

fn unexpected(outcome: Outcome) -> Error {
    Error::Core(pk_core::Error::CorruptedData(format!(
        "unexpected store outcome: {outcome:?}"
    )))
}

impl SyncService {
    pub fn new(store: StoreHandle, bus: EventBus) -> Self {
        let sessions = SessionManager::new(store.clone(), bus.clone());
        SyncService {
            store,
            bus,
            sessions,
            channel: None,
        }
    }

    /// Reports the state of a running realtime channel in [`SyncService::status`].
    pub fn with_channel(mut self, status: Arc<ChannelStatus>) -> Self {
        self.channel = Some(status);
        self
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Local notifications: outbound changes and entities updated by the remote side.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.bus.subscribe()
    }

    /// Creates the user on first sight, otherwise applies the profile fields.
    pub async fn upsert_user(&self, id: &str, profile: UserProfile) -> Result<String> {
        if id.trim().is_empty() {
            return Err(pk_core::Error::InvalidInput("user id must not be empty".into()).into());
        }
        let now = Utc::now();
        let mut user = match self.store.user(id).await? {
            Some(user) => user,
            None => User::new(id.to_string(), now),
        };
        user.apply_profile(&profile);
        user.last_active_at = now;
        self.store
            .active()
            .put(Record::User(user), Origin::Local)
            .await?;
        Ok(id.to_string())
    }

    pub async fn create_session(&self, user_id: &str, fields: NewSession) -> Result<String> {
        Ok(self.sessions.create_session(user_id, fields).await?)
    }

    pub async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<Session> {
        Ok(self.sessions.update_session(id, patch).await?)
    }

    pub async fn end_session(&self, id: &str, duration_secs: Option<i64>) -> Result<Session> {
        Ok(self.sessions.end_session(id, duration_secs).await?)
    }

    /// Active services in priority order.
    pub async fn list_url_services(&self) -> Result<Vec<UrlService>> {
        Ok(self.store.url_services(true).await?)
    }

    /// Applies an edit; the outbox carries it to every peer.
    pub async fn update_url_service(&self, id: i64, patch: UrlServicePatch) -> Result<UrlService> {
        match self
            .store
            .active()
            .exec(Command::UpdateUrlService { id, patch })
            .await?
        {
            Outcome::UrlService(service) => Ok(service),
            other => Err(unexpected(other)),
        }
    }

    pub async fn record_url_service_result(&self, id: i64, success: bool) -> Result<UrlService> {
        match self
            .store
            .active()
            .exec(Command::RecordUrlServiceResult { id, success })
            .await?
        {
            Outcome::UrlService(service) => Ok(service),
            other => Err(unexpected(other)),
        }
    }

    /// Public settings decoded by their declared type.
    ///
    /// A value that does not decode is returned as its raw string.
    pub async fn get_public_config(&self) -> Result<BTreeMap<String, serde_json::Value>> {
        let entries = self.store.config(true).await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let value = entry.typed_value().unwrap_or_else(|e| {
                    tracing::warn!(key = %entry.key, error = %e, "config value does not match its type");
                    serde_json::Value::String(entry.value.clone())
                });
                (entry.key, value)
            })
            .collect())
    }

    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            store: self.store.state().to_string(),
            channel: self.channel.as_ref().map(|c| c.summary()),
            pending_events: self.store.pending_count().await,
            backlog: self.channel.as_ref().map_or(0, |c| c.backlog()),
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
