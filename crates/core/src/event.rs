// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync events: the vocabulary of changes carried by the outbox and the
//! realtime channel.
//!
//! Every event type is named `<entity>_<action>` and maps to exactly one
//! entity kind. The outbox row keeps its columns as raw strings so that a
//! corrupted row can be detected and skipped by the dispatcher instead of
//! failing the whole batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Kind of entity an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Session,
    UrlService,
    Config,
    ConnectionLog,
    SyncEvent,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Session => "session",
            EntityKind::UrlService => "url_service",
            EntityKind::Config => "config",
            EntityKind::ConnectionLog => "connection_log",
            EntityKind::SyncEvent => "sync_event",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(EntityKind::User),
            "session" => Ok(EntityKind::Session),
            "url_service" => Ok(EntityKind::UrlService),
            "config" => Ok(EntityKind::Config),
            "connection_log" => Ok(EntityKind::ConnectionLog),
            "sync_event" => Ok(EntityKind::SyncEvent),
            _ => Err(Error::InvalidEntityType(s.to_string())),
        }
    }
}

/// Type of a change, used both as the outbox `event_type` and as the realtime
/// message `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserCreated,
    UserUpdated,
    SessionCreated,
    SessionUpdated,
    /// Pushed directly over the realtime channel, never written to the outbox.
    SessionLocationUpdated,
    SessionEnded,
    SessionExpired,
    UrlServiceCreated,
    UrlServiceUpdated,
    ConfigUpdated,
    ConnectionLogCreated,
}

impl EventType {
    pub const ALL: [EventType; 11] = [
        EventType::UserCreated,
        EventType::UserUpdated,
        EventType::SessionCreated,
        EventType::SessionUpdated,
        EventType::SessionLocationUpdated,
        EventType::SessionEnded,
        EventType::SessionExpired,
        EventType::UrlServiceCreated,
        EventType::UrlServiceUpdated,
        EventType::ConfigUpdated,
        EventType::ConnectionLogCreated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserCreated => "user_created",
            EventType::UserUpdated => "user_updated",
            EventType::SessionCreated => "session_created",
            EventType::SessionUpdated => "session_updated",
            EventType::SessionLocationUpdated => "session_location_updated",
            EventType::SessionEnded => "session_ended",
            EventType::SessionExpired => "session_expired",
            EventType::UrlServiceCreated => "url_service_created",
            EventType::UrlServiceUpdated => "url_service_updated",
            EventType::ConfigUpdated => "config_updated",
            EventType::ConnectionLogCreated => "connection_log_created",
        }
    }

    /// The entity kind this event type mutates.
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            EventType::UserCreated | EventType::UserUpdated => EntityKind::User,
            EventType::SessionCreated
            | EventType::SessionUpdated
            | EventType::SessionLocationUpdated
            | EventType::SessionEnded
            | EventType::SessionExpired => EntityKind::Session,
            EventType::UrlServiceCreated | EventType::UrlServiceUpdated => EntityKind::UrlService,
            EventType::ConfigUpdated => EntityKind::Config,
            EventType::ConnectionLogCreated => EntityKind::ConnectionLog,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EventType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| Error::InvalidEventType(s.to_string()))
    }
}

/// Where a write came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Produced by local business logic; appends an outbox row.
    Local,
    /// Received over the realtime channel; never appends an outbox row.
    Remote,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Local => "local",
            Origin::Remote => "remote",
        }
    }

    pub fn is_local(&self) -> bool {
        *self == Origin::Local
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One outbox row, exactly as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: i64,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    /// Serialized JSON payload.
    pub data: String,
    pub source: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl OutboxEntry {
    /// Decodes the row into a typed event, failing on unknown types or
    /// unparseable payloads.
    pub fn decode(&self) -> Result<SyncEvent> {
        let event_type: EventType = self.event_type.parse()?;
        let data: serde_json::Value = serde_json::from_str(&self.data).map_err(|e| {
            Error::MalformedMessage(format!("outbox row {} payload: {e}", self.id))
        })?;
        Ok(SyncEvent {
            id: self.id,
            event_type,
            entity_kind: event_type.entity_kind(),
            entity_id: self.entity_id.clone(),
            data,
            created_at: self.created_at,
        })
    }
}

/// A decoded outbox event, ready to be published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub id: i64,
    pub event_type: EventType,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
