// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime message envelope shared by both channel roles.
//!
//! Every frame is a JSON object `{type, data, source, timestamp}`:
//! - `identify` is the handshake sent by an initiator right after connecting
//! - `ping`/`pong` carry liveness checks
//! - every other `type` is an [`EventType`] carrying a full entity snapshot
//!
//! Unknown `type` values decode fine and are reported as
//! [`MessageKind::Unknown`] so newer peers can talk to older ones.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::event::EventType;

pub const TYPE_IDENTIFY: &str = "identify";
pub const TYPE_PING: &str = "ping";
pub const TYPE_PONG: &str = "pong";

/// Role a peer plays on the channel, announced in `identify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Initiator,
    Acceptor,
}

/// Wire envelope for every realtime message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Classification of an envelope's `type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Identify,
    Ping,
    Pong,
    Event(EventType),
    Unknown(String),
}

impl MessageKind {
    /// Returns true for handshake and liveness messages.
    pub fn is_control(&self) -> bool {
        matches!(self, MessageKind::Identify | MessageKind::Ping | MessageKind::Pong)
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Envelope {
    /// Creates an envelope stamped with the current time.
    pub fn new(kind: impl Into<String>, data: serde_json::Value, source: impl Into<String>) -> Self {
        Envelope {
            kind: kind.into(),
            data,
            source: source.into(),
            timestamp: now_timestamp(),
        }
    }

    /// Creates the handshake message.
    pub fn identify(source: &str, role: Role) -> Self {
        Envelope::new(
            TYPE_IDENTIFY,
            serde_json::json!({ "role": role }),
            source,
        )
    }

    /// Creates a liveness probe.
    pub fn ping(source: &str, id: u64) -> Self {
        Envelope::new(TYPE_PING, serde_json::json!({ "id": id }), source)
    }

    /// Creates the answer to a probe.
    pub fn pong(source: &str, id: u64) -> Self {
        Envelope::new(TYPE_PONG, serde_json::json!({ "id": id }), source)
    }

    /// Creates an entity change message.
    pub fn event(source: &str, event_type: EventType, data: serde_json::Value) -> Self {
        Envelope::new(event_type.as_str(), data, source)
    }

    /// Classifies the `type` field.
    pub fn message_kind(&self) -> MessageKind {
        match self.kind.as_str() {
            TYPE_IDENTIFY => MessageKind::Identify,
            TYPE_PING => MessageKind::Ping,
            TYPE_PONG => MessageKind::Pong,
            other => match other.parse::<EventType>() {
                Ok(event_type) => MessageKind::Event(event_type),
                Err(_) => MessageKind::Unknown(other.to_string()),
            },
        }
    }

    /// Returns the `id` field of a ping or pong, if present.
    pub fn probe_id(&self) -> Option<u64> {
        self.data.get("id").and_then(serde_json::Value::as_u64)
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
