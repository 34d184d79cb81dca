// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-process notification bus.
//!
//! The dispatcher publishes [`Notification::Outbound`] for every drained
//! outbox row; the channel forwarders only relay that variant. The applier
//! publishes [`Notification::EntityUpdated`], which no forwarder relays, so a
//! change received from a peer is never sent back out.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::event::{EntityKind, EventType, SyncEvent};
use crate::protocol::Envelope;

const DEFAULT_CAPACITY: usize = 1024;

/// A message on the notification bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A local change to push over the realtime channel.
    Outbound {
        event_type: EventType,
        entity_id: String,
        data: serde_json::Value,
    },
    /// An entity changed because a remote update was applied.
    EntityUpdated {
        entity: EntityKind,
        id: String,
        event_type: EventType,
    },
}

impl Notification {
    pub fn outbound(event_type: EventType, entity_id: impl Into<String>, data: serde_json::Value) -> Self {
        Notification::Outbound {
            event_type,
            entity_id: entity_id.into(),
            data,
        }
    }

    /// Builds the realtime envelope for an outbound notification.
    pub fn to_envelope(&self, source: &str) -> Option<Envelope> {
        match self {
            Notification::Outbound {
                event_type, data, ..
            } => Some(Envelope::event(source, *event_type, data.clone())),
            Notification::EntityUpdated { .. } => None,
        }
    }
}

impl From<SyncEvent> for Notification {
    fn from(event: SyncEvent) -> Self {
        Notification::Outbound {
            event_type: event.event_type,
            entity_id: event.entity_id,
            data: event.data,
        }
    }
}

/// Cloneable handle to the process-wide notification bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        EventBus { tx }
    }

    /// Publishes a notification. Returns the number of subscribers reached;
    /// publishing with no subscribers is not an error.
    pub fn publish(&self, notification: Notification) -> usize {
        self.tx.send(notification).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
