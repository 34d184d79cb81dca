// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound applier: absorbs changes received from a peer.
//!
//! Known event types are written through the store's remote-origin path, so
//! they never produce outbox rows, and then announced on the bus as
//! [`Notification::EntityUpdated`]. Unknown types are ignored so newer peers
//! can add vocabulary without breaking older ones.

use tracing::{debug, warn};

use crate::bus::{EventBus, Notification};
use crate::event::{EntityKind, EventType, Origin};
use crate::protocol::{Envelope, MessageKind};
use crate::store::{Record, StoreHandle};

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { kind: EntityKind, id: String },
    /// Control message or unknown type.
    Ignored,
    /// Known type whose payload is not a full entity.
    Malformed,
    /// The local store is unavailable or refused the write.
    Failed,
}

#[derive(Clone)]
pub struct Applier {
    store: StoreHandle,
    bus: EventBus,
}

impl Applier {
    pub fn new(store: StoreHandle, bus: EventBus) -> Self {
        Applier { store, bus }
    }

    /// Applies one message. Never fails; every problem is logged.
    pub async fn apply(&self, msg: &Envelope) -> ApplyOutcome {
        let event_type = match msg.message_kind() {
            MessageKind::Event(event_type) => event_type,
            MessageKind::Unknown(kind) => {
                debug!(%kind, source = %msg.source, "ignoring unknown message type");
                return ApplyOutcome::Ignored;
            }
            _ => return ApplyOutcome::Ignored,
        };
        self.apply_event(event_type, msg.data.clone(), &msg.source)
            .await
    }

    async fn apply_event(
        &self,
        event_type: EventType,
        data: serde_json::Value,
        source: &str,
    ) -> ApplyOutcome {
        let record = match Record::from_event(event_type, data) {
            Ok(record) => record,
            Err(e) => {
                warn!(%event_type, %source, error = %e, "dropping malformed message");
                return ApplyOutcome::Malformed;
            }
        };
        let kind = record.kind();
        let id = record.id();

        // The degraded stores keep nothing, so there is no local copy to update.
        if !self.store.is_connected() {
            debug!(%event_type, %id, "local store unavailable, remote change not applied");
            return ApplyOutcome::Failed;
        }
        if let Err(e) = self.store.local().put(record, Origin::Remote).await {
            warn!(%event_type, %id, error = %e, "failed to apply remote change");
            return ApplyOutcome::Failed;
        }
        debug!(%event_type, %id, %source, "applied remote change");
        self.bus.publish(Notification::EntityUpdated {
            entity: kind,
            id: id.clone(),
            event_type,
        });
        ApplyOutcome::Applied { kind, id }
    }
}

#[cfg(test)]
#[path = "applier_tests.rs"]
mod tests;
