// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outbox dispatcher.
//!
//! Each tick drains a bounded batch of unprocessed outbox rows in creation
//! order, publishes every row as an outbound notification and marks it
//! processed. "Processed" means handed to the local bus; end-to-end delivery
//! belongs to the realtime channel. A row that cannot be decoded is logged and
//! still marked processed so it cannot block the queue.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::{EventBus, Notification};
use crate::error::Result;
use crate::event::EntityKind;
use crate::store::{Command, Filter, Record, Store, StoreState};

/// Default number of rows drained per tick.
pub const DEFAULT_BATCH: usize = 10;

pub struct Dispatcher {
    store: Arc<dyn Store>,
    bus: EventBus,
    batch: usize,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, bus: EventBus) -> Self {
        Dispatcher {
            store,
            bus,
            batch: DEFAULT_BATCH,
        }
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    /// Drains one batch. Returns the number of events published.
    ///
    /// Does nothing unless the store is connected.
    pub async fn tick(&self) -> Result<usize> {
        if self.store.state() != StoreState::Connected {
            return Ok(0);
        }
        let rows = self
            .store
            .list(EntityKind::SyncEvent, Filter::Pending { limit: self.batch })
            .await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut published = 0;
        for row in rows {
            let Record::SyncEvent(entry) = row else {
                continue;
            };
            match entry.decode() {
                Ok(event) => {
                    debug!(
                        id = entry.id,
                        event_type = %event.event_type,
                        entity_id = %event.entity_id,
                        "dispatching outbox event"
                    );
                    self.bus.publish(Notification::from(event));
                    published += 1;
                }
                Err(e) => {
                    warn!(id = entry.id, event_type = %entry.event_type, error = %e, "discarding malformed outbox row");
                }
            }
            self.store.exec(Command::MarkProcessed(entry.id)).await?;
        }
        Ok(published)
    }

    /// Ticks every `interval` until cancelled.
    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "outbox dispatch failed");
                    }
                }
            }
        }
        debug!("dispatcher stopped");
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
