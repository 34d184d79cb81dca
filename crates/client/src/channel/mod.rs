// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime channel, initiator role.
//!
//! - `transport`: message-oriented connection trait and WebSocket impl
//! - `backoff`: reconnect delay schedule
//! - `status`: lock-free channel state for status reads
//! - `initiator`: connect, reconnect, heartbeat and buffering loop

mod backoff;
mod initiator;
mod status;
mod transport;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use backoff::Backoff;
pub use initiator::{Initiator, InitiatorConfig, InitiatorHandle};
pub use status::{ChannelState, ChannelStatus};
pub use transport::{Transport, TransportError, TransportFuture, TransportResult, WebSocketTransport};
