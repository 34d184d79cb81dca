// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Direct delivery path used when the store and outbox cannot be used.
//!
//! Delivery is best-effort: an implementation tries its endpoints once and
//! reports failure; nothing is queued for retry.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::protocol::Envelope;

/// Best-effort request/response delivery of one envelope to the remote side.
pub trait Fallback: Send + Sync {
    fn deliver(&self, envelope: Envelope) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Records every delivered envelope, optionally failing each call.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingFallback {
    pub delivered: std::sync::Mutex<Vec<Envelope>>,
    pub fail: bool,
}

#[cfg(test)]
impl RecordingFallback {
    pub fn failing() -> Self {
        RecordingFallback {
            delivered: std::sync::Mutex::new(Vec::new()),
            fail: true,
        }
    }

    #[allow(clippy::unwrap_used)]
    pub fn delivered(&self) -> Vec<Envelope> {
        self.delivered.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Fallback for RecordingFallback {
    #[allow(clippy::unwrap_used)]
    fn deliver(&self, envelope: Envelope) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.delivered.lock().unwrap().push(envelope);
            if self.fail {
                return Err(crate::error::Error::Fallback("endpoint unreachable".into()));
            }
            Ok(())
        })
    }
}
