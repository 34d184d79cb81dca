// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Channel status shared between the initiator task and its callers.
//!
//! Uses atomic fields so status reads never wait on the channel loop.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

/// Lifecycle of the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Not started yet.
    Idle,
    Connecting,
    Open,
    /// Waiting for the next reconnect attempt.
    Reconnecting,
    /// Retries exhausted, or shut down.
    Closed,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Reconnecting => "reconnecting",
            ChannelState::Closed => "closed",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            ChannelState::Idle => 0,
            ChannelState::Connecting => 1,
            ChannelState::Open => 2,
            ChannelState::Reconnecting => 3,
            ChannelState::Closed => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ChannelState::Connecting,
            2 => ChannelState::Open,
            3 => ChannelState::Reconnecting,
            4 => ChannelState::Closed,
            _ => ChannelState::Idle,
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct ChannelStatus {
    state: AtomicU8,
    attempt: AtomicU32,
    backlog: AtomicUsize,
}

impl ChannelStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ChannelState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    /// Reconnect attempts since the channel was last open.
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    pub fn set_attempt(&self, attempt: u32) {
        self.attempt.store(attempt, Ordering::Release);
    }

    /// Messages waiting for the channel to reopen.
    pub fn backlog(&self) -> usize {
        self.backlog.load(Ordering::Acquire)
    }

    pub fn set_backlog(&self, len: usize) {
        self.backlog.store(len, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Human-readable summary for status output.
    pub fn summary(&self) -> String {
        match self.state() {
            ChannelState::Reconnecting => {
                format!("reconnecting (attempt {})", self.attempt())
            }
            state => state.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
