// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential reconnect delays.

use std::time::Duration;

/// Delay schedule for reconnect attempts.
///
/// Each delay doubles the previous one, capped at `max_delay`. After
/// `max_attempts` delays the schedule is exhausted until [`Backoff::reset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max_delay: Duration,
    /// Attempts allowed before giving up (0 = unlimited).
    max_attempts: u32,
    attempt: u32,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Backoff {
            base,
            max_delay,
            max_attempts,
            attempt: 0,
            current: base,
        }
    }

    /// Returns the delay before the next attempt, or `None` once exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        let delay = self.current.min(self.max_delay);
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max_delay);
        Some(delay)
    }

    /// Starts the schedule over from the base delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current = self.base;
    }

    /// Attempts scheduled since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_attempts != 0 && self.attempt >= self.max_attempts
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(Duration::from_secs(1), Duration::from_secs(30), 10)
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
