// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

fn drain(backoff: &mut Backoff) -> Vec<u64> {
    std::iter::from_fn(|| backoff.next_delay())
        .map(|d| d.as_secs())
        .collect()
}

#[test]
fn test_default_schedule_doubles_then_caps() {
    let mut backoff = Backoff::default();
    assert_eq!(
        drain(&mut backoff),
        vec![1, 2, 4, 8, 16, 30, 30, 30, 30, 30]
    );
    assert!(backoff.is_exhausted());
    assert_eq!(backoff.next_delay(), None);
}

#[parameterized(
    small_base = { 100, 5_000, 20 },
    equal_cap = { 1_000, 1_000, 5 },
    base_over_cap = { 9_000, 2_000, 4 },
)]
fn test_delays_never_decrease_or_exceed_cap(base_ms: u64, cap_ms: u64, attempts: u32) {
    let cap = Duration::from_millis(cap_ms);
    let mut backoff = Backoff::new(Duration::from_millis(base_ms), cap, attempts);
    let delays: Vec<Duration> = std::iter::from_fn(|| backoff.next_delay()).collect();
    assert_eq!(delays.len(), attempts as usize);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert!(delays.iter().all(|d| *d <= cap));
}

#[test]
fn test_reset_restarts_from_base() {
    let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_secs(1), 2);
    backoff.next_delay();
    backoff.next_delay();
    assert!(backoff.is_exhausted());

    backoff.reset();
    assert_eq!(backoff.attempt(), 0);
    assert_eq!(backoff.next_delay(), Some(Duration::from_millis(10)));
}

#[test]
fn test_zero_attempts_means_unlimited() {
    let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(2), 0);
    for _ in 0..100 {
        assert!(backoff.next_delay().is_some());
    }
    assert!(!backoff.is_exhausted());
}
