// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    idle = { ChannelState::Idle, "idle" },
    connecting = { ChannelState::Connecting, "connecting" },
    open = { ChannelState::Open, "open" },
    reconnecting = { ChannelState::Reconnecting, "reconnecting" },
    closed = { ChannelState::Closed, "closed" },
)]
fn test_state_is_stored_and_named(state: ChannelState, name: &str) {
    let status = ChannelStatus::new();
    status.set_state(state);
    assert_eq!(status.state(), state);
    assert_eq!(state.to_string(), name);
}

#[test]
fn test_starts_idle_and_empty() {
    let status = ChannelStatus::new();
    assert_eq!(status.state(), ChannelState::Idle);
    assert_eq!(status.attempt(), 0);
    assert_eq!(status.backlog(), 0);
    assert!(!status.is_open());
}

#[test]
fn test_summary_includes_attempt_while_reconnecting() {
    let status = ChannelStatus::new();
    status.set_state(ChannelState::Reconnecting);
    status.set_attempt(3);
    assert_eq!(status.summary(), "reconnecting (attempt 3)");

    status.set_state(ChannelState::Open);
    assert_eq!(status.summary(), "open");
}
