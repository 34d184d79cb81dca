// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    session_not_found = { Error::SessionNotFound("s-123".into()), "s-123" },
    store_unavailable = { Error::StoreUnavailable, "fallback-only" },
    invalid_protocol = { Error::InvalidProtocol("ftp".into()), "socks5" },
    malformed = { Error::MalformedMessage("bad json".into()), "bad json" },
)]
fn test_error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn test_error_invalid_transition_display() {
    let err = Error::InvalidTransition {
        from: "disconnected".into(),
        to: "connected".into(),
    };
    let msg = err.to_string();
    assert!(msg.contains("disconnected"));
    assert!(msg.contains("connected"));
}

#[test]
fn test_error_from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: Error = io_err.into();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_error_from_json() {
    let json_err = serde_json::from_str::<()>("invalid").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Json(_)));
}
