// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for pk-core operations.

use thiserror::Error;

/// All possible errors that can occur in pk-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("local store unavailable\n  hint: running in fallback-only mode")]
    StoreUnavailable,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("url service not found: {0}")]
    UrlServiceNotFound(String),

    #[error("config key not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid session transition: cannot go from {from} to {to}\n  hint: disconnected and expired sessions are final")]
    InvalidTransition { from: String, to: String },

    #[error("invalid session status: '{0}'\n  hint: valid statuses are: connecting, connected, disconnected, expired")]
    InvalidStatus(String),

    #[error("invalid user status: '{0}'\n  hint: valid statuses are: active, inactive, suspended")]
    InvalidUserStatus(String),

    #[error("invalid proxy protocol: '{0}'\n  hint: valid protocols are: socks5, http")]
    InvalidProtocol(String),

    #[error("invalid event type: '{0}'")]
    InvalidEventType(String),

    #[error("invalid entity type: '{0}'")]
    InvalidEntityType(String),

    #[error("invalid config type: '{0}'\n  hint: valid types are: string, number, boolean, json")]
    InvalidConfigType(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("fallback delivery failed: {0}")]
    Fallback(String),
}

/// A specialized Result type for pk-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
