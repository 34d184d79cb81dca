// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors that can occur in the proxkeep client.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] pk_core::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for proxkeep client operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true when the local store could not be used.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Error::Core(pk_core::Error::StoreUnavailable))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
