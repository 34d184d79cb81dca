// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Configuration is read from `config.toml` in the proxkeep data directory
//! (or the path given with `--config`). A missing file means defaults:
//! - `source`: tag sent in every realtime envelope
//! - `[store]`: whether to use the local SQLite store, and where
//! - `[remote]`: realtime endpoint; absent means fallback-only mode
//! - `[fallback]`: HTTP endpoints for direct delivery
//! - `[sync]`: dispatcher, sweeper and compaction timing

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::channel::{Backoff, InitiatorConfig};
use crate::error::{Error, Result};

const APP_DIR_NAME: &str = "proxkeep";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "proxkeep.db";
const LOG_FILE_NAME: &str = "proxkeep.log";

/// Client configuration stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Source tag carried by every outgoing envelope.
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub store: StoreConfig,
    /// Realtime endpoint (optional - if absent, runs in fallback-only mode).
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Local store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Database file (default: `<data dir>/proxkeep.db`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            enabled: true,
            path: None,
        }
    }
}

/// Realtime channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Reconnect attempts before giving up until the next send (default: 10). 0 = unlimited.
    #[serde(default = "default_reconnect_max_retries")]
    pub reconnect_max_retries: u32,
    /// First reconnect delay in milliseconds (default: 1000).
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay between reconnection attempts in seconds (default: 30).
    #[serde(default = "default_reconnect_max_delay_secs")]
    pub reconnect_max_delay_secs: u64,
    /// Heartbeat ping interval in milliseconds (default: 30000). 0 = disabled.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Max time to wait for pong response in milliseconds (default: 10000).
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Max time for one connection attempt in seconds (default: 5).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Messages kept while the channel is down (default: 256).
    #[serde(default = "default_backlog_limit")]
    pub backlog_limit: usize,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        RemoteConfig {
            url: url.into(),
            reconnect_max_retries: default_reconnect_max_retries(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_secs: default_reconnect_max_delay_secs(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            backlog_limit: default_backlog_limit(),
        }
    }

    /// Validates the URL scheme. Returns an error message if invalid.
    pub fn validate_url(&self) -> Option<String> {
        if self.url.starts_with("ws://") || self.url.starts_with("wss://") {
            return None;
        }
        Some(format!(
            "invalid remote URL '{}': must be ws:// or wss://",
            self.url
        ))
    }

    /// Channel settings for the initiator.
    pub fn initiator_config(&self, source: &str) -> InitiatorConfig {
        InitiatorConfig {
            url: self.url.clone(),
            source: source.to_string(),
            backoff: Backoff::new(
                Duration::from_millis(self.reconnect_base_delay_ms),
                Duration::from_secs(self.reconnect_max_delay_secs),
                self.reconnect_max_retries,
            ),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            heartbeat_timeout: Duration::from_millis(self.heartbeat_timeout_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            backlog_limit: self.backlog_limit,
        }
    }
}

/// Direct delivery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Base URLs tried in order.
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Request timeout in seconds (default: 10).
    #[serde(default = "default_fallback_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        FallbackConfig {
            endpoints: Vec::new(),
            timeout_secs: default_fallback_timeout_secs(),
        }
    }
}

/// Background timer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Outbox poll interval in milliseconds (default: 5000).
    #[serde(default = "default_dispatch_interval_ms")]
    pub dispatch_interval_ms: u64,
    /// Outbox rows drained per tick (default: 10).
    #[serde(default = "default_dispatch_batch")]
    pub dispatch_batch: usize,
    /// Expiry sweep interval in seconds (default: 300).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Age after which processed outbox rows are deleted (default: 168). 0 = never.
    #[serde(default = "default_compact_after_hours")]
    pub compact_after_hours: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            dispatch_interval_ms: default_dispatch_interval_ms(),
            dispatch_batch: default_dispatch_batch(),
            sweep_interval_secs: default_sweep_interval_secs(),
            compact_after_hours: default_compact_after_hours(),
        }
    }
}

/// Which path local changes take to the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Store, outbox and realtime channel.
    Realtime,
    /// Direct delivery only.
    FallbackOnly,
}

fn default_source() -> String {
    "desktop".to_string()
}

fn default_true() -> bool {
    true
}

fn default_reconnect_max_retries() -> u32 {
    10
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_secs() -> u64 {
    30
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_backlog_limit() -> usize {
    256
}

fn default_fallback_timeout_secs() -> u64 {
    10
}

fn default_dispatch_interval_ms() -> u64 {
    5_000
}

fn default_dispatch_batch() -> usize {
    10
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_compact_after_hours() -> u64 {
    168
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: default_source(),
            store: StoreConfig::default(),
            remote: None,
            fallback: FallbackConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// Directory holding the config, database and log file.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Default location of the config file.
pub fn default_config_path() -> PathBuf {
    data_dir().join(CONFIG_FILE_NAME)
}

/// Default location of the log file.
pub fn log_path() -> PathBuf {
    data_dir().join(LOG_FILE_NAME)
}

impl Config {
    /// Loads and validates the config at `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the config as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Checks URLs and limits.
    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(Error::Config("source must not be empty".into()));
        }
        if let Some(ref remote) = self.remote {
            if let Some(msg) = remote.validate_url() {
                return Err(Error::Config(msg));
            }
        }
        for endpoint in &self.fallback.endpoints {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(Error::Config(format!(
                    "invalid fallback endpoint '{endpoint}': must be http:// or https://"
                )));
            }
        }
        if self.sync.dispatch_batch == 0 {
            return Err(Error::Config("sync.dispatch_batch must be at least 1".into()));
        }
        if self.sync.dispatch_interval_ms == 0 {
            return Err(Error::Config(
                "sync.dispatch_interval_ms must be at least 1".into(),
            ));
        }
        if self.sync.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "sync.sweep_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Realtime when the store is enabled and a remote is configured.
    pub fn mode(&self) -> Mode {
        if self.store.enabled && self.remote.is_some() {
            Mode::Realtime
        } else {
            Mode::FallbackOnly
        }
    }

    /// Database file location.
    pub fn db_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| data_dir().join(DB_FILE_NAME))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
