// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Domain entities mirrored between the desktop client and the admin service.
//!
//! This module contains the records stored locally and carried in realtime
//! messages: User, Session, UrlService, ConfigEntry and ConnectionLog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Account status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            _ => Err(Error::InvalidUserStatus(s.to_string())),
        }
    }
}

/// A user of the proxy client. Created on first sight, never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Externally assigned identifier.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub trial_used: bool,
    /// Cumulative connection time in seconds.
    #[serde(default)]
    pub total_connection_secs: i64,
}

impl User {
    /// Creates a user seen for the first time at `now`.
    pub fn new(id: String, now: DateTime<Utc>) -> Self {
        User {
            id,
            display_name: None,
            email: None,
            created_at: now,
            last_active_at: now,
            status: UserStatus::Active,
            trial_used: false,
            total_connection_secs: 0,
        }
    }

    /// Applies the fields present in `profile`.
    pub fn apply_profile(&mut self, profile: &UserProfile) {
        if let Some(ref name) = profile.display_name {
            self.display_name = Some(name.clone());
        }
        if let Some(ref email) = profile.email {
            self.email = Some(email.clone());
        }
        if let Some(status) = profile.status {
            self.status = status;
        }
        if let Some(trial_used) = profile.trial_used {
            self.trial_used = trial_used;
        }
    }
}

/// Optional profile fields supplied when upserting a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub trial_used: Option<bool>,
}

/// Protocol spoken by a proxy endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyProtocol {
    #[default]
    Socks5,
    Http,
}

impl ProxyProtocol {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Socks5 => "socks5",
            ProxyProtocol::Http => "http",
        }
    }
}

impl fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProxyProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "socks5" => Ok(ProxyProtocol::Socks5),
            "http" => Ok(ProxyProtocol::Http),
            _ => Err(Error::InvalidProtocol(s.to_string())),
        }
    }
}

/// Address of the proxy a session tunnels through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: ProxyProtocol,
}

impl ProxyEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ProxyEndpoint {
            host: host.into(),
            port,
            protocol: ProxyProtocol::Socks5,
        }
    }
}

/// Lifecycle status of a session.
///
/// Transitions are monotonic: once a session is disconnected or expired it
/// never returns to connecting or connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Expired,
}

impl SessionStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Expired => "expired",
        }
    }

    /// Returns true for disconnected and expired.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Disconnected | SessionStatus::Expired)
    }

    /// Returns true for connecting and connected.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    fn rank(&self) -> u8 {
        match self {
            SessionStatus::Connecting => 0,
            SessionStatus::Connected => 1,
            SessionStatus::Disconnected | SessionStatus::Expired => 2,
        }
    }

    /// Check if a transition from this status to `target` is allowed.
    ///
    /// Staying in place is always allowed; terminal states accept nothing else.
    pub fn can_transition_to(&self, target: SessionStatus) -> bool {
        if *self == target {
            return true;
        }
        !self.is_terminal() && target.rank() >= self.rank()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "connecting" => Ok(SessionStatus::Connecting),
            "connected" => Ok(SessionStatus::Connected),
            "disconnected" => Ok(SessionStatus::Disconnected),
            "expired" => Ok(SessionStatus::Expired),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// One connection attempt of a user through a proxy endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub endpoint: ProxyEndpoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_trial: bool,
    #[serde(default)]
    pub status: SessionStatus,
}

impl Session {
    /// Builds a new session in the `connecting` state.
    pub fn start(id: String, user_id: String, new: NewSession, now: DateTime<Utc>) -> Self {
        Session {
            id,
            user_id,
            endpoint: new.endpoint,
            external_ip: new.external_ip,
            location: new.location,
            country_code: new.country_code,
            started_at: now,
            expires_at: new.expires_at,
            is_trial: new.is_trial,
            status: SessionStatus::Connecting,
        }
    }

    /// Applies a partial update, rejecting status regressions.
    pub fn apply_patch(&mut self, patch: &SessionPatch) -> Result<()> {
        if let Some(status) = patch.status {
            if !self.status.can_transition_to(status) {
                return Err(Error::InvalidTransition {
                    from: self.status.to_string(),
                    to: status.to_string(),
                });
            }
            self.status = status;
        }
        if let Some(ref ip) = patch.external_ip {
            self.external_ip = Some(ip.clone());
        }
        if let Some(ref location) = patch.location {
            self.location = Some(location.clone());
        }
        if let Some(ref code) = patch.country_code {
            self.country_code = Some(code.clone());
        }
        if let Some(expires_at) = patch.expires_at {
            self.expires_at = Some(expires_at);
        }
        Ok(())
    }
}

/// Fields supplied by the caller when a connection attempt begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    #[serde(flatten)]
    pub endpoint: ProxyEndpoint,
    #[serde(default)]
    pub external_ip: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_trial: bool,
}

impl NewSession {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        NewSession {
            endpoint: ProxyEndpoint::new(host, port),
            external_ip: None,
            location: None,
            country_code: None,
            expires_at: None,
            is_trial: false,
        }
    }
}

/// Partial update of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub external_ip: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        *self == SessionPatch::default()
    }

    /// Returns true if the patch changes what the UI shows as the location.
    pub fn touches_location(&self) -> bool {
        self.external_ip.is_some() || self.location.is_some() || self.country_code.is_some()
    }
}

/// Weight of the newest sample in the rolling success rate.
pub const SUCCESS_RATE_WEIGHT: f64 = 0.1;

/// A redirector service, administered remotely and mirrored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlService {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Lower value means higher priority. Not unique.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

fn default_success_rate() -> f64 {
    1.0
}

impl UrlService {
    pub fn new(id: i64, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        UrlService {
            id,
            name: name.into(),
            base_url: base_url.into(),
            api_endpoint: None,
            api_key: None,
            is_active: true,
            priority: 0,
            success_rate: default_success_rate(),
            last_used_at: None,
        }
    }

    /// Applies the fields present in `patch`.
    pub fn apply_patch(&mut self, patch: &UrlServicePatch) {
        if let Some(ref name) = patch.name {
            self.name = name.clone();
        }
        if let Some(ref base_url) = patch.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(ref endpoint) = patch.api_endpoint {
            self.api_endpoint = Some(endpoint.clone());
        }
        if let Some(ref key) = patch.api_key {
            self.api_key = Some(key.clone());
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
    }

    /// Folds one usage outcome into the rolling success rate.
    pub fn record_result(&mut self, success: bool, now: DateTime<Utc>) {
        let sample = if success { 1.0 } else { 0.0 };
        self.success_rate =
            (1.0 - SUCCESS_RATE_WEIGHT) * self.success_rate + SUCCESS_RATE_WEIGHT * sample;
        self.last_used_at = Some(now);
    }
}

/// Partial update of a URL service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlServicePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub priority: Option<i32>,
}

/// Orders services by priority, breaking ties by identifier.
pub fn sort_url_services(services: &mut [UrlService]) {
    services.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
}

/// Declared type of a config value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigType {
    #[default]
    String,
    Number,
    Boolean,
    Json,
}

impl ConfigType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::String => "string",
            ConfigType::Number => "number",
            ConfigType::Boolean => "boolean",
            ConfigType::Json => "json",
        }
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConfigType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "string" => Ok(ConfigType::String),
            "number" => Ok(ConfigType::Number),
            "boolean" => Ok(ConfigType::Boolean),
            "json" => Ok(ConfigType::Json),
            _ => Err(Error::InvalidConfigType(s.to_string())),
        }
    }
}

/// A key/value setting, upserted by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    #[serde(rename = "type", default)]
    pub value_type: ConfigType,
    #[serde(default)]
    pub is_public: bool,
}

impl ConfigEntry {
    /// Decodes the stored string according to its declared type.
    pub fn typed_value(&self) -> Result<serde_json::Value> {
        let invalid = || {
            Error::CorruptedData(format!(
                "config '{}' is not a valid {}",
                self.key, self.value_type
            ))
        };
        match self.value_type {
            ConfigType::String => Ok(serde_json::Value::String(self.value.clone())),
            ConfigType::Number => {
                let n: f64 = self.value.trim().parse().map_err(|_| invalid())?;
                serde_json::Number::from_f64(n)
                    .map(serde_json::Value::Number)
                    .ok_or_else(invalid)
            }
            ConfigType::Boolean => match self.value.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(serde_json::Value::Bool(true)),
                "false" | "0" => Ok(serde_json::Value::Bool(false)),
                _ => Err(invalid()),
            },
            ConfigType::Json => serde_json::from_str(&self.value).map_err(|_| invalid()),
        }
    }
}

/// Immutable record of a finished connection, kept for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionLog {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub duration_secs: i64,
    #[serde(default)]
    pub is_trial: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
