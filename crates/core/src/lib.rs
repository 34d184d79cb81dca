// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! pk-core: Shared library for the proxkeep sync engine
//!
//! This crate provides the entities, the SQLite store with its outbox, the
//! realtime message envelope and the sync primitives (dispatcher, applier,
//! session lifecycle) used by both the desktop client and the admin relay.

pub mod applier;
pub mod bus;
pub mod db;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod event;
pub mod fallback;
pub mod protocol;
pub mod session;
pub mod store;

pub use applier::{Applier, ApplyOutcome};
pub use bus::{EventBus, Notification};
pub use db::{Database, SessionFilter};
pub use dispatcher::Dispatcher;
pub use entity::{
    ConfigEntry, ConfigType, ConnectionLog, NewSession, ProxyEndpoint, ProxyProtocol, Session,
    SessionPatch, SessionStatus, UrlService, UrlServicePatch, User, UserProfile, UserStatus,
};
pub use error::{Error, Result};
pub use event::{EntityKind, EventType, Origin, OutboxEntry, SyncEvent};
pub use fallback::Fallback;
pub use protocol::{Envelope, MessageKind, Role};
pub use session::SessionManager;
pub use store::{
    Command, DisabledStore, FallbackStore, Filter, Outcome, Record, SqliteStore, Store,
    StoreHandle, StoreState,
};
