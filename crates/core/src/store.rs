// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The store interface and its three implementations.
//!
//! - [`SqliteStore`] is the durable local store with the outbox
//! - [`FallbackStore`] forwards local-origin writes straight to the remote
//!   side when there is no usable local store
//! - [`DisabledStore`] answers reads with nothing and refuses writes
//!
//! One implementation of each role is chosen at startup and held in a
//! [`StoreHandle`], which checks the local store's [`StoreState`] right
//! before every use instead of caching it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::db::{Database, SessionFilter};
use crate::entity::{
    ConfigEntry, ConnectionLog, Session, SessionPatch, SessionStatus, UrlService,
    UrlServicePatch, User,
};
use crate::error::{Error, Result};
use crate::event::{EntityKind, EventType, Origin, OutboxEntry};
use crate::fallback::Fallback;
use crate::protocol::Envelope;

/// Boxed future returned by every [`Store`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Connection state of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Created but not opened yet.
    Uninitialized,
    Connected,
    /// Turned off by configuration or replaced by a degraded store.
    Disabled,
    /// Opening failed or the connection dropped. Permanent for the process.
    Errored,
}

impl StoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreState::Uninitialized => "uninitialized",
            StoreState::Connected => "connected",
            StoreState::Disabled => "disabled",
            StoreState::Errored => "errored",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            StoreState::Uninitialized => 0,
            StoreState::Connected => 1,
            StoreState::Disabled => 2,
            StoreState::Errored => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => StoreState::Uninitialized,
            1 => StoreState::Connected,
            2 => StoreState::Disabled,
            _ => StoreState::Errored,
        }
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One stored record of any entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    User(User),
    Session(Session),
    UrlService(UrlService),
    Config(ConfigEntry),
    ConnectionLog(ConnectionLog),
    SyncEvent(OutboxEntry),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::User(_) => EntityKind::User,
            Record::Session(_) => EntityKind::Session,
            Record::UrlService(_) => EntityKind::UrlService,
            Record::Config(_) => EntityKind::Config,
            Record::ConnectionLog(_) => EntityKind::ConnectionLog,
            Record::SyncEvent(_) => EntityKind::SyncEvent,
        }
    }

    /// Identifier of the record as carried in outbox rows.
    pub fn id(&self) -> String {
        match self {
            Record::User(u) => u.id.clone(),
            Record::Session(s) => s.id.clone(),
            Record::UrlService(s) => s.id.to_string(),
            Record::Config(c) => c.key.clone(),
            Record::ConnectionLog(l) => l.id.clone(),
            Record::SyncEvent(e) => e.id.to_string(),
        }
    }

    /// Decodes the full entity snapshot carried by an event.
    pub fn from_event(event_type: EventType, data: serde_json::Value) -> Result<Self> {
        let malformed =
            |e: serde_json::Error| Error::MalformedMessage(format!("{event_type} payload: {e}"));
        let record = match event_type.entity_kind() {
            EntityKind::User => Record::User(serde_json::from_value(data).map_err(malformed)?),
            EntityKind::Session => {
                Record::Session(serde_json::from_value(data).map_err(malformed)?)
            }
            EntityKind::UrlService => {
                Record::UrlService(serde_json::from_value(data).map_err(malformed)?)
            }
            EntityKind::Config => Record::Config(serde_json::from_value(data).map_err(malformed)?),
            EntityKind::ConnectionLog => {
                Record::ConnectionLog(serde_json::from_value(data).map_err(malformed)?)
            }
            EntityKind::SyncEvent => {
                return Err(Error::MalformedMessage(format!(
                    "{event_type} does not carry an entity"
                )))
            }
        };
        Ok(record)
    }

    /// Event type announcing an overwrite of this record.
    fn write_event(&self) -> Option<EventType> {
        match self {
            Record::User(_) => Some(EventType::UserUpdated),
            Record::Session(_) => Some(EventType::SessionUpdated),
            Record::UrlService(_) => Some(EventType::UrlServiceUpdated),
            Record::Config(_) => Some(EventType::ConfigUpdated),
            Record::ConnectionLog(_) => Some(EventType::ConnectionLogCreated),
            Record::SyncEvent(_) => None,
        }
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        let value = match self {
            Record::User(u) => serde_json::to_value(u)?,
            Record::Session(s) => serde_json::to_value(s)?,
            Record::UrlService(s) => serde_json::to_value(s)?,
            Record::Config(c) => serde_json::to_value(c)?,
            Record::ConnectionLog(l) => serde_json::to_value(l)?,
            Record::SyncEvent(e) => serde_json::to_value(e)?,
        };
        Ok(value)
    }
}

/// Selection applied by [`Store::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    All,
    /// Non-terminal sessions or active URL services.
    Active,
    /// Public config entries.
    Public,
    /// Sessions or connection logs of one user.
    User(String),
    /// Oldest unprocessed outbox rows.
    Pending { limit: usize },
}

/// Operations that do not fit a plain upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Insert a session after disconnecting the user's other sessions.
    CreateSession(Session),
    UpdateSession {
        id: String,
        patch: SessionPatch,
    },
    EndSession {
        id: String,
        duration_secs: Option<i64>,
    },
    ExpireSessions {
        now: DateTime<Utc>,
    },
    UpdateUrlService {
        id: i64,
        patch: UrlServicePatch,
    },
    RecordUrlServiceResult {
        id: i64,
        success: bool,
    },
    MarkProcessed(i64),
    CompactProcessed {
        before: DateTime<Utc>,
    },
    PendingCount,
}

/// Result of a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A session was created; `closed` sessions were force-disconnected.
    Created { closed: usize },
    Session(Session),
    Ended {
        session: Session,
        log: Option<ConnectionLog>,
    },
    Expired(Vec<Session>),
    UrlService(UrlService),
    Count(usize),
    Marked(bool),
}

/// Storage interface shared by the local, fallback and disabled stores.
pub trait Store: Send + Sync {
    fn state(&self) -> StoreState;

    /// Upsert a record. Local-origin writes also record the change for sync.
    fn put(&self, record: Record, origin: Origin) -> StoreFuture<'_, ()>;

    fn get(&self, kind: EntityKind, key: &str) -> StoreFuture<'_, Option<Record>>;

    fn list(&self, kind: EntityKind, filter: Filter) -> StoreFuture<'_, Vec<Record>>;

    /// Run a local-origin command.
    fn exec(&self, command: Command) -> StoreFuture<'_, Outcome>;
}

/// SQLite-backed local store with the outbox.
pub struct SqliteStore {
    path: Option<PathBuf>,
    /// Only touched from the blocking pool.
    db: Arc<Mutex<Option<Database>>>,
    state: AtomicU8,
}

/// Returns true for errors after which the connection cannot be trusted.
fn is_connection_error(err: &Error) -> bool {
    use rusqlite::ErrorCode;
    match err {
        Error::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
            e.code,
            ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::ReadOnly
        ),
        Error::Io(_) => true,
        _ => false,
    }
}

fn bad_filter(kind: EntityKind, filter: &Filter) -> Error {
    Error::InvalidInput(format!("filter {filter:?} does not apply to {kind}"))
}

impl SqliteStore {
    /// Creates a store that will open `path` on [`SqliteStore::init`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteStore {
            path: Some(path.into()),
            db: Arc::new(Mutex::new(None)),
            state: AtomicU8::new(StoreState::Uninitialized.to_u8()),
        }
    }

    /// Wraps an already open database.
    pub fn from_database(db: Database) -> Self {
        SqliteStore {
            path: None,
            db: Arc::new(Mutex::new(Some(db))),
            state: AtomicU8::new(StoreState::Connected.to_u8()),
        }
    }

    /// Opens an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        Ok(SqliteStore::from_database(Database::open_in_memory()?))
    }

    /// Opens the database file. Failure leaves the store errored for good.
    pub async fn init(&self) -> StoreState {
        if self.state() == StoreState::Connected {
            return StoreState::Connected;
        }
        let Some(path) = self.path.clone() else {
            self.set_state(StoreState::Errored);
            return StoreState::Errored;
        };
        let db = Arc::clone(&self.db);
        let opened = tokio::task::spawn_blocking(move || {
            let db_file = Database::open(&path)?;
            *db.lock().unwrap_or_else(PoisonError::into_inner) = Some(db_file);
            Ok::<_, Error>(path)
        })
        .await;
        match opened {
            Ok(Ok(path)) => {
                info!(path = %path.display(), "local store connected");
                self.set_state(StoreState::Connected);
            }
            Ok(Err(e)) => {
                error!(error = %e, "failed to open local store");
                self.set_state(StoreState::Errored);
            }
            Err(e) => {
                error!(error = %e, "local store open task failed");
                self.set_state(StoreState::Errored);
            }
        }
        self.state()
    }

    fn set_state(&self, state: StoreState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Runs `f` against the open database on the blocking pool. A
    /// connection-level failure drops the connection and marks the store
    /// errored.
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if self.state() != StoreState::Connected {
            return Err(Error::StoreUnavailable);
        }
        let db = Arc::clone(&self.db);
        let (result, lost) = tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(conn) = guard.as_mut() else {
                return (Err(Error::StoreUnavailable), false);
            };
            let result = f(conn);
            let lost = matches!(result, Err(ref e) if is_connection_error(e));
            if lost {
                *guard = None;
            }
            (result, lost)
        })
        .await
        .map_err(|e| Error::Io(e.into()))?;

        if lost {
            if let Err(ref e) = result {
                error!(error = %e, "local store connection lost");
            }
            self.set_state(StoreState::Errored);
            return Err(Error::StoreUnavailable);
        }
        result
    }
}

impl Store for SqliteStore {
    fn state(&self) -> StoreState {
        StoreState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn put(&self, record: Record, origin: Origin) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.with_db(move |db| match record {
                Record::User(ref u) => db.upsert_user(u, origin).map(|_| ()),
                Record::Session(ref s) => db.upsert_session(s, origin).map(|_| ()),
                Record::UrlService(ref s) => db.upsert_url_service(s, origin).map(|_| ()),
                Record::Config(ref c) => db.upsert_config(c, origin),
                Record::ConnectionLog(ref l) => db.insert_connection_log(l, origin).map(|_| ()),
                Record::SyncEvent(_) => Err(Error::InvalidInput(
                    "outbox rows are written by entity operations only".into(),
                )),
            })
            .await
        })
    }

    fn get(&self, kind: EntityKind, key: &str) -> StoreFuture<'_, Option<Record>> {
        let key = key.to_string();
        Box::pin(async move {
            self.with_db(move |db| match kind {
                EntityKind::User => Ok(db.get_user(&key)?.map(Record::User)),
                EntityKind::Session => Ok(db.get_session(&key)?.map(Record::Session)),
                EntityKind::UrlService => {
                    let id: i64 = key
                        .parse()
                        .map_err(|_| Error::InvalidInput(format!("invalid url service id: {key}")))?;
                    Ok(db.get_url_service(id)?.map(Record::UrlService))
                }
                EntityKind::Config => Ok(db.get_config(&key)?.map(Record::Config)),
                EntityKind::ConnectionLog | EntityKind::SyncEvent => Err(Error::InvalidInput(
                    format!("{kind} records are listed, not looked up"),
                )),
            })
            .await
        })
    }

    fn list(&self, kind: EntityKind, filter: Filter) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(async move {
            self.with_db(move |db| {
                let records = match (kind, &filter) {
                    (EntityKind::User, Filter::All) => {
                        db.list_users()?.into_iter().map(Record::User).collect()
                    }
                    (EntityKind::Session, Filter::All | Filter::Active | Filter::User(_)) => {
                        let session_filter = SessionFilter {
                            user_id: match &filter {
                                Filter::User(user_id) => Some(user_id.clone()),
                                _ => None,
                            },
                            active_only: filter == Filter::Active,
                        };
                        db.list_sessions(&session_filter)?
                            .into_iter()
                            .map(Record::Session)
                            .collect()
                    }
                    (EntityKind::UrlService, Filter::All | Filter::Active) => db
                        .list_url_services(filter == Filter::Active)?
                        .into_iter()
                        .map(Record::UrlService)
                        .collect(),
                    (EntityKind::Config, Filter::All | Filter::Public) => db
                        .list_config(filter == Filter::Public)?
                        .into_iter()
                        .map(Record::Config)
                        .collect(),
                    (EntityKind::ConnectionLog, Filter::All) => db
                        .list_connection_logs(None)?
                        .into_iter()
                        .map(Record::ConnectionLog)
                        .collect(),
                    (EntityKind::ConnectionLog, Filter::User(user_id)) => db
                        .list_connection_logs(Some(user_id.as_str()))?
                        .into_iter()
                        .map(Record::ConnectionLog)
                        .collect(),
                    (EntityKind::SyncEvent, Filter::Pending { limit }) => db
                        .pending_events(*limit)?
                        .into_iter()
                        .map(Record::SyncEvent)
                        .collect(),
                    _ => return Err(bad_filter(kind, &filter)),
                };
                Ok(records)
            })
            .await
        })
    }

    fn exec(&self, command: Command) -> StoreFuture<'_, Outcome> {
        Box::pin(async move {
            self.with_db(move |db| match command {
                Command::CreateSession(ref session) => {
                    let closed = db.create_session(session, Origin::Local)?;
                    Ok(Outcome::Created { closed })
                }
                Command::UpdateSession { ref id, ref patch } => {
                    Ok(Outcome::Session(db.update_session(id, patch, Origin::Local)?))
                }
                Command::EndSession {
                    ref id,
                    duration_secs,
                } => {
                    let (session, log) = db.end_session(id, duration_secs, Origin::Local)?;
                    Ok(Outcome::Ended { session, log })
                }
                Command::ExpireSessions { now } => {
                    Ok(Outcome::Expired(db.expire_sessions(now, Origin::Local)?))
                }
                Command::UpdateUrlService { id, ref patch } => Ok(Outcome::UrlService(
                    db.update_url_service(id, patch, Origin::Local)?,
                )),
                Command::RecordUrlServiceResult { id, success } => Ok(Outcome::UrlService(
                    db.record_url_service_result(id, success, Origin::Local)?,
                )),
                Command::MarkProcessed(id) => Ok(Outcome::Marked(db.mark_processed(id)?)),
                Command::CompactProcessed { before } => {
                    Ok(Outcome::Count(db.compact_processed(before)?))
                }
                Command::PendingCount => Ok(Outcome::Count(db.pending_count()?)),
            })
            .await
        })
    }
}

/// Degraded store that sends local-origin writes straight to the remote side.
///
/// Sessions created in this mode are remembered in memory so later updates
/// and the final end can still carry a full snapshot.
pub struct FallbackStore {
    fallback: Arc<dyn Fallback>,
    source: String,
    sessions: std::sync::Mutex<HashMap<String, Session>>,
}

impl FallbackStore {
    pub fn new(fallback: Arc<dyn Fallback>, source: impl Into<String>) -> Self {
        FallbackStore {
            fallback,
            source: source.into(),
            sessions: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Delivers one change. Failure is logged and dropped.
    async fn send(&self, event_type: EventType, data: serde_json::Value) {
        let envelope = Envelope::event(&self.source, event_type, data);
        match self.fallback.deliver(envelope).await {
            Ok(()) => debug!(%event_type, "delivered over fallback"),
            Err(e) => warn!(%event_type, error = %e, "fallback delivery failed, dropping change"),
        }
    }

    fn remember(&self, session: &Session) {
        if let Ok(mut sessions) = self.sessions.lock() {
            if session.status.is_terminal() {
                sessions.remove(&session.id);
            } else {
                sessions.insert(session.id.clone(), session.clone());
            }
        }
    }

    fn recall(&self, id: &str) -> Result<Session> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| Error::CorruptedData("fallback session table poisoned".into()))?;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }
}

impl Store for FallbackStore {
    fn state(&self) -> StoreState {
        StoreState::Disabled
    }

    fn put(&self, record: Record, origin: Origin) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if !origin.is_local() {
                return Ok(());
            }
            let Some(event_type) = record.write_event() else {
                return Err(Error::StoreUnavailable);
            };
            self.send(event_type, record.to_json()?).await;
            Ok(())
        })
    }

    fn get(&self, _kind: EntityKind, _key: &str) -> StoreFuture<'_, Option<Record>> {
        Box::pin(async { Ok(None) })
    }

    fn list(&self, _kind: EntityKind, _filter: Filter) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn exec(&self, command: Command) -> StoreFuture<'_, Outcome> {
        Box::pin(async move {
            match command {
                Command::CreateSession(session) => {
                    self.remember(&session);
                    self.send(EventType::SessionCreated, serde_json::to_value(&session)?)
                        .await;
                    Ok(Outcome::Created { closed: 0 })
                }
                Command::UpdateSession { id, patch } => {
                    let mut session = self.recall(&id)?;
                    session.apply_patch(&patch)?;
                    self.remember(&session);
                    self.send(EventType::SessionUpdated, serde_json::to_value(&session)?)
                        .await;
                    Ok(Outcome::Session(session))
                }
                Command::EndSession { id, duration_secs } => {
                    let mut session = self.recall(&id)?;
                    session.status = SessionStatus::Disconnected;
                    self.remember(&session);
                    self.send(EventType::SessionEnded, serde_json::to_value(&session)?)
                        .await;
                    let log = duration_secs.map(|duration_secs| ConnectionLog {
                        id: uuid::Uuid::new_v4().to_string(),
                        user_id: session.user_id.clone(),
                        session_id: session.id.clone(),
                        duration_secs,
                        is_trial: session.is_trial,
                        created_at: Utc::now(),
                    });
                    if let Some(ref log) = log {
                        self.send(EventType::ConnectionLogCreated, serde_json::to_value(log)?)
                            .await;
                    }
                    Ok(Outcome::Ended { session, log })
                }
                _ => Err(Error::StoreUnavailable),
            }
        })
    }
}

/// Store that holds nothing: reads are empty, writes are refused.
pub struct DisabledStore {
    state: StoreState,
}

impl DisabledStore {
    pub fn new() -> Self {
        DisabledStore {
            state: StoreState::Disabled,
        }
    }

    /// A disabled store reporting a specific state, e.g. after a failed open.
    pub fn with_state(state: StoreState) -> Self {
        DisabledStore { state }
    }
}

impl Default for DisabledStore {
    fn default() -> Self {
        DisabledStore::new()
    }
}

impl Store for DisabledStore {
    fn state(&self) -> StoreState {
        self.state
    }

    fn put(&self, _record: Record, _origin: Origin) -> StoreFuture<'_, ()> {
        Box::pin(async { Err(Error::StoreUnavailable) })
    }

    fn get(&self, _kind: EntityKind, _key: &str) -> StoreFuture<'_, Option<Record>> {
        Box::pin(async { Ok(None) })
    }

    fn list(&self, _kind: EntityKind, _filter: Filter) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn exec(&self, _command: Command) -> StoreFuture<'_, Outcome> {
        Box::pin(async { Err(Error::StoreUnavailable) })
    }
}

/// The local store paired with the degraded store used while it is unusable.
#[derive(Clone)]
pub struct StoreHandle {
    local: Arc<dyn Store>,
    degraded: Arc<dyn Store>,
}

impl StoreHandle {
    pub fn new(local: Arc<dyn Store>, degraded: Arc<dyn Store>) -> Self {
        StoreHandle { local, degraded }
    }

    /// A handle with no degraded path.
    pub fn local_only(local: Arc<dyn Store>) -> Self {
        StoreHandle::new(local, Arc::new(DisabledStore::new()))
    }

    /// Current state of the local store.
    pub fn state(&self) -> StoreState {
        self.local.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == StoreState::Connected
    }

    pub fn local(&self) -> &Arc<dyn Store> {
        &self.local
    }

    pub fn degraded(&self) -> &Arc<dyn Store> {
        &self.degraded
    }

    /// The store to use right now.
    pub fn active(&self) -> &Arc<dyn Store> {
        if self.is_connected() {
            &self.local
        } else {
            &self.degraded
        }
    }

    pub async fn user(&self, id: &str) -> Result<Option<User>> {
        match self.active().get(EntityKind::User, id).await? {
            Some(Record::User(user)) => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    pub async fn session(&self, id: &str) -> Result<Option<Session>> {
        match self.active().get(EntityKind::Session, id).await? {
            Some(Record::Session(session)) => Ok(Some(session)),
            _ => Ok(None),
        }
    }

    pub async fn sessions(&self, filter: Filter) -> Result<Vec<Session>> {
        let records = self.active().list(EntityKind::Session, filter).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| match r {
                Record::Session(s) => Some(s),
                _ => None,
            })
            .collect())
    }

    /// URL services ordered by priority, then identifier.
    pub async fn url_services(&self, active_only: bool) -> Result<Vec<UrlService>> {
        let filter = if active_only {
            Filter::Active
        } else {
            Filter::All
        };
        let records = self.active().list(EntityKind::UrlService, filter).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| match r {
                Record::UrlService(s) => Some(s),
                _ => None,
            })
            .collect())
    }

    pub async fn config(&self, public_only: bool) -> Result<Vec<ConfigEntry>> {
        let filter = if public_only {
            Filter::Public
        } else {
            Filter::All
        };
        let records = self.active().list(EntityKind::Config, filter).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| match r {
                Record::Config(c) => Some(c),
                _ => None,
            })
            .collect())
    }

    /// Number of unprocessed outbox rows, zero when the store is unusable.
    pub async fn pending_count(&self) -> usize {
        if !self.is_connected() {
            return 0;
        }
        match self.local.exec(Command::PendingCount).await {
            Ok(Outcome::Count(n)) => n,
            _ => 0,
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
