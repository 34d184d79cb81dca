// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed database for entity storage and the sync outbox.
//!
//! The [`Database`] struct provides all data access operations for users,
//! sessions, URL services, config entries, connection logs and outbox rows.
//! Every mutating method takes an [`Origin`]: local-origin writes append one
//! outbox row inside the same transaction, remote-origin writes never do.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;

use crate::entity::{
    sort_url_services, ConfigEntry, ConnectionLog, ProxyEndpoint, Session, SessionPatch,
    SessionStatus, UrlService, UrlServicePatch, User,
};
use crate::error::{Error, Result};
use crate::event::{EventType, Origin, OutboxEntry};

/// SQL schema for the local store.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    display_name TEXT,
    email TEXT,
    created_at TEXT NOT NULL,
    last_active_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    trial_used INTEGER NOT NULL DEFAULT 0,
    total_connection_secs INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    host TEXT NOT NULL,
    port INTEGER NOT NULL,
    protocol TEXT NOT NULL DEFAULT 'socks5',
    external_ip TEXT,
    location TEXT,
    started_at TEXT NOT NULL,
    expires_at TEXT,
    is_trial INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'connecting'
);

CREATE TABLE IF NOT EXISTS url_services (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    base_url TEXT NOT NULL,
    api_endpoint TEXT,
    api_key TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    priority INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 1.0,
    last_used_at TEXT
);

CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT 'string',
    is_public INTEGER NOT NULL DEFAULT 0
);

-- Append-only; never updated
CREATE TABLE IF NOT EXISTS connection_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    duration_secs INTEGER NOT NULL,
    is_trial INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Outbox of pending sync events; `processed` is the only queue cursor
CREATE TABLE IF NOT EXISTS sync_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    data TEXT NOT NULL,
    processed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_user_status ON sessions(user_id, status);
CREATE INDEX IF NOT EXISTS idx_sessions_status_expiry ON sessions(status, expires_at);
CREATE INDEX IF NOT EXISTS idx_url_services_priority ON url_services(priority, id);
CREATE INDEX IF NOT EXISTS idx_connection_logs_user ON connection_logs(user_id);
CREATE INDEX IF NOT EXISTS idx_sync_events_pending ON sync_events(processed, created_at);
"#;

/// Formats a timestamp so that lexicographic order matches time order.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a string value from the database, returning a rusqlite error on parse failure.
fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid value '{value}' in column '{column}'"
            ))),
        )
    })
}

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(Error::CorruptedData(format!(
                    "invalid timestamp '{value}' in column '{column}'"
                ))),
            )
        })
}

fn parse_timestamp_opt(
    value: Option<String>,
    column: &str,
) -> std::result::Result<Option<DateTime<Utc>>, rusqlite::Error> {
    value.map(|v| parse_timestamp(&v, column)).transpose()
}

/// Run schema creation and all migrations on a database connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    migrate_add_column(conn, "sessions", "country_code", "TEXT")?;
    migrate_add_column(conn, "sync_events", "source", "TEXT NOT NULL DEFAULT 'local'")?;
    Ok(())
}

/// Migration: add a column to databases created before it existed.
fn migrate_add_column(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
    let sql = format!("SELECT COUNT(*) > 0 FROM pragma_table_info('{table}') WHERE name = ?1");
    let has_column: bool = conn
        .query_row(&sql, [column], |row| row.get(0))
        .unwrap_or(false);

    if !has_column {
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"), [])?;
    }
    Ok(())
}

const USER_COLUMNS: &str = "id, display_name, email, created_at, last_active_at, status,
     trial_used, total_connection_secs";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let created: String = row.get(3)?;
    let active: String = row.get(4)?;
    let status: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        created_at: parse_timestamp(&created, "created_at")?,
        last_active_at: parse_timestamp(&active, "last_active_at")?,
        status: parse_db(&status, "status")?,
        trial_used: row.get(6)?,
        total_connection_secs: row.get(7)?,
    })
}

const SESSION_COLUMNS: &str = "id, user_id, host, port, protocol, external_ip, location,
     country_code, started_at, expires_at, is_trial, status";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let protocol: String = row.get(4)?;
    let started: String = row.get(8)?;
    let expires: Option<String> = row.get(9)?;
    let status: String = row.get(11)?;
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        endpoint: ProxyEndpoint {
            host: row.get(2)?,
            port: row.get(3)?,
            protocol: parse_db(&protocol, "protocol")?,
        },
        external_ip: row.get(5)?,
        location: row.get(6)?,
        country_code: row.get(7)?,
        started_at: parse_timestamp(&started, "started_at")?,
        expires_at: parse_timestamp_opt(expires, "expires_at")?,
        is_trial: row.get(10)?,
        status: parse_db(&status, "status")?,
    })
}

const URL_SERVICE_COLUMNS: &str = "id, name, base_url, api_endpoint, api_key, is_active,
     priority, success_rate, last_used_at";

fn url_service_from_row(row: &Row<'_>) -> rusqlite::Result<UrlService> {
    let last_used: Option<String> = row.get(8)?;
    Ok(UrlService {
        id: row.get(0)?,
        name: row.get(1)?,
        base_url: row.get(2)?,
        api_endpoint: row.get(3)?,
        api_key: row.get(4)?,
        is_active: row.get(5)?,
        priority: row.get(6)?,
        success_rate: row.get(7)?,
        last_used_at: parse_timestamp_opt(last_used, "last_used_at")?,
    })
}

fn config_from_row(row: &Row<'_>) -> rusqlite::Result<ConfigEntry> {
    let value_type: String = row.get(2)?;
    Ok(ConfigEntry {
        key: row.get(0)?,
        value: row.get(1)?,
        value_type: parse_db(&value_type, "type")?,
        is_public: row.get(3)?,
    })
}

fn connection_log_from_row(row: &Row<'_>) -> rusqlite::Result<ConnectionLog> {
    let created: String = row.get(5)?;
    Ok(ConnectionLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        duration_secs: row.get(3)?,
        is_trial: row.get(4)?,
        created_at: parse_timestamp(&created, "created_at")?,
    })
}

fn outbox_from_row(row: &Row<'_>) -> rusqlite::Result<OutboxEntry> {
    let created: String = row.get(7)?;
    Ok(OutboxEntry {
        id: row.get(0)?,
        event_type: row.get(1)?,
        entity_type: row.get(2)?,
        entity_id: row.get(3)?,
        data: row.get(4)?,
        source: row.get(5)?,
        processed: row.get(6)?,
        created_at: parse_timestamp(&created, "created_at")?,
    })
}

/// Append one outbox row for a local-origin write. Remote-origin writes are skipped.
fn append_event<T: Serialize>(
    conn: &Connection,
    event_type: EventType,
    entity_id: &str,
    data: &T,
    origin: Origin,
) -> Result<()> {
    if !origin.is_local() {
        return Ok(());
    }
    let payload = serde_json::to_string(data)?;
    conn.execute(
        "INSERT INTO sync_events (event_type, entity_type, entity_id, data, source, processed, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            event_type.as_str(),
            event_type.entity_kind().as_str(),
            entity_id,
            payload,
            origin.as_str(),
            ts(&Utc::now()),
        ],
    )?;
    Ok(())
}

fn read_session(conn: &Connection, id: &str) -> Result<Option<Session>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], session_from_row)
        .optional()?)
}

fn write_session(conn: &Connection, session: &Session) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, user_id, host, port, protocol, external_ip, location,
         country_code, started_at, expires_at, is_trial, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
            user_id = excluded.user_id,
            host = excluded.host,
            port = excluded.port,
            protocol = excluded.protocol,
            external_ip = excluded.external_ip,
            location = excluded.location,
            country_code = excluded.country_code,
            started_at = excluded.started_at,
            expires_at = excluded.expires_at,
            is_trial = excluded.is_trial,
            status = excluded.status",
        params![
            session.id,
            session.user_id,
            session.endpoint.host,
            session.endpoint.port,
            session.endpoint.protocol.as_str(),
            session.external_ip,
            session.location,
            session.country_code,
            ts(&session.started_at),
            session.expires_at.as_ref().map(ts),
            session.is_trial,
            session.status.as_str(),
        ],
    )?;
    Ok(())
}

/// Force every other non-terminal session of `user_id` to disconnected.
fn disconnect_others(conn: &Connection, user_id: &str, keep_id: &str) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE sessions SET status = 'disconnected'
         WHERE user_id = ?1 AND id != ?2 AND status IN ('connecting', 'connected')",
        params![user_id, keep_id],
    )?;
    Ok(affected)
}

fn write_url_service(conn: &Connection, svc: &UrlService) -> Result<()> {
    conn.execute(
        "INSERT INTO url_services (id, name, base_url, api_endpoint, api_key, is_active,
         priority, success_rate, last_used_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            base_url = excluded.base_url,
            api_endpoint = excluded.api_endpoint,
            api_key = excluded.api_key,
            is_active = excluded.is_active,
            priority = excluded.priority,
            success_rate = excluded.success_rate,
            last_used_at = excluded.last_used_at",
        params![
            svc.id,
            svc.name,
            svc.base_url,
            svc.api_endpoint,
            svc.api_key,
            svc.is_active,
            svc.priority,
            svc.success_rate,
            svc.last_used_at.as_ref().map(ts),
        ],
    )?;
    Ok(())
}

fn read_url_service(conn: &Connection, id: i64) -> Result<Option<UrlService>> {
    let sql = format!("SELECT {URL_SERVICE_COLUMNS} FROM url_services WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], url_service_from_row)
        .optional()?)
}

/// Insert a connection log once; a newly inserted log also adds its duration
/// to the user's cumulative connection time.
fn insert_log(conn: &Connection, log: &ConnectionLog) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO connection_logs (id, user_id, session_id, duration_secs, is_trial, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            log.id,
            log.user_id,
            log.session_id,
            log.duration_secs,
            log.is_trial,
            ts(&log.created_at),
        ],
    )?;
    if inserted == 0 {
        return Ok(false);
    }
    conn.execute(
        "UPDATE users SET total_connection_secs = total_connection_secs + ?1,
         last_active_at = ?2 WHERE id = ?3",
        params![log.duration_secs, ts(&log.created_at), log.user_id],
    )?;
    Ok(true)
}

/// Filter for session listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub user_id: Option<String>,
    /// Only connecting/connected sessions.
    pub active_only: bool,
}

/// SQLite database connection with store operations.
pub struct Database {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl Database {
    /// Open a database connection at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    // -- users --

    /// Insert or fully overwrite a user. Returns true if the user was new.
    pub fn upsert_user(&mut self, user: &User, origin: Origin) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let existed: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
            params![user.id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO users (id, display_name, email, created_at, last_active_at, status,
             trial_used, total_connection_secs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email,
                created_at = excluded.created_at,
                last_active_at = excluded.last_active_at,
                status = excluded.status,
                trial_used = excluded.trial_used,
                total_connection_secs = excluded.total_connection_secs",
            params![
                user.id,
                user.display_name,
                user.email,
                ts(&user.created_at),
                ts(&user.last_active_at),
                user.status.as_str(),
                user.trial_used,
                user.total_connection_secs,
            ],
        )?;
        let event_type = if existed {
            EventType::UserUpdated
        } else {
            EventType::UserCreated
        };
        append_event(&tx, event_type, &user.id, user, origin)?;
        tx.commit()?;
        Ok(!existed)
    }

    /// Get a user by ID.
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], user_from_row)
            .optional()?)
    }

    /// List all users, oldest first.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    // -- sessions --

    /// Create a session, first disconnecting every other non-terminal session
    /// of the same user. Both steps commit together.
    ///
    /// Returns the number of sessions that were force-disconnected.
    pub fn create_session(&mut self, session: &Session, origin: Origin) -> Result<usize> {
        if session.status.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "new session {} cannot start as {}",
                session.id, session.status
            )));
        }
        let tx = self.conn.transaction()?;
        let closed = disconnect_others(&tx, &session.user_id, &session.id)?;
        if read_session(&tx, &session.id)?.is_some() {
            return Err(Error::InvalidInput(format!(
                "session {} already exists",
                session.id
            )));
        }
        write_session(&tx, session)?;
        append_event(&tx, EventType::SessionCreated, &session.id, session, origin)?;
        tx.commit()?;
        Ok(closed)
    }

    /// Insert or overwrite a session as a whole (last writer wins).
    ///
    /// Status never regresses: a stored terminal status is kept when the
    /// incoming record would move it back. A non-terminal incoming session
    /// disconnects the user's other non-terminal sessions.
    pub fn upsert_session(&mut self, session: &Session, origin: Origin) -> Result<Session> {
        let tx = self.conn.transaction()?;
        let mut incoming = session.clone();
        let existing = read_session(&tx, &session.id)?;
        if let Some(ref current) = existing {
            if !current.status.can_transition_to(incoming.status) {
                incoming.status = current.status;
            }
        }
        if incoming.status.is_active() {
            disconnect_others(&tx, &incoming.user_id, &incoming.id)?;
        }
        write_session(&tx, &incoming)?;
        let event_type = if existing.is_some() {
            EventType::SessionUpdated
        } else {
            EventType::SessionCreated
        };
        append_event(&tx, event_type, &incoming.id, &incoming, origin)?;
        tx.commit()?;
        Ok(incoming)
    }

    /// Apply a partial update to a session.
    pub fn update_session(
        &mut self,
        id: &str,
        patch: &SessionPatch,
        origin: Origin,
    ) -> Result<Session> {
        let tx = self.conn.transaction()?;
        let mut session =
            read_session(&tx, id)?.ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        if patch.is_empty() {
            return Ok(session);
        }
        session.apply_patch(patch)?;
        write_session(&tx, &session)?;
        append_event(&tx, EventType::SessionUpdated, id, &session, origin)?;
        tx.commit()?;
        Ok(session)
    }

    /// Mark a session disconnected and, when a duration is given, append a
    /// connection log for it.
    pub fn end_session(
        &mut self,
        id: &str,
        duration_secs: Option<i64>,
        origin: Origin,
    ) -> Result<(Session, Option<ConnectionLog>)> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        let mut session =
            read_session(&tx, id)?.ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        if session.status.is_active() {
            session.status = SessionStatus::Disconnected;
            write_session(&tx, &session)?;
        }
        append_event(&tx, EventType::SessionEnded, id, &session, origin)?;

        let log = match duration_secs {
            Some(duration_secs) => {
                let log = ConnectionLog {
                    id: uuid::Uuid::new_v4().to_string(),
                    user_id: session.user_id.clone(),
                    session_id: session.id.clone(),
                    duration_secs,
                    is_trial: session.is_trial,
                    created_at: now,
                };
                insert_log(&tx, &log)?;
                append_event(&tx, EventType::ConnectionLogCreated, &log.id, &log, origin)?;
                Some(log)
            }
            None => None,
        };
        tx.commit()?;
        Ok((session, log))
    }

    /// Move every connected session whose expiry has passed to expired.
    pub fn expire_sessions(&mut self, now: DateTime<Utc>, origin: Origin) -> Result<Vec<Session>> {
        let tx = self.conn.transaction()?;
        let expired = {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status = 'connected' AND expires_at IS NOT NULL AND expires_at < ?1
                 ORDER BY expires_at, id"
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(params![ts(&now)], session_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut out = Vec::with_capacity(expired.len());
        for mut session in expired {
            session.status = SessionStatus::Expired;
            write_session(&tx, &session)?;
            append_event(&tx, EventType::SessionExpired, &session.id, &session, origin)?;
            out.push(session);
        }
        tx.commit()?;
        Ok(out)
    }

    /// Get a session by ID.
    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        read_session(&self.conn, id)
    }

    /// List sessions matching the filter, newest first.
    pub fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let mut sql = format!("SELECT {SESSION_COLUMNS} FROM sessions");
        let mut conditions = Vec::new();
        let mut params_vec: Vec<String> = Vec::new();

        if let Some(ref user_id) = filter.user_id {
            conditions.push("user_id = ?");
            params_vec.push(user_id.clone());
        }
        if filter.active_only {
            conditions.push("status IN ('connecting', 'connected')");
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY started_at DESC, id");

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|s| s as &dyn rusqlite::ToSql)
            .collect();
        let sessions = stmt
            .query_map(params_refs.as_slice(), session_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    // -- url services --

    /// Insert or fully overwrite a URL service. Returns true if it was new.
    pub fn upsert_url_service(&mut self, svc: &UrlService, origin: Origin) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let existed = read_url_service(&tx, svc.id)?.is_some();
        write_url_service(&tx, svc)?;
        let event_type = if existed {
            EventType::UrlServiceUpdated
        } else {
            EventType::UrlServiceCreated
        };
        append_event(&tx, event_type, &svc.id.to_string(), svc, origin)?;
        tx.commit()?;
        Ok(!existed)
    }

    /// Apply a partial update to a URL service.
    pub fn update_url_service(
        &mut self,
        id: i64,
        patch: &UrlServicePatch,
        origin: Origin,
    ) -> Result<UrlService> {
        let tx = self.conn.transaction()?;
        let mut svc = read_url_service(&tx, id)?
            .ok_or_else(|| Error::UrlServiceNotFound(id.to_string()))?;
        svc.apply_patch(patch);
        write_url_service(&tx, &svc)?;
        append_event(&tx, EventType::UrlServiceUpdated, &id.to_string(), &svc, origin)?;
        tx.commit()?;
        Ok(svc)
    }

    /// Fold a usage outcome into a URL service's rolling success rate.
    pub fn record_url_service_result(
        &mut self,
        id: i64,
        success: bool,
        origin: Origin,
    ) -> Result<UrlService> {
        let tx = self.conn.transaction()?;
        let mut svc = read_url_service(&tx, id)?
            .ok_or_else(|| Error::UrlServiceNotFound(id.to_string()))?;
        svc.record_result(success, Utc::now());
        write_url_service(&tx, &svc)?;
        append_event(&tx, EventType::UrlServiceUpdated, &id.to_string(), &svc, origin)?;
        tx.commit()?;
        Ok(svc)
    }

    /// Get a URL service by ID.
    pub fn get_url_service(&self, id: i64) -> Result<Option<UrlService>> {
        read_url_service(&self.conn, id)
    }

    /// List URL services by priority, ties broken by ID.
    pub fn list_url_services(&self, active_only: bool) -> Result<Vec<UrlService>> {
        let mut sql = format!("SELECT {URL_SERVICE_COLUMNS} FROM url_services");
        if active_only {
            sql.push_str(" WHERE is_active = 1");
        }
        sql.push_str(" ORDER BY priority ASC, id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut services = stmt
            .query_map([], url_service_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        sort_url_services(&mut services);
        Ok(services)
    }

    // -- config --

    /// Insert or overwrite a config entry by key.
    pub fn upsert_config(&mut self, entry: &ConfigEntry, origin: Origin) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO config (key, value, type, is_public) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                type = excluded.type,
                is_public = excluded.is_public",
            params![
                entry.key,
                entry.value,
                entry.value_type.as_str(),
                entry.is_public
            ],
        )?;
        append_event(&tx, EventType::ConfigUpdated, &entry.key, entry, origin)?;
        tx.commit()?;
        Ok(())
    }

    /// Get a config entry by key.
    pub fn get_config(&self, key: &str) -> Result<Option<ConfigEntry>> {
        Ok(self
            .conn
            .query_row(
                "SELECT key, value, type, is_public FROM config WHERE key = ?1",
                params![key],
                config_from_row,
            )
            .optional()?)
    }

    /// List config entries ordered by key.
    pub fn list_config(&self, public_only: bool) -> Result<Vec<ConfigEntry>> {
        let sql = if public_only {
            "SELECT key, value, type, is_public FROM config WHERE is_public = 1 ORDER BY key"
        } else {
            "SELECT key, value, type, is_public FROM config ORDER BY key"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map([], config_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // -- connection logs --

    /// Insert a connection log if its ID is new. Returns true if inserted.
    pub fn insert_connection_log(&mut self, log: &ConnectionLog, origin: Origin) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let inserted = insert_log(&tx, log)?;
        if inserted {
            append_event(&tx, EventType::ConnectionLogCreated, &log.id, log, origin)?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// List connection logs, optionally for one user, oldest first.
    pub fn list_connection_logs(&self, user_id: Option<&str>) -> Result<Vec<ConnectionLog>> {
        let base = "SELECT id, user_id, session_id, duration_secs, is_trial, created_at
                    FROM connection_logs";
        let logs = match user_id {
            Some(user_id) => {
                let sql = format!("{base} WHERE user_id = ?1 ORDER BY created_at, id");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![user_id], connection_log_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let sql = format!("{base} ORDER BY created_at, id");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], connection_log_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(logs)
    }

    // -- outbox --

    /// Oldest unprocessed outbox rows, at most `limit`.
    pub fn pending_events(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_type, entity_type, entity_id, data, source, processed, created_at
             FROM sync_events WHERE processed = 0
             ORDER BY id ASC LIMIT ?1",
        )?;
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit_i64], outbox_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Flip an outbox row to processed. Returns false if it already was.
    pub fn mark_processed(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE sync_events SET processed = 1 WHERE id = ?1 AND processed = 0",
            params![id],
        )?;
        Ok(affected > 0)
    }

    /// Number of unprocessed outbox rows.
    pub fn pending_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sync_events WHERE processed = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// All outbox rows for one entity, oldest first.
    pub fn events_for(&self, entity_id: &str) -> Result<Vec<OutboxEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_type, entity_type, entity_id, data, source, processed, created_at
             FROM sync_events WHERE entity_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![entity_id], outbox_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete processed outbox rows created before `before`.
    pub fn compact_processed(&self, before: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM sync_events WHERE processed = 1 AND created_at < ?1",
            params![ts(&before)],
        )?;
        Ok(affected)
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
