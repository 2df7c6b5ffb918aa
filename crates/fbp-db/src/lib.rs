//! Storage layer for the feedback processor.
//!
//! Persists the imported event log and the developer records using
//! `rusqlite`.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`: instances can be moved between threads but not shared without
//! external synchronization.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 format (always UTC), so
//! lexicographic ordering matches chronological ordering. The `data`
//! column of `events` holds the kind-specific JSON payload; the `type`
//! column duplicates its tag for indexing.
//!
//! The `id` column of `developers` is deliberately **not** unique:
//! consolidation marks absorbed records with a shared sentinel id, and
//! any number of those may exist.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use thiserror::Error;

use fbp_core::{Developer, DeveloperId, DeveloperStore, Event, SessionId};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored event timestamp.
    #[error("invalid timestamp for event {event_id}: {timestamp}")]
    TimestampParse {
        event_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse a stored event payload or session id.
    #[error("invalid event data for {event_id}: {message}")]
    InvalidEventData { event_id: String, message: String },
    /// Failed to parse a stored developer record.
    #[error("invalid developer record {id}: {message}")]
    InvalidDeveloper { id: String, message: String },
    /// `save` addressed a developer id with no matching row.
    #[error("no developer record with id {0}")]
    UnknownDeveloper(DeveloperId),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database, destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the schema. Idempotent.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                triggered_at TEXT,
                terminated_at TEXT,
                app_version TEXT,
                type TEXT NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_triggered ON events(triggered_at);
            CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
            CREATE INDEX IF NOT EXISTS idx_events_type ON events(type);

            -- id is not unique: absorbed records all carry the sentinel.
            CREATE TABLE IF NOT EXISTS developers (
                id TEXT NOT NULL,
                session_ids TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_developers_id ON developers(id);
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of events in one transaction, ignoring duplicate ids.
    ///
    /// Returns the number of rows actually inserted.
    pub fn insert_events(&mut self, events: &[Event]) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO events
                (id, session_id, triggered_at, terminated_at, app_version, type, data)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
            )?;
            for event in events {
                let data = serde_json::to_string(&event.kind).map_err(|err| {
                    DbError::InvalidEventData {
                        event_id: event.id.clone(),
                        message: err.to_string(),
                    }
                })?;
                inserted += stmt.execute(params![
                    event.id,
                    event.session_id.as_str(),
                    event.triggered_at.map(format_timestamp),
                    event.terminated_at.map(format_timestamp),
                    event.app_version,
                    kind_tag(&data, &event.id)?,
                    data,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Lists all events ordered by trigger time then id, NULLs first.
    pub fn list_events(&self) -> Result<Vec<Event>, DbError> {
        self.query_events(
            "
            SELECT id, session_id, triggered_at, terminated_at, app_version, data
            FROM events
            ORDER BY triggered_at ASC, id ASC
            ",
            params![],
        )
    }

    /// Lists one session's events ordered by trigger time then id.
    pub fn list_session_events(&self, session_id: &SessionId) -> Result<Vec<Event>, DbError> {
        self.query_events(
            "
            SELECT id, session_id, triggered_at, terminated_at, app_version, data
            FROM events
            WHERE session_id = ?
            ORDER BY triggered_at ASC, id ASC
            ",
            params![session_id.as_str()],
        )
    }

    /// Distinct session ids present in the event log, ordered.
    pub fn list_sessions(&self) -> Result<Vec<SessionId>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT session_id FROM events ORDER BY session_id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut sessions = Vec::new();
        for row in rows {
            let raw = row?;
            let session = SessionId::new(raw.clone()).map_err(|err| DbError::InvalidEventData {
                event_id: String::new(),
                message: format!("session id {raw:?}: {err}"),
            })?;
            sessions.push(session);
        }
        Ok(sessions)
    }

    fn query_events(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Event>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(EventRow {
                id: row.get(0)?,
                session_id: row.get(1)?,
                triggered_at: row.get(2)?,
                terminated_at: row.get(3)?,
                app_version: row.get(4)?,
                data: row.get(5)?,
            })
        })?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        Ok(events)
    }
}

struct EventRow {
    id: String,
    session_id: String,
    triggered_at: Option<String>,
    terminated_at: Option<String>,
    app_version: Option<String>,
    data: String,
}

impl EventRow {
    fn into_event(self) -> Result<Event, DbError> {
        let session_id =
            SessionId::new(self.session_id).map_err(|err| DbError::InvalidEventData {
                event_id: self.id.clone(),
                message: err.to_string(),
            })?;
        let kind = serde_json::from_str(&self.data).map_err(|err| DbError::InvalidEventData {
            event_id: self.id.clone(),
            message: err.to_string(),
        })?;
        Ok(Event {
            triggered_at: self
                .triggered_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, &self.id))
                .transpose()?,
            terminated_at: self
                .terminated_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, &self.id))
                .transpose()?,
            id: self.id,
            session_id,
            app_version: self.app_version,
            kind,
        })
    }
}

/// The `type` tag of a serialized `EventKind`.
fn kind_tag(data: &str, event_id: &str) -> Result<String, DbError> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|err| DbError::InvalidEventData {
            event_id: event_id.to_string(),
            message: err.to_string(),
        })?;
    Ok(value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("other")
        .to_string())
}

fn parse_timestamp(timestamp: &str, event_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            event_id: event_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_developer(id: &str, session_ids: &str) -> Result<Developer, DbError> {
    let parsed_id: DeveloperId = id.parse().map_err(|err: uuid::Error| {
        DbError::InvalidDeveloper {
            id: id.to_string(),
            message: err.to_string(),
        }
    })?;
    let sessions: Vec<String> =
        serde_json::from_str(session_ids).map_err(|err| DbError::InvalidDeveloper {
            id: id.to_string(),
            message: err.to_string(),
        })?;
    let session_ids = sessions
        .into_iter()
        .map(SessionId::new)
        .collect::<Result<_, _>>()
        .map_err(|err| DbError::InvalidDeveloper {
            id: id.to_string(),
            message: err.to_string(),
        })?;
    Ok(Developer {
        id: parsed_id,
        session_ids,
    })
}

fn encode_sessions(developer: &Developer) -> String {
    let sessions: Vec<&str> = developer.session_ids.iter().map(SessionId::as_str).collect();
    serde_json::to_string(&sessions).unwrap_or_else(|_| "[]".to_string())
}

impl DeveloperStore for Database {
    type Error = DbError;

    fn find_all(&self) -> Result<Vec<Developer>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, session_ids FROM developers ORDER BY rowid ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut developers = Vec::new();
        for row in rows {
            let (id, session_ids) = row?;
            developers.push(decode_developer(&id, &session_ids)?);
        }
        Ok(developers)
    }

    fn insert(&mut self, developer: &Developer) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO developers (id, session_ids) VALUES (?, ?)",
            params![developer.id.to_string(), encode_sessions(developer)],
        )?;
        Ok(())
    }

    fn save(&mut self, original_id: DeveloperId, developer: &Developer) -> Result<(), DbError> {
        let rowid: Option<i64> = self
            .conn
            .query_row(
                "SELECT rowid FROM developers WHERE id = ? LIMIT 1",
                params![original_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(rowid) = rowid else {
            return Err(DbError::UnknownDeveloper(original_id));
        };
        self.conn.execute(
            "UPDATE developers SET id = ?, session_ids = ? WHERE rowid = ?",
            params![developer.id.to_string(), encode_sessions(developer), rowid],
        )?;
        Ok(())
    }

    fn find_by_session_id(&self, session_id: &SessionId) -> Result<Vec<Developer>, DbError> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|dev| !dev.is_absorbed() && dev.session_ids.contains(session_id))
            .collect())
    }

    fn clear(&mut self) -> Result<(), DbError> {
        self.conn.execute("DELETE FROM developers", [])?;
        Ok(())
    }
}
