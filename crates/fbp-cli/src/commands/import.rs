//! Import command: JSONL archives into the local `SQLite` store.
//!
//! Each archive is one upload by one developer. Importing bootstraps the
//! developer records: the first event's session id finds or creates the
//! archive's developer, and every further session id seen in the same
//! archive is attributed to that developer. Consolidation later merges
//! developers that turn out to share sessions across archives.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use fbp_core::{Developer, DeveloperStore as _, Event, EventKind, SessionId, find_session_developer};
use fbp_db::Database;

pub fn run(db: &mut Database, files: &[PathBuf]) -> Result<usize> {
    let mut total = 0;
    for path in files {
        total += import_archive(db, path)
            .with_context(|| format!("failed to import {}", path.display()))?;
    }
    Ok(total)
}

fn import_archive(db: &mut Database, path: &Path) -> Result<usize> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let stem = path
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("archive")
        .to_string();

    let mut developer: Option<Developer> = None;
    let mut artificial_offset = 0_i64;
    let mut events = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let raw: RawEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON on line {}", idx + 1))?;

        let dev = match developer.as_mut() {
            Some(dev) => dev,
            None => developer.insert(resolve_developer(db, raw.session_id.as_deref())?),
        };
        let session_id = match raw.session_id.as_deref() {
            Some(sid) => SessionId::new(sid)
                .with_context(|| format!("invalid session id on line {}", idx + 1))?,
            // An event without a session id belongs to this upload's
            // developer; use the developer id as its session.
            None => owned_session(dev),
        };
        if dev.session_ids.insert(session_id.clone()) {
            db.save(dev.id, dev)?;
        }

        // Untimed events get consecutive artificial trigger times so
        // their relative order survives the timestamp-sorted store.
        let triggered_at = raw.triggered_at.or_else(|| {
            artificial_offset += 1;
            Some(artificial_base() + Duration::seconds(artificial_offset))
        });

        events.push(Event {
            id: raw.id.unwrap_or_else(|| format!("{stem}:{}", idx + 1)),
            session_id,
            triggered_at,
            terminated_at: raw.terminated_at,
            app_version: raw.app_version,
            kind: raw.kind,
        });
    }

    let inserted = db.insert_events(&events)?;
    tracing::info!(archive = %path.display(), parsed = events.len(), inserted, "archive imported");
    Ok(inserted)
}

/// Finds the developer owning the archive's first session, or registers
/// a new one.
fn resolve_developer(db: &mut Database, session_id: Option<&str>) -> Result<Developer> {
    match session_id {
        Some(sid) => {
            let sid = SessionId::new(sid).context("invalid session id")?;
            if let Some(dev) = find_session_developer(db, &sid)? {
                Ok(dev)
            } else {
                let dev = Developer::with_session(sid);
                db.insert(&dev)?;
                Ok(dev)
            }
        }
        None => {
            let mut dev = Developer::new();
            let own = owned_session(&dev);
            dev.session_ids.insert(own);
            db.insert(&dev)?;
            Ok(dev)
        }
    }
}

fn owned_session(dev: &Developer) -> SessionId {
    SessionId::new(dev.id.to_string()).expect("uuid strings are non-empty")
}

fn artificial_base() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    triggered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    terminated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    app_version: Option<String>,
    kind: EventKind,
}
