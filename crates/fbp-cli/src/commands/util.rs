//! Shared helpers for subcommands.

use anyhow::Result;
use rayon::prelude::*;

use fbp_core::{Event, FilterChain, Interval, SessionId, WindowPolicy, interval};
use fbp_db::Database;

/// Per-session event lists after the cleanup chain, ordered by session id.
pub fn filtered_sessions(
    db: &Database,
    min_version: i32,
) -> Result<Vec<(SessionId, Vec<Event>)>> {
    let chain = FilterChain::standard(min_version);
    let mut sessions = Vec::new();
    for session_id in db.list_sessions()? {
        let events = db.list_session_events(&session_id)?;
        let (events, stats) = chain.run(events);
        tracing::debug!(session = %session_id, passed = stats.passed, seen = stats.seen, "filtered session");
        sessions.push((session_id, events));
    }
    Ok(sessions)
}

/// Active-window intervals per session.
///
/// Sessions share no state, so they are processed in parallel.
pub fn session_window_intervals(
    db: &Database,
    min_version: i32,
) -> Result<Vec<(SessionId, Vec<Interval<String>>)>> {
    let sessions = filtered_sessions(db, min_version)?;
    Ok(sessions
        .into_par_iter()
        .map(|(session_id, events)| {
            let windows = events.iter().filter(|event| event.active_window().is_some());
            let intervals = interval::compute(&WindowPolicy, windows);
            (session_id, intervals)
        })
        .collect())
}
