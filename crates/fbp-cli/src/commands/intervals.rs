//! Intervals command: per-session window intervals as JSON.

use std::collections::BTreeMap;
use std::io::{self, Write as _};

use anyhow::Result;

use fbp_core::{Interval, SessionId};
use fbp_db::Database;

use super::util;

pub fn run(db: &Database, min_version: i32) -> Result<()> {
    let sessions: BTreeMap<SessionId, Vec<Interval<String>>> =
        util::session_window_intervals(db, min_version)?
            .into_iter()
            .collect();

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &sessions)?;
    writeln!(stdout)?;
    Ok(())
}
