//! Traces command: completion interaction traces as JSONL.

use std::io::{self, Write as _};

use anyhow::Result;
use serde::Serialize;

use fbp_core::{CompletionTrace, SessionId, TraceExtractor};
use fbp_db::Database;

use super::util;

#[derive(Serialize)]
struct TraceLine<'a> {
    session: &'a SessionId,
    #[serde(flatten)]
    trace: CompletionTrace,
}

pub fn run(db: &Database, min_version: i32) -> Result<()> {
    let mut stdout = io::stdout().lock();
    for (session_id, events) in util::filtered_sessions(db, min_version)? {
        let mut extractor = TraceExtractor::new();
        for event in &events {
            if let Some(trace) = extractor.process(event) {
                serde_json::to_writer(
                    &mut stdout,
                    &TraceLine {
                        session: &session_id,
                        trace,
                    },
                )?;
                writeln!(stdout)?;
            }
        }
        extractor.flush();
    }
    Ok(())
}
