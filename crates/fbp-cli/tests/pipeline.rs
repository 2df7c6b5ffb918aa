//! End-to-end pipeline: import archives, filter, compute intervals,
//! extract traces and consolidate developers against a real database.

use std::fs::File;
use std::io::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};

use fbp_cli::commands::{import, util};
use fbp_core::{
    CompletionAction, DeveloperStore as _, SessionId, TraceExtractor, consolidate, statistics,
};
use fbp_db::Database;

fn ts(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 4, 21, 9, 0, secs).unwrap()
}

fn archive(dir: &tempfile::TempDir, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    path
}

fn window_line(id: &str, session: &str, start: u32, end: u32, window: &str) -> String {
    format!(
        r#"{{"id":"{id}","session_id":"{session}","triggered_at":"{}","terminated_at":"{}","app_version":"0.1000","kind":{{"type":"window","window":"{window}"}}}}"#,
        ts(start).to_rfc3339(),
        ts(end).to_rfc3339(),
    )
}

fn completion_line(id: &str, session: &str, start: u32, end: u32) -> String {
    format!(
        r#"{{"id":"{id}","session_id":"{session}","triggered_at":"{}","terminated_at":"{}","app_version":"0.1000","kind":{{"type":"completion","document":{{"language":"CSharp","file_name":"MyClass.cs"}},"context":{{"case":"method"}},"trigger":"shortcut","terminated_as":"applied","prefix":"","selections":[]}}}}"#,
        ts(start).to_rfc3339(),
        ts(end).to_rfc3339(),
    )
}

#[test]
fn import_filter_intervals_traces_and_consolidation() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::open(&dir.path().join("fbp.db")).unwrap();

    // First upload: one session with window activity and a completion.
    let first = archive(
        &dir,
        "a.jsonl",
        &[
            window_line("e-1", "s-1", 0, 2, "one"),
            window_line("e-2", "s-1", 1, 3, "other"),
            completion_line("e-3", "s-1", 5, 6),
            // Stale collector version, pruned by the chain.
            r#"{"id":"e-4","session_id":"s-1","triggered_at":"2015-04-21T09:00:07Z","app_version":"0.999","kind":{"type":"other"}}"#.to_string(),
        ],
    );
    // Second upload opens with an unknown session, then reveals it also
    // owns s-1. That creates a duplicate developer on purpose.
    let second = archive(
        &dir,
        "b.jsonl",
        &[
            window_line("e-5", "s-2", 0, 1, "editor"),
            r#"{"id":"e-6","session_id":"s-1","triggered_at":"2015-04-21T09:00:02Z","app_version":"0.1000","kind":{"type":"command","command":"Edit.FormatDocument"}}"#.to_string(),
        ],
    );

    let inserted = import::run(&mut db, &[first, second]).unwrap();
    assert_eq!(inserted, 6);

    // Both uploads registered a developer, overlapping on s-1.
    let before = statistics(&db).unwrap();
    assert_eq!(before.developers_upper_bound, 2);
    assert_eq!(before.developers_lower_bound, 1);
    assert_eq!(before.duplicated_sessions, 1);

    // Window intervals for s-1: the switch truncates "one" at the next
    // trigger and the stale event is filtered out beforehand.
    let intervals = util::session_window_intervals(&db, 1000).unwrap();
    let s1 = &intervals
        .iter()
        .find(|(session, _)| session.as_str() == "s-1")
        .unwrap()
        .1;
    assert_eq!(s1.len(), 2);
    assert_eq!((s1[0].id.as_str(), s1[0].start, s1[0].end), ("one", ts(0), ts(1)));
    assert_eq!((s1[1].id.as_str(), s1[1].start, s1[1].end), ("other", ts(1), ts(3)));

    // The completion in s-1 yields a single applied trace.
    let events = db
        .list_session_events(&SessionId::new("s-1").unwrap())
        .unwrap();
    let mut extractor = TraceExtractor::new();
    let traces: Vec<_> = events.iter().filter_map(|e| extractor.process(e)).collect();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].duration_ms, 1000);
    assert_eq!(traces[0].actions, vec![CompletionAction::Apply]);

    // Consolidation absorbs the duplicate and the bounds close.
    let stats = consolidate(&mut db).unwrap();
    assert_eq!(stats.merges, 1);

    let after = statistics(&db).unwrap();
    assert_eq!(after.developers_upper_bound, 1);
    assert_eq!(after.developers_lower_bound, 1);
    assert_eq!(after.duplicated_sessions, 0);

    let survivor = &db
        .find_all()
        .unwrap()
        .into_iter()
        .find(|dev| !dev.is_absorbed())
        .unwrap();
    assert_eq!(
        survivor.session_ids,
        [
            SessionId::new("s-1").unwrap(),
            SessionId::new("s-2").unwrap()
        ]
        .into_iter()
        .collect()
    );
}
