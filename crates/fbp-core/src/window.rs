//! Active-window intervals and the usage report built from them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::event::{Activity, Event};
use crate::interval::{Interval, IntervalPolicy, StreamState};

/// Reserved window id covering time spent outside the IDE.
pub const OUTSIDE_IDE: &str = "OutsideIDE";

/// Buckets events by their active window name.
///
/// `LeaveIde` events map to the [`OUTSIDE_IDE`] sentinel; an `EnterIde`
/// event always forces an interval boundary, even when the window after
/// re-entry is the one that was active before leaving.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowPolicy;

impl IntervalPolicy for WindowPolicy {
    type Bucket = String;

    fn bucket(&self, event: &Event) -> String {
        if event.activity() == Activity::LeaveIde {
            OUTSIDE_IDE.to_owned()
        } else {
            event.active_window().unwrap_or_default().to_owned()
        }
    }

    fn transition(&self, state: &mut StreamState<String>, event: &Event) {
        if event.activity() != Activity::EnterIde {
            return;
        }
        let Some(trigger) = event.triggered_at else {
            return;
        };
        match &mut state.current {
            Some(current) if current.id == OUTSIDE_IDE => {
                // The away time ran until re-entry; the generic step
                // clips this back to the trigger when it opens the next
                // interval.
                current.end = current.end.max(self.end_of(event));
            }
            Some(current) => {
                current.end = current.end.min(trigger);
                let start = current.end;
                state.close_current();
                state.current = Some(Interval {
                    start,
                    end: trigger.max(start),
                    id: OUTSIDE_IDE.to_owned(),
                });
            }
            None => {}
        }
    }
}

/// Cumulative per-window usage across several interval streams.
///
/// One row per stream key, one column per window id seen in any stream,
/// cells in whole seconds.
#[derive(Debug, Default)]
pub struct WindowUsageReport {
    streams: BTreeMap<String, Vec<Interval<String>>>,
}

impl WindowUsageReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stream(&mut self, key: impl Into<String>, intervals: Vec<Interval<String>>) {
        self.streams
            .entry(key.into())
            .or_default()
            .extend(intervals);
    }

    /// Renders the report as CSV with a `stream` key column.
    #[must_use]
    pub fn to_csv(&self) -> String {
        let windows: BTreeSet<&str> = self
            .streams
            .values()
            .flatten()
            .map(|interval| interval.id.as_str())
            .collect();

        let mut out = String::from("stream");
        for window in &windows {
            out.push(',');
            out.push_str(&csv_field(window));
        }
        out.push('\n');

        for (key, intervals) in &self.streams {
            let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
            for interval in intervals {
                *totals.entry(interval.id.as_str()).or_default() +=
                    interval.duration().num_milliseconds();
            }
            out.push_str(&csv_field(key));
            for window in &windows {
                let ms = totals.get(window).copied().unwrap_or_default();
                let _ = write!(out, ",{}", round_to_seconds(ms));
            }
            out.push('\n');
        }
        out
    }
}

/// Half-up rounding of a non-negative millisecond count to whole seconds.
fn round_to_seconds(ms: i64) -> i64 {
    (ms + 500) / 1000
}

fn csv_field(value: &str) -> String {
    if value.contains(['"', ',', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}
