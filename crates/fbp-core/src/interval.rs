//! Generic event-stream to interval transformation.
//!
//! A stream of timestamped events is folded into a gapless sequence of
//! half-open intervals `[start, end)`, each labelled with a bucket value.
//! What the bucket is, and how an event's end time is derived, is
//! supplied by an [`IntervalPolicy`]; the folding itself lives here.
//!
//! All per-stream state is threaded explicitly through [`StreamState`].
//! Streams share nothing, so callers are free to process them in
//! parallel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;

/// A half-open interval `[start, end)` labelled with a bucket value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval<B> {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub id: B,
}

impl<B> Interval<B> {
    /// Length of the interval; zero-length intervals are legal.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// Strategy supplying the domain-specific parts of interval building.
pub trait IntervalPolicy {
    type Bucket: Clone + PartialEq;

    /// The bucket an event belongs to. Events mapping to the same bucket
    /// in sequence extend one interval.
    fn bucket(&self, event: &Event) -> Self::Bucket;

    /// The point in time up to which an event keeps its interval open.
    fn end_of(&self, event: &Event) -> DateTime<Utc> {
        event
            .terminated_at
            .or(event.triggered_at)
            .expect("event without trigger time reached interval processing")
    }

    /// Pre-step hook, run before the generic bucket logic sees the
    /// event. Policies may close or rewrite the current interval here.
    fn transition(&self, state: &mut StreamState<Self::Bucket>, event: &Event) {
        let _ = (state, event);
    }
}

/// Accumulated interval state of one event stream.
#[derive(Debug, Clone)]
pub struct StreamState<B> {
    /// Finished intervals in order.
    pub closed: Vec<Interval<B>>,
    /// The interval still being extended, if any.
    pub current: Option<Interval<B>>,
    /// Trigger time of the last event seen, for the ordering check.
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl<B> Default for StreamState<B> {
    fn default() -> Self {
        Self {
            closed: Vec::new(),
            current: None,
            last_triggered_at: None,
        }
    }
}

impl<B> StreamState<B> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the current interval as-is and appends it.
    pub fn close_current(&mut self) {
        if let Some(current) = self.current.take() {
            self.closed.push(current);
        }
    }
}

/// Feeds one event into the state machine.
///
/// # Panics
///
/// Panics when the event carries no trigger time or arrives out of
/// trigger-time order. Both are upstream contract violations; producing
/// intervals from such a stream would silently corrupt every interval
/// after the bad event.
pub fn step<P: IntervalPolicy>(policy: &P, state: &mut StreamState<P::Bucket>, event: &Event) {
    let trigger = event
        .triggered_at
        .expect("event without trigger time reached interval processing");
    if let Some(last) = state.last_triggered_at {
        assert!(
            trigger >= last,
            "events must arrive in trigger-time order: saw {last}, then {trigger}"
        );
    }
    state.last_triggered_at = Some(trigger);

    policy.transition(state, event);

    let bucket = policy.bucket(event);
    let end = policy.end_of(event);
    match &mut state.current {
        None => {
            state.current = Some(Interval {
                start: trigger,
                end: end.max(trigger),
                id: bucket,
            });
        }
        Some(current) if current.id == bucket => {
            current.end = current.end.max(end);
        }
        Some(current) => {
            // The new interval starts where the old one stops; clipping
            // the old end to the trigger keeps the sequence gapless and
            // free of overlap.
            current.end = current.end.min(trigger);
            let boundary = current.end;
            state.close_current();
            state.current = Some(Interval {
                start: boundary,
                end: end.max(boundary),
                id: bucket,
            });
        }
    }
}

/// Finalizes a stream, appending the still-open interval untruncated.
#[must_use]
pub fn finish<B>(mut state: StreamState<B>) -> Vec<Interval<B>> {
    state.close_current();
    state.closed
}

/// Folds a whole in-order stream into its intervals.
pub fn compute<'a, P: IntervalPolicy>(
    policy: &P,
    events: impl IntoIterator<Item = &'a Event>,
) -> Vec<Interval<P::Bucket>> {
    let mut state = StreamState::new();
    for event in events {
        step(policy, &mut state, event);
    }
    finish(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::types::SessionId;
    use chrono::{Duration, TimeZone};

    struct WindowNamePolicy;

    impl IntervalPolicy for WindowNamePolicy {
        type Bucket = String;

        fn bucket(&self, event: &Event) -> String {
            event.active_window().unwrap_or("?").to_owned()
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 4, 21, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn window_event(window: &str, start: i64, duration: i64) -> Event {
        Event {
            id: format!("{window}-{start}"),
            session_id: SessionId::new("sid").unwrap(),
            triggered_at: Some(ts(start)),
            terminated_at: Some(ts(start + duration)),
            app_version: None,
            kind: EventKind::Window {
                window: window.into(),
                activity: crate::event::Activity::Other,
            },
        }
    }

    fn interval(id: &str, start: i64, end: i64) -> Interval<String> {
        Interval {
            start: ts(start),
            end: ts(end),
            id: id.into(),
        }
    }

    #[test]
    fn single_event_yields_one_interval() {
        let intervals = compute(&WindowNamePolicy, &[window_event("editor", 0, 2)]);
        assert_eq!(intervals, vec![interval("editor", 0, 2)]);
    }

    #[test]
    fn same_bucket_extends_end_monotonically() {
        let events = [
            window_event("editor", 0, 5),
            // Shorter follow-up must not shrink the interval.
            window_event("editor", 1, 1),
            window_event("editor", 3, 4),
        ];
        let intervals = compute(&WindowNamePolicy, &events);
        assert_eq!(intervals, vec![interval("editor", 0, 7)]);
    }

    #[test]
    fn bucket_change_truncates_and_stays_gapless() {
        let events = [window_event("one", 0, 2), window_event("other", 1, 2)];
        let intervals = compute(&WindowNamePolicy, &events);
        assert_eq!(
            intervals,
            vec![interval("one", 0, 1), interval("other", 1, 3)]
        );
    }

    #[test]
    fn bucket_change_after_idle_starts_at_previous_end() {
        let events = [window_event("one", 0, 1), window_event("other", 10, 2)];
        let intervals = compute(&WindowNamePolicy, &events);
        assert_eq!(
            intervals,
            vec![interval("one", 0, 1), interval("other", 1, 12)]
        );
    }

    #[test]
    fn adjacent_intervals_share_their_boundary() {
        let events = [
            window_event("a", 0, 3),
            window_event("b", 5, 2),
            window_event("c", 6, 3),
        ];
        let intervals = compute(&WindowNamePolicy, &events);
        for pair in intervals.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn finish_keeps_open_interval_untruncated() {
        let mut state = StreamState::new();
        step(&WindowNamePolicy, &mut state, &window_event("editor", 0, 9));
        let intervals = finish(state);
        assert_eq!(intervals, vec![interval("editor", 0, 9)]);
    }

    #[test]
    #[should_panic(expected = "trigger-time order")]
    fn out_of_order_events_panic() {
        let mut state = StreamState::new();
        step(&WindowNamePolicy, &mut state, &window_event("a", 5, 1));
        step(&WindowNamePolicy, &mut state, &window_event("b", 4, 1));
    }

    #[test]
    #[should_panic(expected = "without trigger time")]
    fn event_without_trigger_time_panics() {
        let mut event = window_event("a", 0, 1);
        event.triggered_at = None;
        step(&WindowNamePolicy, &mut StreamState::new(), &event);
    }

    #[test]
    fn equal_trigger_times_are_accepted() {
        let events = [window_event("a", 0, 1), window_event("a", 0, 2)];
        let intervals = compute(&WindowNamePolicy, &events);
        assert_eq!(intervals, vec![interval("a", 0, 2)]);
    }
}
