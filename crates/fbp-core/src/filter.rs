//! Event filter chain applied before any interval processing.
//!
//! Filters are conjunctive: an event survives the chain only if every
//! filter accepts it, and evaluation short-circuits at the first
//! rejection. Rejections are silent per event; the chain counts them per
//! filter so callers can report what was pruned.

use serde_json::Value;

use crate::event::{Event, EventKind};

/// A named accept/reject predicate over events.
pub struct EventFilter {
    name: String,
    predicate: Box<dyn Fn(&Event) -> bool + Send + Sync>,
}

impl EventFilter {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Event) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn accepts(&self, event: &Event) -> bool {
        (self.predicate)(event)
    }
}

impl std::fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFilter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Drops events that carry no trigger timestamp.
#[must_use]
pub fn no_time() -> EventFilter {
    EventFilter::new("NoTimeFilter", |event| event.triggered_at.is_some())
}

/// Accepts only events recorded by collector version `0.<n>` with
/// `n >= min`, optionally qualified as `-default` (any case).
///
/// Any other shape rejects: missing version, a major other than `0`,
/// non-numeric or overflowing digits, or a qualifier other than
/// `default`.
#[must_use]
pub fn version_at_least(min: i32) -> EventFilter {
    EventFilter::new(format!("VersionFilter(>={min})"), move |event| {
        event
            .app_version
            .as_deref()
            .is_some_and(|version| version_accepted(version, min))
    })
}

fn version_accepted(version: &str, min: i32) -> bool {
    let Some(rest) = version.strip_prefix("0.") else {
        return false;
    };
    let (digits, qualifier) = match rest.split_once('-') {
        Some((digits, qualifier)) => (digits, Some(qualifier)),
        None => (rest, None),
    };
    if qualifier.is_some_and(|q| !q.eq_ignore_ascii_case("default")) {
        return false;
    }
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    // parse() rejects values past i32::MAX, which is what we want.
    digits.parse::<i32>().is_ok_and(|n| n >= min)
}

/// Drops completion events that are unusable for trace analysis.
///
/// Non-completion events always pass. A completion event needs a C#
/// document (a plain `.cs` file, or a `CSharp`-language document whose
/// name carries the `==` anonymization marker) and a non-empty analyzed
/// context.
#[must_use]
pub fn valid_completion() -> EventFilter {
    EventFilter::new("InvalidCompletionEventFilter", |event| {
        let EventKind::Completion(payload) = &event.kind else {
            return true;
        };
        let doc = &payload.document;
        let csharp_document =
            doc.file_name.ends_with(".cs") || (doc.language == "CSharp" && doc.file_name.contains("=="));
        csharp_document && payload.context != Value::Null
    })
}

/// Per-filter rejection counts for one chain run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterStats {
    /// Events fed into the chain.
    pub seen: u64,
    /// Events that survived every filter.
    pub passed: u64,
    /// `(filter name, rejection count)` in chain order.
    pub rejected: Vec<(String, u64)>,
}

/// An ordered conjunction of filters.
#[derive(Debug)]
pub struct FilterChain {
    filters: Vec<EventFilter>,
}

impl FilterChain {
    #[must_use]
    pub fn new(filters: Vec<EventFilter>) -> Self {
        Self { filters }
    }

    /// The standard cleanup chain: no-time, minimum version, valid
    /// completions.
    #[must_use]
    pub fn standard(min_version: i32) -> Self {
        Self::new(vec![
            no_time(),
            version_at_least(min_version),
            valid_completion(),
        ])
    }

    /// Whether every filter accepts the event.
    #[must_use]
    pub fn accepts(&self, event: &Event) -> bool {
        self.filters.iter().all(|f| f.accepts(event))
    }

    /// Runs the chain over a stream, returning survivors and per-filter
    /// rejection counts.
    pub fn run(&self, events: impl IntoIterator<Item = Event>) -> (Vec<Event>, FilterStats) {
        let mut stats = FilterStats {
            rejected: self
                .filters
                .iter()
                .map(|f| (f.name().to_owned(), 0))
                .collect(),
            ..FilterStats::default()
        };
        let mut passed = Vec::new();
        'events: for event in events {
            stats.seen += 1;
            for (filter, slot) in self.filters.iter().zip(&mut stats.rejected) {
                if !filter.accepts(&event) {
                    slot.1 += 1;
                    continue 'events;
                }
            }
            stats.passed += 1;
            passed.push(event);
        }
        (passed, stats)
    }
}
